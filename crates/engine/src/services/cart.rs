//! Carts, reservations and checkout.
//!
//! A reservation is the `IS_IN` edge between a listing node and a cart node;
//! the relational `product_to_cart` row mirrors it and is written first, but
//! decisions only ever read the edge. Every operation that reads or changes a
//! listing's stock holds that listing's lock, and checkout decrements stock
//! with a compare-and-swap, so concurrent carts cannot oversell a listing.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use tristore_core::{
    ActionType, AddressId, CartId, CustomerId, ListingId, OrderId, OrderPositionId, SupplierId,
};

use super::follow_up;
use crate::engine::Engine;
use crate::error::{ConsistencyError, Entity, Result};
use crate::locks::EntityGuards;
use crate::models::{
    CustomerOrder, Listing, OrderPosition, PlacedOrder, Reservation, ShoppingCart,
};
use crate::scan::{CartProbe, first_holder};
use crate::store::IdSequence;

/// Cart operations.
pub struct CartService<'a> {
    engine: &'a Engine,
}

impl<'a> CartService<'a> {
    pub(crate) const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Open a new cart for a customer.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the customer does not exist.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn create_cart(&self, customer_id: CustomerId) -> Result<ShoppingCart> {
        self.engine.accounts().customer(customer_id).await?;

        let stores = self.engine.stores();
        let cart = ShoppingCart {
            id: CartId::new(stores.ids.next_id(IdSequence::Cart).await?),
            customer_id,
            date_created: Utc::now(),
        };
        stores.relational.insert_cart(&cart).await?;
        follow_up(stores.graph.insert_cart_node(&cart).await, "cart node")?;
        info!(cart_id = %cart.id, "Created cart");
        Ok(cart)
    }

    /// Delete an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Referenced` while the cart holds
    /// reservations.
    /// Returns `ConsistencyError::NotFound` if neither store has the cart.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn delete_cart(&self, cart_id: CartId) -> Result<()> {
        let stores = self.engine.stores();
        if let Some(holder) = first_holder(stores, &CartProbe::ORDER, cart_id).await? {
            return Err(ConsistencyError::referenced(
                Entity::Cart,
                cart_id,
                holder.to_string(),
            ));
        }

        let deleted = stores.relational.delete_cart(cart_id).await?;
        let deleted_node = follow_up(stores.graph.delete_cart_node(cart_id).await, "cart node")?;
        if !deleted && !deleted_node {
            return Err(ConsistencyError::not_found(Entity::Cart, cart_id));
        }
        info!("Deleted cart");
        Ok(())
    }

    /// Reserve `amount` more of a listing in a cart.
    ///
    /// The reserved total per cart may not exceed the listing's inventory
    /// level. Reservations in other carts are not counted; stock is only
    /// taken at checkout.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::InvalidAmount` if `amount <= 0`.
    /// Returns `ConsistencyError::NotFound` unless the cart and the listing
    /// exist in both stores.
    /// Returns `ConsistencyError::InsufficientStock` if the new total exceeds
    /// inventory.
    #[instrument(skip(self), fields(cart_id = %cart_id, listing_id = %listing_id, amount))]
    pub async fn add_to_cart(
        &self,
        cart_id: CartId,
        listing_id: ListingId,
        amount: i32,
    ) -> Result<Reservation> {
        check_positive(amount)?;
        let _guard = self.engine.listing_locks().lock(listing_id).await;

        self.require_cart(cart_id).await?;
        let listing = self.require_listing(listing_id).await?;

        let stores = self.engine.stores();
        let existing = stores
            .graph
            .reservation(cart_id, listing_id)
            .await?
            .map_or(0, |r| r.amount);
        let total = existing.saturating_add(amount);
        if total > listing.inventory_level {
            return Err(ConsistencyError::InsufficientStock {
                listing: listing_id,
                requested: total,
                available: listing.inventory_level,
            });
        }

        let reservation = Reservation {
            cart_id,
            listing_id,
            amount: total,
        };
        stores.relational.upsert_cart_item(&reservation).await?;
        follow_up(
            stores.graph.put_reservation(&reservation).await,
            "reservation",
        )?;
        info!(reserved = total, "Reserved listing in cart");
        Ok(reservation)
    }

    /// Release `amount` of a reservation. The reservation is deleted when it
    /// reaches zero.
    ///
    /// Returns the remaining reservation, or `None` once it is gone.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::InvalidAmount` if `amount <= 0` or exceeds
    /// the reserved amount.
    /// Returns `ConsistencyError::NotFound` if there is no reservation.
    #[instrument(skip(self), fields(cart_id = %cart_id, listing_id = %listing_id, amount))]
    pub async fn remove_from_cart(
        &self,
        cart_id: CartId,
        listing_id: ListingId,
        amount: i32,
    ) -> Result<Option<Reservation>> {
        check_positive(amount)?;
        let _guard = self.engine.listing_locks().lock(listing_id).await;

        let stores = self.engine.stores();
        let current = stores
            .graph
            .reservation(cart_id, listing_id)
            .await?
            .ok_or_else(|| {
                ConsistencyError::not_found(
                    Entity::Reservation,
                    format!("{listing_id} in cart {cart_id}"),
                )
            })?;
        if amount > current.amount {
            return Err(ConsistencyError::InvalidAmount {
                amount,
                reason: "more than the reserved amount",
            });
        }

        let remaining = current.amount - amount;
        if remaining == 0 {
            stores.relational.delete_cart_item(cart_id, listing_id).await?;
            follow_up(
                stores.graph.delete_reservation(cart_id, listing_id).await,
                "reservation",
            )?;
            info!("Removed listing from cart");
            return Ok(None);
        }

        let reservation = Reservation {
            amount: remaining,
            ..current
        };
        stores.relational.upsert_cart_item(&reservation).await?;
        follow_up(
            stores.graph.put_reservation(&reservation).await,
            "reservation",
        )?;
        info!(reserved = remaining, "Reduced reservation");
        Ok(Some(reservation))
    }

    /// Turn a cart's reservations into an order.
    ///
    /// Every reservation becomes one order position delivered to the billing
    /// address after the configured lead time. The reservation is consumed,
    /// stock is decremented and a `purchase` action is recorded.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the billing address, the
    /// supplier or the cart (in either store) is missing.
    /// Returns `ConsistencyError::EmptyCart` if nothing is reserved.
    /// Returns `ConsistencyError::InsufficientStock` if any reservation
    /// exceeds current stock; when this is detected before the order is
    /// written nothing changes, afterwards earlier positions are kept.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn place_order(
        &self,
        cart_id: CartId,
        billing_address_id: AddressId,
        supplier_id: SupplierId,
    ) -> Result<PlacedOrder> {
        let stores = self.engine.stores();
        self.engine.addresses().address(billing_address_id).await?;
        self.engine.accounts().supplier(supplier_id).await?;
        let cart = self.require_cart(cart_id).await?;

        let (_guards, snapshot) = self.lock_reservations(cart_id).await?;
        if snapshot.is_empty() {
            return Err(ConsistencyError::EmptyCart(cart_id));
        }

        for reservation in &snapshot {
            let listing = self.require_listing(reservation.listing_id).await?;
            if reservation.amount > listing.inventory_level {
                return Err(ConsistencyError::InsufficientStock {
                    listing: listing.id,
                    requested: reservation.amount,
                    available: listing.inventory_level,
                });
            }
        }

        // The billing address must survive until the order references it.
        let billing_guard = self.engine.address_locks().lock(billing_address_id).await;
        self.engine.addresses().address(billing_address_id).await?;

        let now = Utc::now();
        let order = CustomerOrder {
            id: OrderId::new(stores.ids.next_id(IdSequence::Order).await?),
            customer_id: cart.customer_id,
            billing_address_id,
            order_date: now,
            is_paid: false,
        };
        stores.relational.insert_order(&order).await?;
        drop(billing_guard);
        info!(order_id = %order.id, items = snapshot.len(), "Created order");

        let delivery_date = now + self.engine.delivery_lead();
        let mut positions = Vec::with_capacity(snapshot.len());
        for reservation in snapshot {
            let position = OrderPosition {
                id: OrderPositionId::new(stores.ids.next_id(IdSequence::OrderPosition).await?),
                order_id: order.id,
                listing_id: reservation.listing_id,
                amount: reservation.amount,
                delivery_address_id: billing_address_id,
                delivery_date,
                supplier_id,
            };
            stores.relational.insert_order_position(&position).await?;
            stores
                .relational
                .delete_cart_item(cart_id, reservation.listing_id)
                .await?;
            follow_up(
                stores
                    .graph
                    .delete_reservation(cart_id, reservation.listing_id)
                    .await,
                "reservation",
            )?;

            self.take_stock(reservation).await?;
            self.engine
                .documents()
                .log_action(cart.customer_id, reservation.listing_id, ActionType::Purchase)
                .await?;
            debug!(position_id = %position.id, listing_id = %position.listing_id, "Committed position");
            positions.push(position);
        }

        info!(order_id = %order.id, "Placed order");
        Ok(PlacedOrder { order, positions })
    }

    /// Whether a listing currently has at least `amount` in stock.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::InvalidAmount` if `amount <= 0`.
    /// Returns `ConsistencyError::NotFound` if the listing does not exist.
    pub async fn is_item_available(&self, listing_id: ListingId, amount: i32) -> Result<bool> {
        check_positive(amount)?;
        let listing = self
            .engine
            .stores()
            .relational
            .listing(listing_id)
            .await?
            .ok_or_else(|| ConsistencyError::not_found(Entity::Listing, listing_id))?;
        Ok(amount <= listing.inventory_level)
    }

    /// Reservations held by a cart, by listing id.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the cart node does not exist.
    pub async fn cart_contents(&self, cart_id: CartId) -> Result<Vec<Reservation>> {
        let graph = &self.engine.stores().graph;
        if !graph.cart_node_exists(cart_id).await? {
            return Err(ConsistencyError::not_found(Entity::Cart, cart_id));
        }
        let mut contents = graph.cart_reservations(cart_id).await?;
        contents.sort_unstable_by_key(|r| r.listing_id);
        Ok(contents)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Lock every listing in the cart and return the reservations read under
    /// those locks. Retries if the cart gained a listing in between.
    async fn lock_reservations(
        &self,
        cart_id: CartId,
    ) -> Result<(EntityGuards<ListingId>, Vec<Reservation>)> {
        let graph = &self.engine.stores().graph;
        loop {
            let listing_ids: Vec<_> = graph
                .cart_reservations(cart_id)
                .await?
                .into_iter()
                .map(|r| r.listing_id)
                .collect();
            let guards = self.engine.listing_locks().lock_all(listing_ids).await;

            let mut snapshot = graph.cart_reservations(cart_id).await?;
            if snapshot.iter().all(|r| guards.holds(&r.listing_id)) {
                snapshot.sort_unstable_by_key(|r| r.listing_id);
                return Ok((guards, snapshot));
            }
            debug!("Cart changed while locking, retrying");
        }
    }

    /// Decrement stock for a consumed reservation and mirror the new level
    /// onto the listing node.
    async fn take_stock(&self, reservation: Reservation) -> Result<()> {
        let stores = self.engine.stores();
        let Some(level) = stores
            .relational
            .decrement_inventory(reservation.listing_id, reservation.amount)
            .await?
        else {
            let available = stores
                .relational
                .listing(reservation.listing_id)
                .await?
                .map_or(0, |l| l.inventory_level);
            warn!(
                listing_id = %reservation.listing_id,
                requested = reservation.amount,
                available,
                "Stock decrement refused after order was written"
            );
            return Err(ConsistencyError::InsufficientStock {
                listing: reservation.listing_id,
                requested: reservation.amount,
                available,
            });
        };

        if let Some(mut node) = stores.graph.listing_node(reservation.listing_id).await? {
            node.inventory_level = level;
            follow_up(
                stores.graph.update_listing_node(&node).await,
                "listing inventory",
            )?;
        }
        debug!(listing_id = %reservation.listing_id, level, "Decremented stock");
        Ok(())
    }

    async fn require_cart(&self, cart_id: CartId) -> Result<ShoppingCart> {
        let stores = self.engine.stores();
        match stores.relational.cart(cart_id).await? {
            Some(cart) if stores.graph.cart_node_exists(cart_id).await? => Ok(cart),
            _ => Err(ConsistencyError::not_found(Entity::Cart, cart_id)),
        }
    }

    async fn require_listing(&self, listing_id: ListingId) -> Result<Listing> {
        let stores = self.engine.stores();
        match stores.relational.listing(listing_id).await? {
            Some(listing) if stores.graph.listing_node(listing_id).await?.is_some() => Ok(listing),
            _ => Err(ConsistencyError::not_found(Entity::Listing, listing_id)),
        }
    }
}

fn check_positive(amount: i32) -> Result<()> {
    if amount <= 0 {
        return Err(ConsistencyError::InvalidAmount {
            amount,
            reason: "must be positive",
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tristore_core::{PriceEuro, VendorId};

    use super::*;
    use crate::EngineConfig;
    use crate::error::ErrorKind;
    use crate::models::{
        AddressCandidate, DocumentCollection, NewCustomer, NewSupplier, NewVendor, Owner,
        ProductInformation,
    };
    use crate::store::memory::InMemoryStores;

    struct Fixture {
        handles: InMemoryStores,
        engine: Engine,
        customer: CustomerId,
        supplier: SupplierId,
        billing: AddressId,
        vendor: VendorId,
    }

    async fn fixture() -> Fixture {
        let handles = InMemoryStores::new();
        let engine = Engine::new(handles.stores(), &EngineConfig::default());
        let accounts = engine.accounts();
        let customer = accounts
            .create_customer(NewCustomer {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                user_name: "ada".into(),
                email: "ada@example.test".into(),
            })
            .await
            .unwrap();
        let vendor = accounts
            .create_vendor(NewVendor {
                name: "Acme".into(),
                user_name: "acme".into(),
                email: "sales@acme.test".into(),
                phone_number: None,
            })
            .await
            .unwrap();
        let supplier = accounts
            .create_supplier(NewSupplier {
                name: "Parcel Co".into(),
                email: "ops@parcel.test".into(),
                phone_number: None,
            })
            .await
            .unwrap();
        let billing = engine
            .addresses()
            .create_or_reuse(
                Owner::Customer(customer.id),
                AddressCandidate::new("1 Main St", "Vienna", "1010", "AT"),
            )
            .await
            .unwrap();
        Fixture {
            handles,
            engine,
            customer: customer.id,
            supplier: supplier.id,
            billing: billing.id,
            vendor: vendor.id,
        }
    }

    async fn widget(fx: &Fixture, inventory: i32) -> ListingId {
        fx.engine
            .catalog()
            .create_vendor_product(
                fx.vendor,
                ProductInformation {
                    listing_id: None,
                    name: "Widget".into(),
                    description: "A widget".into(),
                    unit_price: PriceEuro::from_cents(500).unwrap(),
                    inventory_level: inventory,
                    categories: Vec::new(),
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_to_cart_sums_against_inventory() {
        let fx = fixture().await;
        let listing = widget(&fx, 10).await;
        let cart = fx.engine.carts().create_cart(fx.customer).await.unwrap();
        let carts = fx.engine.carts();

        carts.add_to_cart(cart.id, listing, 6).await.unwrap();
        let err = carts.add_to_cart(cart.id, listing, 5).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let held = carts.add_to_cart(cart.id, listing, 4).await.unwrap();
        assert_eq!(held.amount, 10);
        assert_eq!(fx.handles.relational.cart_item(cart.id, listing), Some(held));
    }

    #[tokio::test]
    async fn test_add_to_cart_rejects_non_positive_amount() {
        let fx = fixture().await;
        let listing = widget(&fx, 10).await;
        let cart = fx.engine.carts().create_cart(fx.customer).await.unwrap();

        let err = fx
            .engine
            .carts()
            .add_to_cart(cart.id, listing, 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_remove_from_cart_deletes_at_zero() {
        let fx = fixture().await;
        let listing = widget(&fx, 10).await;
        let cart = fx.engine.carts().create_cart(fx.customer).await.unwrap();
        let carts = fx.engine.carts();
        carts.add_to_cart(cart.id, listing, 6).await.unwrap();

        let over = carts.remove_from_cart(cart.id, listing, 7).await.unwrap_err();
        assert_eq!(over.kind(), ErrorKind::InvalidInput);

        let left = carts.remove_from_cart(cart.id, listing, 2).await.unwrap();
        assert_eq!(left.map(|r| r.amount), Some(4));
        assert_eq!(carts.remove_from_cart(cart.id, listing, 4).await.unwrap(), None);
        assert!(carts.cart_contents(cart.id).await.unwrap().is_empty());
        assert_eq!(fx.handles.relational.cart_item(cart.id, listing), None);

        let missing = carts.remove_from_cart(cart.id, listing, 1).await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_place_order_consumes_reservations() {
        let fx = fixture().await;
        let listing = widget(&fx, 10).await;
        let carts = fx.engine.carts();
        let cart = carts.create_cart(fx.customer).await.unwrap();
        carts.add_to_cart(cart.id, listing, 10).await.unwrap();

        let placed = carts
            .place_order(cart.id, fx.billing, fx.supplier)
            .await
            .unwrap();

        assert!(!placed.order.is_paid);
        assert_eq!(placed.positions.len(), 1);
        let position = &placed.positions[0];
        assert_eq!(position.amount, 10);
        assert_eq!(position.delivery_address_id, fx.billing);
        assert_eq!(
            position.delivery_date - placed.order.order_date,
            chrono::TimeDelta::days(14)
        );

        let stores = fx.engine.stores();
        let row = stores.relational.listing(listing).await.unwrap().unwrap();
        let node = stores.graph.listing_node(listing).await.unwrap().unwrap();
        assert_eq!(row.inventory_level, 0);
        assert_eq!(node.inventory_level, 0);
        assert!(carts.cart_contents(cart.id).await.unwrap().is_empty());
        assert_eq!(fx.handles.documents.len(DocumentCollection::CustomerAction), 1);
        assert!(!carts.is_item_available(listing, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_place_order_on_empty_cart() {
        let fx = fixture().await;
        let cart = fx.engine.carts().create_cart(fx.customer).await.unwrap();

        let err = fx
            .engine
            .carts()
            .place_order(cart.id, fx.billing, fx.supplier)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsistencyError::EmptyCart(id) if id == cart.id));
    }

    #[tokio::test]
    async fn test_place_order_precheck_writes_nothing() {
        let fx = fixture().await;
        let listing = widget(&fx, 10).await;
        let carts = fx.engine.carts();
        let first = carts.create_cart(fx.customer).await.unwrap();
        let second = carts.create_cart(fx.customer).await.unwrap();
        carts.add_to_cart(first.id, listing, 8).await.unwrap();
        carts.add_to_cart(second.id, listing, 8).await.unwrap();

        carts
            .place_order(first.id, fx.billing, fx.supplier)
            .await
            .unwrap();
        let err = carts
            .place_order(second.id, fx.billing, fx.supplier)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let orders = fx
            .engine
            .stores()
            .relational
            .customer_orders(fx.customer)
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(carts.cart_contents(second.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_keeps_billing_address_alive() {
        let fx = fixture().await;
        let listing = widget(&fx, 10).await;
        let carts = fx.engine.carts();
        let cart = carts.create_cart(fx.customer).await.unwrap();
        carts.add_to_cart(cart.id, listing, 2).await.unwrap();

        // Checkout stalls on the billing address while the customer detaches it.
        let guard = fx.engine.address_locks().lock(fx.billing).await;
        let checkout = {
            let engine = fx.engine.clone();
            let (billing, supplier) = (fx.billing, fx.supplier);
            tokio::spawn(async move {
                engine.carts().place_order(cart.id, billing, supplier).await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let detach = {
            let engine = fx.engine.clone();
            let (customer, billing) = (fx.customer, fx.billing);
            tokio::spawn(async move {
                engine
                    .addresses()
                    .delete_owner_address(Owner::Customer(customer), billing)
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!checkout.is_finished());
        assert!(!detach.is_finished());
        drop(guard);

        let placed = checkout.await.unwrap().unwrap();
        detach.await.unwrap().unwrap();

        // The order was written first, so its billing reference keeps the row.
        assert_eq!(placed.order.billing_address_id, fx.billing);
        assert!(fx.engine.addresses().address(fx.billing).await.is_ok());
        assert_eq!(fx.handles.relational.address_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_cart_refuses_while_reserved() {
        let fx = fixture().await;
        let listing = widget(&fx, 10).await;
        let carts = fx.engine.carts();
        let cart = carts.create_cart(fx.customer).await.unwrap();
        carts.add_to_cart(cart.id, listing, 1).await.unwrap();

        let err = carts.delete_cart(cart.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferencedEntity);

        carts.remove_from_cart(cart.id, listing, 1).await.unwrap();
        carts.delete_cart(cart.id).await.unwrap();
        let gone = carts.delete_cart(cart.id).await.unwrap_err();
        assert_eq!(gone.kind(), ErrorKind::NotFound);
    }
}
