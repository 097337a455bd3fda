//! Deletion of root entities.
//!
//! Guarded deletes run the entity's reference scan first and refuse without
//! writing if anything still points at the entity. Purging deletes dependents
//! first, store by store, and then runs the guarded delete.

use tracing::{debug, info, instrument};

use tristore_core::{AddressId, CustomerId, SupplierId, VendorId};

use super::follow_up;
use crate::engine::Engine;
use crate::error::{ConsistencyError, Entity, Result};
use crate::models::{DocumentCollection, DocumentFilter, Owner};
use crate::scan::{CustomerProbe, SupplierProbe, first_holder};

/// Collections whose documents belong to a customer.
const CUSTOMER_COLLECTIONS: [DocumentCollection; 3] = [
    DocumentCollection::CustomerAction,
    DocumentCollection::ProductRecommendation,
    DocumentCollection::Review,
];

/// Cascade operations.
pub struct CascadeService<'a> {
    engine: &'a Engine,
}

impl<'a> CascadeService<'a> {
    pub(crate) const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Delete a customer nothing references anymore, along with their address
    /// references.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the customer does not exist.
    /// Returns `ConsistencyError::Referenced` if a cart node or a review,
    /// recommendation or action document names the customer.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn delete_customer(&self, customer_id: CustomerId) -> Result<()> {
        self.engine.accounts().customer(customer_id).await?;

        let stores = self.engine.stores();
        if let Some(holder) = first_holder(stores, &CustomerProbe::ORDER, customer_id).await? {
            return Err(ConsistencyError::referenced(
                Entity::Customer,
                customer_id,
                holder.to_string(),
            ));
        }

        self.engine
            .addresses()
            .delete_owner_addresses(Owner::Customer(customer_id))
            .await?;
        stores.relational.delete_customer(customer_id).await?;
        info!("Deleted customer");
        Ok(())
    }

    /// Delete a customer together with their orders, carts, addresses and
    /// documents.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the customer does not exist.
    /// Returns `ConsistencyError::Store` if a store call fails; steps already
    /// done stay done.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn purge_customer(&self, customer_id: CustomerId) -> Result<()> {
        self.engine.accounts().customer(customer_id).await?;
        let stores = self.engine.stores();

        let mut order_addresses: Vec<AddressId> = Vec::new();
        let orders = stores.relational.customer_orders(customer_id).await?;
        for order in &orders {
            let positions = stores.relational.order_positions(order.id).await?;
            order_addresses.extend(positions.iter().map(|p| p.delivery_address_id));
            order_addresses.push(order.billing_address_id);
            stores.relational.delete_order_positions(order.id).await?;
            stores.relational.delete_order(order.id).await?;
        }
        order_addresses.sort_unstable();
        order_addresses.dedup();
        for address_id in order_addresses {
            self.engine.addresses().collect(address_id).await?;
        }

        let mirrored = stores
            .relational
            .delete_cart_items_for_customer(customer_id)
            .await?;
        let reservations = follow_up(
            stores.graph.delete_customer_reservations(customer_id).await,
            "reservations",
        )?;

        let carts = stores.relational.customer_carts(customer_id).await?;
        for cart in &carts {
            stores.relational.delete_cart(cart.id).await?;
            follow_up(stores.graph.delete_cart_node(cart.id).await, "cart node")?;
        }

        self.engine
            .addresses()
            .delete_owner_addresses(Owner::Customer(customer_id))
            .await?;

        let mut documents = 0;
        for collection in CUSTOMER_COLLECTIONS {
            documents += follow_up(
                stores
                    .documents
                    .delete_many(collection, DocumentFilter::Customer(customer_id))
                    .await,
                "customer documents",
            )?;
        }
        info!(
            orders = orders.len(),
            mirrored,
            reservations,
            carts = carts.len(),
            documents,
            "Cleared customer data"
        );

        self.delete_customer(customer_id).await
    }

    /// Delete a vendor with all of its listings and address references.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the vendor does not exist.
    /// Returns `ConsistencyError::Store` if a store call fails; listings
    /// already removed stay removed.
    #[instrument(skip(self), fields(vendor_id = %vendor_id))]
    pub async fn delete_vendor(&self, vendor_id: VendorId) -> Result<()> {
        self.engine.accounts().vendor(vendor_id).await?;
        let stores = self.engine.stores();

        let catalog = stores.relational.vendor_catalog(vendor_id).await?;
        for listed in &catalog {
            self.engine
                .catalog()
                .remove_vendor_product(listed.listing.id)
                .await?;
        }
        debug!(listings = catalog.len(), "Removed vendor listings");

        self.engine
            .addresses()
            .delete_owner_addresses(Owner::Vendor(vendor_id))
            .await?;
        stores.relational.delete_vendor(vendor_id).await?;
        info!("Deleted vendor");
        Ok(())
    }

    /// Delete a supplier that no order position names.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the supplier does not exist.
    /// Returns `ConsistencyError::Referenced` while an order position names
    /// the supplier.
    #[instrument(skip(self), fields(supplier_id = %supplier_id))]
    pub async fn delete_supplier(&self, supplier_id: SupplierId) -> Result<()> {
        self.engine.accounts().supplier(supplier_id).await?;

        let stores = self.engine.stores();
        if let Some(holder) = first_holder(stores, &SupplierProbe::ORDER, supplier_id).await? {
            return Err(ConsistencyError::referenced(
                Entity::Supplier,
                supplier_id,
                holder.to_string(),
            ));
        }

        self.engine
            .addresses()
            .delete_owner_addresses(Owner::Supplier(supplier_id))
            .await?;
        stores.relational.delete_supplier(supplier_id).await?;
        info!("Deleted supplier");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tristore_core::{ActionType, PriceEuro};

    use super::*;
    use crate::EngineConfig;
    use crate::error::ErrorKind;
    use crate::models::{AddressCandidate, NewCustomer, NewSupplier, NewVendor, ProductInformation};
    use crate::store::memory::InMemoryStores;

    fn new_customer() -> NewCustomer {
        NewCustomer {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            user_name: "ada".into(),
            email: "ada@example.test".into(),
        }
    }

    fn new_vendor() -> NewVendor {
        NewVendor {
            name: "Acme".into(),
            user_name: "acme".into(),
            email: "sales@acme.test".into(),
            phone_number: None,
        }
    }

    fn gadget(inventory: i32) -> ProductInformation {
        ProductInformation {
            listing_id: None,
            name: "Gadget".into(),
            description: "A gadget".into(),
            unit_price: PriceEuro::from_cents(1250).unwrap(),
            inventory_level: inventory,
            categories: Vec::new(),
        }
    }

    fn home() -> AddressCandidate {
        AddressCandidate::new("1 Main St", "Vienna", "1010", "AT")
    }

    #[tokio::test]
    async fn test_delete_customer_refuses_while_cart_exists() {
        let handles = InMemoryStores::new();
        let engine = Engine::new(handles.stores(), &EngineConfig::default());
        let customer = engine.accounts().create_customer(new_customer()).await.unwrap();
        engine.carts().create_cart(customer.id).await.unwrap();

        let err = engine.cascade().delete_customer(customer.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferencedEntity);
        assert!(err.to_string().contains("ShoppingCart"));
        assert!(engine.accounts().customer(customer.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_purge_customer_clears_every_store() {
        let handles = InMemoryStores::new();
        let engine = Engine::new(handles.stores(), &EngineConfig::default());
        let accounts = engine.accounts();
        let customer = accounts.create_customer(new_customer()).await.unwrap();
        let vendor = accounts.create_vendor(new_vendor()).await.unwrap();
        let supplier = accounts
            .create_supplier(NewSupplier {
                name: "Parcel Co".into(),
                email: "ops@parcel.test".into(),
                phone_number: None,
            })
            .await
            .unwrap();
        let listing = engine
            .catalog()
            .create_vendor_product(vendor.id, gadget(5))
            .await
            .unwrap();
        let billing = engine
            .addresses()
            .create_or_reuse(Owner::Customer(customer.id), home())
            .await
            .unwrap();

        let carts = engine.carts();
        let ordered = carts.create_cart(customer.id).await.unwrap();
        carts.add_to_cart(ordered.id, listing, 2).await.unwrap();
        carts
            .place_order(ordered.id, billing.id, supplier.id)
            .await
            .unwrap();
        let pending = carts.create_cart(customer.id).await.unwrap();
        carts.add_to_cart(pending.id, listing, 1).await.unwrap();
        engine
            .documents()
            .record_action(customer.id, listing, ActionType::View)
            .await
            .unwrap();

        engine.cascade().purge_customer(customer.id).await.unwrap();

        assert_eq!(handles.relational.address_count(), 0);
        assert!(handles.documents.is_empty(DocumentCollection::CustomerAction));
        assert!(
            engine
                .stores()
                .relational
                .customer_orders(customer.id)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(!engine.stores().graph.listing_has_reservations(listing).await.unwrap());
        let err = accounts.customer(customer.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // The supplier is free again once the positions are gone.
        engine.cascade().delete_supplier(supplier.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_vendor_removes_listings_and_addresses() {
        let handles = InMemoryStores::new();
        let engine = Engine::new(handles.stores(), &EngineConfig::default());
        let vendor = engine.accounts().create_vendor(new_vendor()).await.unwrap();
        engine
            .catalog()
            .create_vendor_product(vendor.id, gadget(3))
            .await
            .unwrap();
        engine
            .addresses()
            .create_or_reuse(Owner::Vendor(vendor.id), home())
            .await
            .unwrap();

        engine.cascade().delete_vendor(vendor.id).await.unwrap();

        assert_eq!(handles.relational.product_count(), 0);
        assert_eq!(handles.graph.product_node_count(), 0);
        assert_eq!(handles.relational.address_count(), 0);
        assert_eq!(
            engine.accounts().vendor(vendor.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_delete_supplier_refuses_while_shipping() {
        let engine = Engine::in_memory();
        let accounts = engine.accounts();
        let customer = accounts.create_customer(new_customer()).await.unwrap();
        let vendor = accounts.create_vendor(new_vendor()).await.unwrap();
        let supplier = accounts
            .create_supplier(NewSupplier {
                name: "Parcel Co".into(),
                email: "ops@parcel.test".into(),
                phone_number: None,
            })
            .await
            .unwrap();
        let listing = engine
            .catalog()
            .create_vendor_product(vendor.id, gadget(2))
            .await
            .unwrap();
        let billing = engine
            .addresses()
            .create_or_reuse(Owner::Customer(customer.id), home())
            .await
            .unwrap();
        let cart = engine.carts().create_cart(customer.id).await.unwrap();
        engine.carts().add_to_cart(cart.id, listing, 1).await.unwrap();
        engine
            .carts()
            .place_order(cart.id, billing.id, supplier.id)
            .await
            .unwrap();

        let err = engine.cascade().delete_supplier(supplier.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferencedEntity);
    }
}
