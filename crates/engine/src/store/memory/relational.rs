//! In-memory relational store.
//!
//! All tables live behind one lock, so each trait call is atomic just like a
//! single SQL statement would be. Unique constraints mirror the migrations:
//! address content, (owner, address) per junction table, category name,
//! customer and vendor user names.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use tristore_core::{
    AddressId, CartId, CategoryId, CustomerId, ListingId, OrderId, OrderPositionId, OwnerKind,
    ProductId, SupplierId, VendorId,
};

use crate::models::{
    Address, AddressCandidate, Category, Customer, CustomerOrder, ListedProduct, Listing,
    OrderPosition, Owner, OwnerAddressReference, Product, Reservation, ShoppingCart, Supplier,
    Vendor,
};
use crate::store::{RelationalStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    customers: BTreeMap<CustomerId, Customer>,
    vendors: BTreeMap<VendorId, Vendor>,
    suppliers: BTreeMap<SupplierId, Supplier>,
    addresses: BTreeMap<AddressId, Address>,
    owner_references: HashMap<(Owner, AddressId), OwnerAddressReference>,
    products: BTreeMap<ProductId, Product>,
    listings: BTreeMap<ListingId, Listing>,
    categories: BTreeMap<CategoryId, Category>,
    carts: BTreeMap<CartId, ShoppingCart>,
    cart_items: BTreeMap<(CartId, ListingId), Reservation>,
    orders: BTreeMap<OrderId, CustomerOrder>,
    positions: BTreeMap<OrderPositionId, OrderPosition>,
}

/// Relational store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRelationalStore {
    tables: RwLock<Tables>,
}

impl InMemoryRelationalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of address rows.
    #[must_use]
    pub fn address_count(&self) -> usize {
        self.tables.read().addresses.len()
    }

    /// Number of junction rows for one owner kind.
    #[must_use]
    pub fn owner_reference_count(&self, kind: OwnerKind) -> usize {
        self.tables
            .read()
            .owner_references
            .keys()
            .filter(|(owner, _)| owner.kind() == kind)
            .count()
    }

    /// Number of product rows.
    #[must_use]
    pub fn product_count(&self) -> usize {
        self.tables.read().products.len()
    }

    /// Relational mirror of one reservation, if present.
    #[must_use]
    pub fn cart_item(&self, cart_id: CartId, listing_id: ListingId) -> Option<Reservation> {
        self.tables
            .read()
            .cart_items
            .get(&(cart_id, listing_id))
            .copied()
    }
}

fn conflict(what: impl std::fmt::Display) -> StoreError {
    StoreError::Conflict(what.to_string())
}

#[async_trait]
impl RelationalStore for InMemoryRelationalStore {
    // =========================================================================
    // Owners
    // =========================================================================

    async fn customer(&self, id: CustomerId) -> StoreResult<Option<Customer>> {
        Ok(self.tables.read().customers.get(&id).cloned())
    }

    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.customers.contains_key(&customer.id) {
            return Err(conflict(format_args!("customer {} exists", customer.id)));
        }
        if tables
            .customers
            .values()
            .any(|c| c.user_name == customer.user_name)
        {
            return Err(conflict(format_args!(
                "customer user name '{}' exists",
                customer.user_name
            )));
        }
        tables.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if tables
            .customers
            .values()
            .any(|c| c.id != customer.id && c.user_name == customer.user_name)
        {
            return Err(conflict(format_args!(
                "customer user name '{}' exists",
                customer.user_name
            )));
        }
        match tables.customers.get_mut(&customer.id) {
            Some(row) => {
                row.clone_from(customer);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_customer(&self, id: CustomerId) -> StoreResult<bool> {
        Ok(self.tables.write().customers.remove(&id).is_some())
    }

    async fn vendor(&self, id: VendorId) -> StoreResult<Option<Vendor>> {
        Ok(self.tables.read().vendors.get(&id).cloned())
    }

    async fn insert_vendor(&self, vendor: &Vendor) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.vendors.contains_key(&vendor.id) {
            return Err(conflict(format_args!("vendor {} exists", vendor.id)));
        }
        if tables.vendors.values().any(|v| v.user_name == vendor.user_name) {
            return Err(conflict(format_args!(
                "vendor user name '{}' exists",
                vendor.user_name
            )));
        }
        tables.vendors.insert(vendor.id, vendor.clone());
        Ok(())
    }

    async fn update_vendor(&self, vendor: &Vendor) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if tables
            .vendors
            .values()
            .any(|v| v.id != vendor.id && v.user_name == vendor.user_name)
        {
            return Err(conflict(format_args!(
                "vendor user name '{}' exists",
                vendor.user_name
            )));
        }
        match tables.vendors.get_mut(&vendor.id) {
            Some(row) => {
                row.clone_from(vendor);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_vendor(&self, id: VendorId) -> StoreResult<bool> {
        Ok(self.tables.write().vendors.remove(&id).is_some())
    }

    async fn supplier(&self, id: SupplierId) -> StoreResult<Option<Supplier>> {
        Ok(self.tables.read().suppliers.get(&id).cloned())
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.suppliers.contains_key(&supplier.id) {
            return Err(conflict(format_args!("supplier {} exists", supplier.id)));
        }
        tables.suppliers.insert(supplier.id, supplier.clone());
        Ok(())
    }

    async fn update_supplier(&self, supplier: &Supplier) -> StoreResult<bool> {
        match self.tables.write().suppliers.get_mut(&supplier.id) {
            Some(row) => {
                row.clone_from(supplier);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_supplier(&self, id: SupplierId) -> StoreResult<bool> {
        Ok(self.tables.write().suppliers.remove(&id).is_some())
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    async fn address(&self, id: AddressId) -> StoreResult<Option<Address>> {
        Ok(self.tables.read().addresses.get(&id).cloned())
    }

    async fn find_address(&self, candidate: &AddressCandidate) -> StoreResult<Option<Address>> {
        Ok(self
            .tables
            .read()
            .addresses
            .values()
            .find(|a| a.matches(candidate))
            .cloned())
    }

    async fn insert_address(&self, address: &Address) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.addresses.contains_key(&address.id) {
            return Err(conflict(format_args!("address {} exists", address.id)));
        }
        let duplicate = tables.addresses.values().any(|a| {
            a.street == address.street
                && a.city == address.city
                && a.postal_code == address.postal_code
                && a.country == address.country
        });
        if duplicate {
            return Err(conflict("address content already stored"));
        }
        tables.addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn delete_address(&self, id: AddressId) -> StoreResult<bool> {
        Ok(self.tables.write().addresses.remove(&id).is_some())
    }

    async fn owner_reference(
        &self,
        owner: Owner,
        address_id: AddressId,
    ) -> StoreResult<Option<OwnerAddressReference>> {
        Ok(self
            .tables
            .read()
            .owner_references
            .get(&(owner, address_id))
            .cloned())
    }

    async fn insert_owner_reference(&self, reference: &OwnerAddressReference) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let key = (reference.owner, reference.address_id);
        if tables.owner_references.contains_key(&key) {
            return Err(conflict(format_args!(
                "{} already references address {}",
                reference.owner, reference.address_id
            )));
        }
        tables.owner_references.insert(key, reference.clone());
        Ok(())
    }

    async fn delete_owner_reference(
        &self,
        owner: Owner,
        address_id: AddressId,
    ) -> StoreResult<u64> {
        let removed = self
            .tables
            .write()
            .owner_references
            .remove(&(owner, address_id));
        Ok(u64::from(removed.is_some()))
    }

    async fn has_owner_reference(
        &self,
        kind: OwnerKind,
        address_id: AddressId,
    ) -> StoreResult<bool> {
        Ok(self
            .tables
            .read()
            .owner_references
            .keys()
            .any(|(owner, address)| owner.kind() == kind && *address == address_id))
    }

    async fn owner_addresses(&self, owner: Owner) -> StoreResult<Vec<Address>> {
        let tables = self.tables.read();
        let mut addresses: Vec<Address> = tables
            .owner_references
            .keys()
            .filter(|(o, _)| *o == owner)
            .filter_map(|(_, address_id)| tables.addresses.get(address_id).cloned())
            .collect();
        addresses.sort_by_key(|a| a.id);
        Ok(addresses)
    }

    async fn has_delivery_reference(&self, address_id: AddressId) -> StoreResult<bool> {
        Ok(self
            .tables
            .read()
            .positions
            .values()
            .any(|p| p.delivery_address_id == address_id))
    }

    async fn has_billing_reference(&self, address_id: AddressId) -> StoreResult<bool> {
        Ok(self
            .tables
            .read()
            .orders
            .values()
            .any(|o| o.billing_address_id == address_id))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.tables.read().products.get(&id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.products.contains_key(&product.id) {
            return Err(conflict(format_args!("product {} exists", product.id)));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> StoreResult<bool> {
        Ok(self.tables.write().products.remove(&id).is_some())
    }

    async fn find_product_listed_elsewhere(
        &self,
        name: &str,
        vendor_id: VendorId,
    ) -> StoreResult<Option<Product>> {
        let tables = self.tables.read();
        Ok(tables
            .listings
            .values()
            .filter(|l| l.vendor_id != vendor_id)
            .filter_map(|l| tables.products.get(&l.product_id))
            .find(|p| p.name == name)
            .cloned())
    }

    async fn find_product(&self, name: &str, description: &str) -> StoreResult<Option<Product>> {
        Ok(self
            .tables
            .read()
            .products
            .values()
            .find(|p| p.name == name && p.description == description)
            .cloned())
    }

    async fn listing(&self, id: ListingId) -> StoreResult<Option<Listing>> {
        Ok(self.tables.read().listings.get(&id).cloned())
    }

    async fn insert_listing(&self, listing: &Listing) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.listings.contains_key(&listing.id) {
            return Err(conflict(format_args!("listing {} exists", listing.id)));
        }
        tables.listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn update_listing(&self, listing: &Listing) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.listings.get_mut(&listing.id) {
            Some(row) => {
                *row = listing.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_listing(&self, id: ListingId) -> StoreResult<bool> {
        Ok(self.tables.write().listings.remove(&id).is_some())
    }

    async fn vendor_catalog(&self, vendor_id: VendorId) -> StoreResult<Vec<ListedProduct>> {
        let tables = self.tables.read();
        tables
            .listings
            .values()
            .filter(|l| l.vendor_id == vendor_id)
            .map(|listing| {
                let product = tables.products.get(&listing.product_id).ok_or_else(|| {
                    StoreError::DataCorruption(format!(
                        "listing {} points at missing product {}",
                        listing.id, listing.product_id
                    ))
                })?;
                Ok(ListedProduct {
                    listing: listing.clone(),
                    product: product.clone(),
                })
            })
            .collect()
    }

    async fn has_listing_for_product(&self, product_id: ProductId) -> StoreResult<bool> {
        Ok(self
            .tables
            .read()
            .listings
            .values()
            .any(|l| l.product_id == product_id))
    }

    async fn decrement_inventory(&self, id: ListingId, amount: i32) -> StoreResult<Option<i32>> {
        let mut tables = self.tables.write();
        match tables.listings.get_mut(&id) {
            Some(listing) if listing.inventory_level >= amount => {
                listing.inventory_level -= amount;
                Ok(Some(listing.inventory_level))
            }
            _ => Ok(None),
        }
    }

    async fn category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.tables.read().categories.get(&id).cloned())
    }

    async fn category_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        Ok(self
            .tables
            .read()
            .categories
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.categories.contains_key(&category.id)
            || tables.categories.values().any(|c| c.name == category.name)
        {
            return Err(conflict(format_args!("category '{}' exists", category.name)));
        }
        tables.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if tables
            .categories
            .values()
            .any(|c| c.id != category.id && c.name == category.name)
        {
            return Err(conflict(format_args!("category '{}' exists", category.name)));
        }
        match tables.categories.get_mut(&category.id) {
            Some(row) => {
                row.name.clone_from(&category.name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<bool> {
        Ok(self.tables.write().categories.remove(&id).is_some())
    }

    // =========================================================================
    // Carts
    // =========================================================================

    async fn cart(&self, id: CartId) -> StoreResult<Option<ShoppingCart>> {
        Ok(self.tables.read().carts.get(&id).cloned())
    }

    async fn insert_cart(&self, cart: &ShoppingCart) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.carts.contains_key(&cart.id) {
            return Err(conflict(format_args!("cart {} exists", cart.id)));
        }
        tables.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn delete_cart(&self, id: CartId) -> StoreResult<bool> {
        Ok(self.tables.write().carts.remove(&id).is_some())
    }

    async fn customer_carts(&self, customer_id: CustomerId) -> StoreResult<Vec<ShoppingCart>> {
        Ok(self
            .tables
            .read()
            .carts
            .values()
            .filter(|c| c.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn upsert_cart_item(&self, reservation: &Reservation) -> StoreResult<()> {
        self.tables
            .write()
            .cart_items
            .insert((reservation.cart_id, reservation.listing_id), *reservation);
        Ok(())
    }

    async fn delete_cart_item(&self, cart_id: CartId, listing_id: ListingId) -> StoreResult<bool> {
        Ok(self
            .tables
            .write()
            .cart_items
            .remove(&(cart_id, listing_id))
            .is_some())
    }

    async fn delete_cart_items_for_listing(&self, listing_id: ListingId) -> StoreResult<u64> {
        let mut tables = self.tables.write();
        let before = tables.cart_items.len();
        tables.cart_items.retain(|(_, l), _| *l != listing_id);
        Ok((before - tables.cart_items.len()) as u64)
    }

    async fn delete_cart_items_for_customer(&self, customer_id: CustomerId) -> StoreResult<u64> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;
        let before = tables.cart_items.len();
        let carts = &tables.carts;
        tables.cart_items.retain(|(cart_id, _), _| {
            carts
                .get(cart_id)
                .is_none_or(|cart| cart.customer_id != customer_id)
        });
        Ok((before - tables.cart_items.len()) as u64)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    async fn insert_order(&self, order: &CustomerOrder) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.orders.contains_key(&order.id) {
            return Err(conflict(format_args!("order {} exists", order.id)));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn customer_orders(&self, customer_id: CustomerId) -> StoreResult<Vec<CustomerOrder>> {
        Ok(self
            .tables
            .read()
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn delete_order(&self, id: OrderId) -> StoreResult<bool> {
        Ok(self.tables.write().orders.remove(&id).is_some())
    }

    async fn insert_order_position(&self, position: &OrderPosition) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.positions.contains_key(&position.id) {
            return Err(conflict(format_args!("order position {} exists", position.id)));
        }
        tables.positions.insert(position.id, position.clone());
        Ok(())
    }

    async fn order_positions(&self, order_id: OrderId) -> StoreResult<Vec<OrderPosition>> {
        Ok(self
            .tables
            .read()
            .positions
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn delete_order_positions(&self, order_id: OrderId) -> StoreResult<u64> {
        let mut tables = self.tables.write();
        let before = tables.positions.len();
        tables.positions.retain(|_, p| p.order_id != order_id);
        Ok((before - tables.positions.len()) as u64)
    }

    async fn has_position_for_listing(&self, listing_id: ListingId) -> StoreResult<bool> {
        Ok(self
            .tables
            .read()
            .positions
            .values()
            .any(|p| p.listing_id == listing_id))
    }

    async fn positions_for_listing(&self, listing_id: ListingId) -> StoreResult<Vec<OrderPosition>> {
        Ok(self
            .tables
            .read()
            .positions
            .values()
            .filter(|p| p.listing_id == listing_id)
            .cloned()
            .collect())
    }

    async fn delete_positions_for_listing(&self, listing_id: ListingId) -> StoreResult<u64> {
        let mut tables = self.tables.write();
        let before = tables.positions.len();
        tables.positions.retain(|_, p| p.listing_id != listing_id);
        Ok((before - tables.positions.len()) as u64)
    }

    async fn has_position_for_supplier(&self, supplier_id: SupplierId) -> StoreResult<bool> {
        Ok(self
            .tables
            .read()
            .positions
            .values()
            .any(|p| p.supplier_id == supplier_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tristore_core::PriceEuro;

    fn listing(id: i32, inventory_level: i32) -> Listing {
        Listing {
            id: ListingId::new(id),
            vendor_id: VendorId::new(1),
            product_id: ProductId::new(1),
            unit_price: PriceEuro::from_cents(500).unwrap(),
            inventory_level,
        }
    }

    #[tokio::test]
    async fn test_address_content_is_unique() {
        let store = InMemoryRelationalStore::new();
        let candidate = AddressCandidate::new("Main St 1", "Springfield", "12345", "US");
        store
            .insert_address(&Address::from_candidate(AddressId::new(1), candidate.clone()))
            .await
            .unwrap();

        let err = store
            .insert_address(&Address::from_candidate(AddressId::new(2), candidate))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.address_count(), 1);
    }

    #[tokio::test]
    async fn test_decrement_inventory_guards_against_negative() {
        let store = InMemoryRelationalStore::new();
        store.insert_listing(&listing(1, 10)).await.unwrap();

        assert_eq!(
            store.decrement_inventory(ListingId::new(1), 4).await.unwrap(),
            Some(6)
        );
        assert_eq!(
            store.decrement_inventory(ListingId::new(1), 7).await.unwrap(),
            None
        );
        assert_eq!(
            store.decrement_inventory(ListingId::new(99), 1).await.unwrap(),
            None
        );
        let row = store.listing(ListingId::new(1)).await.unwrap().unwrap();
        assert_eq!(row.inventory_level, 6);
    }

    #[tokio::test]
    async fn test_product_listed_elsewhere_ignores_own_listings() {
        let store = InMemoryRelationalStore::new();
        let product = Product {
            id: ProductId::new(1),
            name: "Widget".to_string(),
            description: "A widget".to_string(),
        };
        store.insert_product(&product).await.unwrap();
        store.insert_listing(&listing(1, 10)).await.unwrap();

        let own = store
            .find_product_listed_elsewhere("Widget", VendorId::new(1))
            .await
            .unwrap();
        assert!(own.is_none());

        let other = store
            .find_product_listed_elsewhere("Widget", VendorId::new(2))
            .await
            .unwrap();
        assert_eq!(other, Some(product));

        let case_differs = store
            .find_product_listed_elsewhere("widget", VendorId::new(2))
            .await
            .unwrap();
        assert!(case_differs.is_none());
    }

    #[tokio::test]
    async fn test_category_name_conflict_on_update() {
        let store = InMemoryRelationalStore::new();
        for (id, name) in [(1, "Tools"), (2, "Garden")] {
            store
                .insert_category(&Category {
                    id: CategoryId::new(id),
                    name: name.to_string(),
                })
                .await
                .unwrap();
        }

        let renamed = Category {
            id: CategoryId::new(2),
            name: "Tools".to_string(),
        };
        assert!(store.update_category(&renamed).await.unwrap_err().is_conflict());
    }
}
