//! Store adapters for the three independent stores.
//!
//! # Stores
//!
//! - [`RelationalStore`] - entity rows and referential columns (authoritative
//!   for addresses, owners, products, listings, categories, carts, orders)
//! - [`GraphStore`] - `Product`, `Category`, `ShoppingCart` and
//!   `VendorToProduct` nodes, `HAS_CATEGORY` and `IS_IN` edges (authoritative
//!   for product-category links and cart reservations)
//! - [`DocumentStore`] - reviews, recommendations, customer actions and media
//!   metadata
//! - [`IdAllocator`] - atomic per-sequence id counters
//!
//! No transaction spans two stores. The engine services decide the write
//! order; adapters only promise that each single call is atomic.
//!
//! # Implementations
//!
//! - [`memory`] - in-process adapters for all four traits
//! - `postgres` (feature `postgres`) - `sqlx` adapter for the relational
//!   store and the id allocator

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use tristore_core::{
    AddressId, CartId, CategoryId, CustomerId, ListingId, OrderId, OwnerKind, ProductId,
    SupplierId, VendorId,
};

use crate::models::{
    Address, AddressCandidate, Category, Customer, CustomerOrder, Document, DocumentCollection,
    DocumentFilter, ListedProduct, Listing, OrderPosition, Owner, OwnerAddressReference, Product,
    Reservation, ShoppingCart, Supplier, Vendor,
};

/// Which store an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Relational,
    Graph,
    Document,
    IdAllocator,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relational => write!(f, "relational"),
            Self::Graph => write!(f, "graph"),
            Self::Document => write!(f, "document"),
            Self::IdAllocator => write!(f, "id allocator"),
        }
    }
}

/// Errors that can occur during adapter operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store could not be reached or timed out.
    #[error("{store} store unavailable: {message}")]
    Unavailable {
        /// Store that failed.
        store: StoreKind,
        /// Adapter-provided detail.
        message: String,
    },

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Uniqueness constraint violation.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Convenience constructor for [`StoreError::Unavailable`].
    pub fn unavailable(store: StoreKind, message: impl Into<String>) -> Self {
        Self::Unavailable {
            store,
            message: message.into(),
        }
    }

    /// Whether this error is a uniqueness violation.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Result alias for adapter calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Named id sequences.
///
/// Replaces "max existing value + 1" scans: each call to
/// [`IdAllocator::next_id`] hands out a value nobody else will receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdSequence {
    Customer,
    Vendor,
    Supplier,
    Address,
    CustomerAddress,
    VendorAddress,
    SupplierAddress,
    Product,
    Listing,
    Category,
    Cart,
    Order,
    OrderPosition,
    Document(DocumentCollection),
}

impl IdSequence {
    /// Sequences backed by a relational table of the same name.
    pub const RELATIONAL: [Self; 13] = [
        Self::Customer,
        Self::Vendor,
        Self::Supplier,
        Self::Address,
        Self::CustomerAddress,
        Self::VendorAddress,
        Self::SupplierAddress,
        Self::Product,
        Self::Listing,
        Self::Category,
        Self::Cart,
        Self::Order,
        Self::OrderPosition,
    ];

    /// Junction-table sequence for an owner kind.
    #[must_use]
    pub const fn owner_reference(kind: OwnerKind) -> Self {
        match kind {
            OwnerKind::Customer => Self::CustomerAddress,
            OwnerKind::Vendor => Self::VendorAddress,
            OwnerKind::Supplier => Self::SupplierAddress,
        }
    }

    /// Stable sequence name, used as the key in persistent allocators.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Vendor => "vendor",
            Self::Supplier => "supplier",
            Self::Address => "address",
            Self::CustomerAddress => "customer_address",
            Self::VendorAddress => "vendor_address",
            Self::SupplierAddress => "supplier_address",
            Self::Product => "product",
            Self::Listing => "vendor_to_product",
            Self::Category => "category",
            Self::Cart => "shopping_cart",
            Self::Order => "customer_order",
            Self::OrderPosition => "order_position",
            Self::Document(DocumentCollection::Review) => "review",
            Self::Document(DocumentCollection::ProductRecommendation) => "product_recommendation",
            Self::Document(DocumentCollection::CustomerAction) => "customer_action",
            Self::Document(DocumentCollection::ProductImage) => "product_image",
            Self::Document(DocumentCollection::ProductVideo) => "product_video",
        }
    }
}

/// Atomic id allocation.
#[async_trait]
pub trait IdAllocator: Send + Sync {
    /// Allocate the next id of `sequence`. Never returns the same value twice.
    async fn next_id(&self, sequence: IdSequence) -> StoreResult<i32>;

    /// Move `sequence` forward so the next id is at least `last + 1`.
    /// Never moves a sequence backwards.
    async fn advance_to(&self, sequence: IdSequence, last: i32) -> StoreResult<()>;
}

/// Relational store adapter.
///
/// Mutating calls return the number of affected rows (or whether a row was
/// affected) so that callers can treat missing rows as no-ops.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    // =========================================================================
    // Owners
    // =========================================================================

    async fn customer(&self, id: CustomerId) -> StoreResult<Option<Customer>>;
    /// Fails with [`StoreError::Conflict`] if the id or the user name exists.
    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()>;
    async fn update_customer(&self, customer: &Customer) -> StoreResult<bool>;
    async fn delete_customer(&self, id: CustomerId) -> StoreResult<bool>;

    async fn vendor(&self, id: VendorId) -> StoreResult<Option<Vendor>>;
    /// Fails with [`StoreError::Conflict`] if the id or the user name exists.
    async fn insert_vendor(&self, vendor: &Vendor) -> StoreResult<()>;
    async fn update_vendor(&self, vendor: &Vendor) -> StoreResult<bool>;
    async fn delete_vendor(&self, id: VendorId) -> StoreResult<bool>;

    async fn supplier(&self, id: SupplierId) -> StoreResult<Option<Supplier>>;
    async fn insert_supplier(&self, supplier: &Supplier) -> StoreResult<()>;
    async fn update_supplier(&self, supplier: &Supplier) -> StoreResult<bool>;
    async fn delete_supplier(&self, id: SupplierId) -> StoreResult<bool>;

    // =========================================================================
    // Addresses
    // =========================================================================

    async fn address(&self, id: AddressId) -> StoreResult<Option<Address>>;
    /// Exact content match on all four address fields.
    async fn find_address(&self, candidate: &AddressCandidate) -> StoreResult<Option<Address>>;
    /// Fails with [`StoreError::Conflict`] if the id or the content exists.
    async fn insert_address(&self, address: &Address) -> StoreResult<()>;
    async fn delete_address(&self, id: AddressId) -> StoreResult<bool>;

    async fn owner_reference(
        &self,
        owner: Owner,
        address_id: AddressId,
    ) -> StoreResult<Option<OwnerAddressReference>>;
    /// Fails with [`StoreError::Conflict`] if the (owner, address) pair exists.
    async fn insert_owner_reference(&self, reference: &OwnerAddressReference) -> StoreResult<()>;
    async fn delete_owner_reference(&self, owner: Owner, address_id: AddressId)
    -> StoreResult<u64>;
    /// Whether any owner of `kind` references the address.
    async fn has_owner_reference(&self, kind: OwnerKind, address_id: AddressId)
    -> StoreResult<bool>;
    async fn owner_addresses(&self, owner: Owner) -> StoreResult<Vec<Address>>;
    /// Whether any order position delivers to the address.
    async fn has_delivery_reference(&self, address_id: AddressId) -> StoreResult<bool>;
    /// Whether any order bills to the address.
    async fn has_billing_reference(&self, address_id: AddressId) -> StoreResult<bool>;

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>>;
    async fn insert_product(&self, product: &Product) -> StoreResult<()>;
    async fn delete_product(&self, id: ProductId) -> StoreResult<bool>;
    /// A product with exactly this name listed by some vendor other than
    /// `vendor_id`.
    async fn find_product_listed_elsewhere(
        &self,
        name: &str,
        vendor_id: VendorId,
    ) -> StoreResult<Option<Product>>;
    /// A product with exactly this name and description.
    async fn find_product(&self, name: &str, description: &str) -> StoreResult<Option<Product>>;

    async fn listing(&self, id: ListingId) -> StoreResult<Option<Listing>>;
    async fn insert_listing(&self, listing: &Listing) -> StoreResult<()>;
    async fn update_listing(&self, listing: &Listing) -> StoreResult<bool>;
    async fn delete_listing(&self, id: ListingId) -> StoreResult<bool>;
    async fn vendor_catalog(&self, vendor_id: VendorId) -> StoreResult<Vec<ListedProduct>>;
    async fn has_listing_for_product(&self, product_id: ProductId) -> StoreResult<bool>;
    /// Compare-and-swap decrement: subtracts `amount` only while
    /// `inventory_level >= amount`. Returns the new level, or `None` when the
    /// listing is missing or the guard failed.
    async fn decrement_inventory(&self, id: ListingId, amount: i32) -> StoreResult<Option<i32>>;

    async fn category(&self, id: CategoryId) -> StoreResult<Option<Category>>;
    async fn category_by_name(&self, name: &str) -> StoreResult<Option<Category>>;
    async fn insert_category(&self, category: &Category) -> StoreResult<()>;
    async fn update_category(&self, category: &Category) -> StoreResult<bool>;
    async fn delete_category(&self, id: CategoryId) -> StoreResult<bool>;

    // =========================================================================
    // Carts
    // =========================================================================

    async fn cart(&self, id: CartId) -> StoreResult<Option<ShoppingCart>>;
    async fn insert_cart(&self, cart: &ShoppingCart) -> StoreResult<()>;
    async fn delete_cart(&self, id: CartId) -> StoreResult<bool>;
    async fn customer_carts(&self, customer_id: CustomerId) -> StoreResult<Vec<ShoppingCart>>;

    /// Relational mirror of a reservation (`product_to_cart`). Insert or
    /// overwrite.
    async fn upsert_cart_item(&self, reservation: &Reservation) -> StoreResult<()>;
    async fn delete_cart_item(&self, cart_id: CartId, listing_id: ListingId) -> StoreResult<bool>;
    async fn delete_cart_items_for_listing(&self, listing_id: ListingId) -> StoreResult<u64>;
    async fn delete_cart_items_for_customer(&self, customer_id: CustomerId) -> StoreResult<u64>;

    // =========================================================================
    // Orders
    // =========================================================================

    async fn insert_order(&self, order: &CustomerOrder) -> StoreResult<()>;
    async fn customer_orders(&self, customer_id: CustomerId) -> StoreResult<Vec<CustomerOrder>>;
    async fn delete_order(&self, id: OrderId) -> StoreResult<bool>;
    async fn insert_order_position(&self, position: &OrderPosition) -> StoreResult<()>;
    async fn order_positions(&self, order_id: OrderId) -> StoreResult<Vec<OrderPosition>>;
    async fn delete_order_positions(&self, order_id: OrderId) -> StoreResult<u64>;
    async fn has_position_for_listing(&self, listing_id: ListingId) -> StoreResult<bool>;
    async fn positions_for_listing(&self, listing_id: ListingId) -> StoreResult<Vec<OrderPosition>>;
    async fn delete_positions_for_listing(&self, listing_id: ListingId) -> StoreResult<u64>;
    async fn has_position_for_supplier(&self, supplier_id: SupplierId) -> StoreResult<bool>;
}

/// Graph store adapter.
///
/// Labels: `Product`, `Category`, `ShoppingCart`, `VendorToProduct`.
/// Edges: `(Product)-[:HAS_CATEGORY]->(Category)` and
/// `(VendorToProduct)-[:IS_IN {Amount}]->(ShoppingCart)`.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // Product nodes
    async fn insert_product_node(&self, product: &Product) -> StoreResult<()>;
    async fn product_node_exists(&self, id: ProductId) -> StoreResult<bool>;
    /// Detach-deletes the node.
    async fn delete_product_node(&self, id: ProductId) -> StoreResult<bool>;

    // Category nodes
    async fn insert_category_node(&self, category: &Category) -> StoreResult<()>;
    async fn category_node(&self, id: CategoryId) -> StoreResult<Option<Category>>;
    async fn category_node_by_name(&self, name: &str) -> StoreResult<Option<Category>>;
    async fn update_category_node(&self, category: &Category) -> StoreResult<bool>;
    async fn delete_category_node(&self, id: CategoryId) -> StoreResult<bool>;

    // VendorToProduct nodes
    async fn insert_listing_node(&self, listing: &Listing) -> StoreResult<()>;
    async fn listing_node(&self, id: ListingId) -> StoreResult<Option<Listing>>;
    async fn update_listing_node(&self, listing: &Listing) -> StoreResult<bool>;
    /// Detach-deletes the node.
    async fn delete_listing_node(&self, id: ListingId) -> StoreResult<bool>;

    // ShoppingCart nodes
    async fn insert_cart_node(&self, cart: &ShoppingCart) -> StoreResult<()>;
    async fn cart_node_exists(&self, id: CartId) -> StoreResult<bool>;
    async fn customer_has_cart_node(&self, customer_id: CustomerId) -> StoreResult<bool>;
    async fn delete_cart_node(&self, id: CartId) -> StoreResult<bool>;

    // HAS_CATEGORY
    async fn has_category_edge(
        &self,
        product_id: ProductId,
        category_id: CategoryId,
    ) -> StoreResult<bool>;
    async fn insert_category_edge(
        &self,
        product_id: ProductId,
        category_id: CategoryId,
    ) -> StoreResult<()>;
    async fn delete_category_edge(
        &self,
        product_id: ProductId,
        category_id: CategoryId,
    ) -> StoreResult<bool>;
    async fn delete_category_edges(&self, product_id: ProductId) -> StoreResult<u64>;
    async fn product_categories(&self, product_id: ProductId) -> StoreResult<Vec<CategoryId>>;
    async fn category_has_products(&self, category_id: CategoryId) -> StoreResult<bool>;

    // IS_IN
    async fn reservation(
        &self,
        cart_id: CartId,
        listing_id: ListingId,
    ) -> StoreResult<Option<Reservation>>;
    /// Creates the edge or overwrites its amount.
    async fn put_reservation(&self, reservation: &Reservation) -> StoreResult<()>;
    async fn delete_reservation(&self, cart_id: CartId, listing_id: ListingId)
    -> StoreResult<bool>;
    async fn cart_reservations(&self, cart_id: CartId) -> StoreResult<Vec<Reservation>>;
    async fn listing_has_reservations(&self, listing_id: ListingId) -> StoreResult<bool>;
    async fn delete_listing_reservations(&self, listing_id: ListingId) -> StoreResult<u64>;
    /// Deletes every reservation in any cart of the customer.
    async fn delete_customer_reservations(&self, customer_id: CustomerId) -> StoreResult<u64>;
}

/// Document store adapter.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, document: &Document) -> StoreResult<()>;
    async fn find_one(
        &self,
        collection: DocumentCollection,
        filter: DocumentFilter,
    ) -> StoreResult<Option<Document>>;
    async fn find(
        &self,
        collection: DocumentCollection,
        filter: DocumentFilter,
    ) -> StoreResult<Vec<Document>>;
    async fn delete_many(
        &self,
        collection: DocumentCollection,
        filter: DocumentFilter,
    ) -> StoreResult<u64>;
    async fn find_one_and_delete(
        &self,
        collection: DocumentCollection,
        filter: DocumentFilter,
    ) -> StoreResult<Option<Document>>;
    /// Replaces the body of the first matching document and returns the
    /// updated document.
    async fn find_one_and_update(
        &self,
        collection: DocumentCollection,
        filter: DocumentFilter,
        body: serde_json::Value,
    ) -> StoreResult<Option<Document>>;
}

/// The set of store handles an engine runs against.
#[derive(Clone)]
pub struct Stores {
    pub relational: Arc<dyn RelationalStore>,
    pub graph: Arc<dyn GraphStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub ids: Arc<dyn IdAllocator>,
}

impl Stores {
    /// Bundle existing adapters.
    #[must_use]
    pub fn new(
        relational: Arc<dyn RelationalStore>,
        graph: Arc<dyn GraphStore>,
        documents: Arc<dyn DocumentStore>,
        ids: Arc<dyn IdAllocator>,
    ) -> Self {
        Self {
            relational,
            graph,
            documents,
            ids,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
