//! Integration tests for Tristore.
//!
//! # Running Tests
//!
//! ```bash
//! # Scenario tests against the in-memory stores
//! cargo test -p tristore-integration-tests
//!
//! # Include the PostgreSQL adapter tests
//! TRISTORE_DATABASE_URL=postgres://... cargo test -p tristore-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `catalog` - Product dedup, category guards, listing removal
//! - `cart` - Reservations, checkout, concurrent stock
//! - `addresses` - Address reuse and garbage collection
//! - `cascade` - Root-entity deletion
//! - `partial_failure` - Behavior when a later store fails
//! - `postgres_store` - Relational adapter against a live database

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use tristore_core::{AddressId, CustomerId, ListingId, PriceEuro, SupplierId, VendorId};
use tristore_engine::models::{
    AddressCandidate, NewCustomer, NewSupplier, NewVendor, Owner, ProductInformation,
};
use tristore_engine::store::memory::InMemoryStores;
use tristore_engine::{Engine, EngineConfig};

/// An engine over in-memory stores, keeping the typed store handles for
/// inspection and failure injection.
pub struct TestContext {
    pub stores: InMemoryStores,
    pub engine: Engine,
}

impl TestContext {
    /// Fresh stores with default configuration.
    #[must_use]
    pub fn new() -> Self {
        let stores = InMemoryStores::new();
        let engine = Engine::new(stores.stores(), &EngineConfig::default());
        Self { stores, engine }
    }

    pub async fn customer(&self, user_name: &str) -> CustomerId {
        self.engine
            .accounts()
            .create_customer(NewCustomer {
                first_name: "Test".into(),
                last_name: "Customer".into(),
                user_name: user_name.into(),
                email: format!("{user_name}@example.test"),
            })
            .await
            .expect("Failed to create customer")
            .id
    }

    pub async fn vendor(&self, name: &str) -> VendorId {
        let user_name = name.to_lowercase();
        self.engine
            .accounts()
            .create_vendor(NewVendor {
                name: name.into(),
                email: format!("sales@{user_name}.test"),
                user_name,
                phone_number: None,
            })
            .await
            .expect("Failed to create vendor")
            .id
    }

    pub async fn supplier(&self, name: &str) -> SupplierId {
        self.engine
            .accounts()
            .create_supplier(NewSupplier {
                name: name.into(),
                email: "ops@supplier.test".into(),
                phone_number: None,
            })
            .await
            .expect("Failed to create supplier")
            .id
    }

    /// Attach `candidate` to a customer and return the address id.
    pub async fn customer_address(
        &self,
        customer: CustomerId,
        candidate: AddressCandidate,
    ) -> AddressId {
        self.engine
            .addresses()
            .create_or_reuse(Owner::Customer(customer), candidate)
            .await
            .expect("Failed to create address")
            .id
    }

    pub async fn listing(&self, vendor: VendorId, product: ProductInformation) -> ListingId {
        self.engine
            .catalog()
            .create_vendor_product(vendor, product)
            .await
            .expect("Failed to create listing")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Listing input with no categories.
#[must_use]
pub fn product(name: &str, cents: i64, inventory: i32) -> ProductInformation {
    ProductInformation {
        listing_id: None,
        name: name.into(),
        description: format!("{name} description"),
        unit_price: PriceEuro::from_cents(cents).expect("valid price"),
        inventory_level: inventory,
        categories: Vec::new(),
    }
}

/// The address used across scenarios.
#[must_use]
pub fn main_street() -> AddressCandidate {
    AddressCandidate::new("Main St 1", "Springfield", "12345", "US")
}
