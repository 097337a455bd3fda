//! The engine handle shared across tasks.

use std::sync::Arc;

use chrono::TimeDelta;

use tristore_core::{AddressId, ListingId};

use crate::config::EngineConfig;
use crate::locks::EntityLocks;
use crate::services::{
    AccountService, AddressService, CartService, CascadeService, CatalogService, DocumentService,
};
use crate::store::Stores;

/// Entry point to every engine operation.
///
/// Cheap to clone; clones share the stores and the lock tables. Each
/// accessor returns a borrowed service grouping one component's operations:
///
/// ```
/// # async fn demo() -> Result<(), tristore_engine::ConsistencyError> {
/// use tristore_engine::Engine;
/// use tristore_engine::models::NewVendor;
///
/// let engine = Engine::in_memory();
/// let vendor = engine
///     .accounts()
///     .create_vendor(NewVendor {
///         name: "Acme".into(),
///         user_name: "acme".into(),
///         email: "sales@acme.test".into(),
///         phone_number: None,
///     })
///     .await?;
/// assert_eq!(engine.catalog().vendor_listings(vendor.id).await?.len(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    stores: Stores,
    listing_locks: EntityLocks<ListingId>,
    // Held from an address lookup to the write that references it, and
    // across the reference scan and delete of garbage collection.
    address_locks: EntityLocks<AddressId>,
    // Serializes product dedup, listing creation and product collection.
    catalog_lock: tokio::sync::Mutex<()>,
    delivery_lead: TimeDelta,
}

impl Engine {
    /// Create an engine over the given stores.
    #[must_use]
    pub fn new(stores: Stores, config: &EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                stores,
                listing_locks: EntityLocks::new(),
                address_locks: EntityLocks::new(),
                catalog_lock: tokio::sync::Mutex::new(()),
                delivery_lead: config.delivery_lead(),
            }),
        }
    }

    /// Engine over fresh in-memory stores with default configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Stores::in_memory(), &EngineConfig::default())
    }

    /// The underlying store handles.
    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    pub(crate) fn listing_locks(&self) -> &EntityLocks<ListingId> {
        &self.inner.listing_locks
    }

    pub(crate) fn address_locks(&self) -> &EntityLocks<AddressId> {
        &self.inner.address_locks
    }

    pub(crate) async fn lock_catalog(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.catalog_lock.lock().await
    }

    pub(crate) fn delivery_lead(&self) -> TimeDelta {
        self.inner.delivery_lead
    }

    /// Owner accounts.
    #[must_use]
    pub const fn accounts(&self) -> AccountService<'_> {
        AccountService::new(self)
    }

    /// Address deduplication and reference counting.
    #[must_use]
    pub const fn addresses(&self) -> AddressService<'_> {
        AddressService::new(self)
    }

    /// Products, listings and categories.
    #[must_use]
    pub const fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self)
    }

    /// Carts, reservations and checkout.
    #[must_use]
    pub const fn carts(&self) -> CartService<'_> {
        CartService::new(self)
    }

    /// Root-entity deletion.
    #[must_use]
    pub const fn cascade(&self) -> CascadeService<'_> {
        CascadeService::new(self)
    }

    /// Reviews, recommendations, actions and media metadata.
    #[must_use]
    pub const fn documents(&self) -> DocumentService<'_> {
        DocumentService::new(self)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("delivery_lead", &self.inner.delivery_lead)
            .field("locked_listings", &self.inner.listing_locks.len())
            .finish_non_exhaustive()
    }
}
