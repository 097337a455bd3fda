//! Engine services, one per component.
//!
//! # Services
//!
//! - `accounts` - Customer, vendor and supplier rows
//! - `address` - Address deduplication and reference counting
//! - `catalog` - Products, listings, categories across relational and graph
//! - `cart` - Reservations, stock checks and checkout
//! - `cascade` - Guarded deletion of root entities
//! - `documents` - Reviews, recommendations, actions and media metadata
//!
//! Writes go relational first, then graph, then document. A failure in a
//! later store is reported to the caller and nothing is rolled back.

pub mod accounts;
pub mod address;
pub mod cart;
pub mod cascade;
pub mod catalog;
pub mod documents;

pub use accounts::AccountService;
pub use address::AddressService;
pub use cart::CartService;
pub use cascade::CascadeService;
pub use catalog::CatalogService;
pub use documents::DocumentService;

use tracing::warn;

use crate::error::ConsistencyError;
use crate::store::StoreResult;

/// Surface a failed follow-up write. Earlier writes stay in place.
pub(crate) fn follow_up<T>(result: StoreResult<T>, step: &'static str) -> Result<T, ConsistencyError> {
    result.map_err(|e| {
        warn!(error = %e, step, "Follow-up write failed; earlier writes were kept");
        e.into()
    })
}
