//! Engine-level errors.
//!
//! Every variant maps onto an [`ErrorKind`] through [`ConsistencyError::kind`],
//! which is what callers outside the engine should branch on.

use thiserror::Error;

use tristore_core::{CartId, CategoryId, ListingId};

use crate::store::StoreError;

/// Entity kinds named in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Customer,
    Vendor,
    Supplier,
    Address,
    Product,
    Listing,
    Category,
    Cart,
    Reservation,
    Document,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Customer => "customer",
            Self::Vendor => "vendor",
            Self::Supplier => "supplier",
            Self::Address => "address",
            Self::Product => "product",
            Self::Listing => "listing",
            Self::Category => "category",
            Self::Cart => "shopping cart",
            Self::Reservation => "cart item",
            Self::Document => "document",
        };
        f.write_str(name)
    }
}

/// Coarse error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    DuplicateEntity,
    ReferencedEntity,
    ListingLocked,
    InsufficientStock,
    EmptyCart,
    IdMismatch,
    InvalidInput,
    StoreUnavailable,
}

/// Errors returned by engine operations.
///
/// Checks run before the first write; an error raised after writing started
/// leaves earlier writes in place.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error("{entity} {id} does not exist")]
    NotFound { entity: Entity, id: String },

    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: Entity, id: String },

    #[error("{owner} already references address {address}")]
    ReferenceAlreadyExists { owner: String, address: String },

    #[error("category '{name}' already exists")]
    DuplicateCategory { name: String },

    #[error("vendor {vendor} already lists a product named '{name}'")]
    DuplicateListing { vendor: String, name: String },

    #[error("{entity} {id} is still referenced by {holder}")]
    Referenced {
        entity: Entity,
        id: String,
        holder: String,
    },

    #[error("category {0} is still assigned to products")]
    CategoryInUse(CategoryId),

    #[error("listing {listing} is referenced by {holder} and cannot be deleted")]
    ListingReferenced { listing: ListingId, holder: String },

    #[error("listing {listing} is locked by {holder}")]
    ListingLocked { listing: ListingId, holder: String },

    #[error("listing {listing} has {available} in stock, {requested} requested")]
    InsufficientStock {
        listing: ListingId,
        requested: i32,
        available: i32,
    },

    #[error("shopping cart {0} is empty")]
    EmptyCart(CartId),

    #[error("ids {path} and {body} do not match")]
    IdMismatch { path: String, body: String },

    #[error("invalid amount {amount}: {reason}")]
    InvalidAmount { amount: i32, reason: &'static str },

    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConsistencyError {
    /// Shorthand for [`ConsistencyError::NotFound`].
    pub fn not_found(entity: Entity, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`ConsistencyError::Referenced`].
    pub fn referenced(
        entity: Entity,
        id: impl std::fmt::Display,
        holder: impl Into<String>,
    ) -> Self {
        Self::Referenced {
            entity,
            id: id.to_string(),
            holder: holder.into(),
        }
    }

    /// The taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. }
            | Self::ReferenceAlreadyExists { .. }
            | Self::DuplicateCategory { .. }
            | Self::DuplicateListing { .. } => ErrorKind::DuplicateEntity,
            Self::Referenced { .. } | Self::CategoryInUse(_) | Self::ListingReferenced { .. } => {
                ErrorKind::ReferencedEntity
            }
            Self::ListingLocked { .. } => ErrorKind::ListingLocked,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::EmptyCart(_) => ErrorKind::EmptyCart,
            Self::IdMismatch { .. } => ErrorKind::IdMismatch,
            Self::InvalidAmount { .. } | Self::InvalidField { .. } => ErrorKind::InvalidInput,
            Self::Store(StoreError::Conflict(_)) => ErrorKind::DuplicateEntity,
            Self::Store(_) => ErrorKind::StoreUnavailable,
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, ConsistencyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreKind;

    #[test]
    fn test_specific_variants_map_to_taxonomy() {
        let cases = [
            (
                ConsistencyError::DuplicateCategory {
                    name: "Tools".into(),
                },
                ErrorKind::DuplicateEntity,
            ),
            (
                ConsistencyError::CategoryInUse(CategoryId::new(1)),
                ErrorKind::ReferencedEntity,
            ),
            (
                ConsistencyError::ListingReferenced {
                    listing: ListingId::new(1),
                    holder: "Review".into(),
                },
                ErrorKind::ReferencedEntity,
            ),
            (
                ConsistencyError::InvalidAmount {
                    amount: 0,
                    reason: "must be positive",
                },
                ErrorKind::InvalidInput,
            ),
            (
                ConsistencyError::from(StoreError::unavailable(StoreKind::Graph, "down")),
                ErrorKind::StoreUnavailable,
            ),
        ];

        for (error, kind) in cases {
            assert_eq!(error.kind(), kind, "{error}");
        }
    }

    #[test]
    fn test_messages_name_the_entity() {
        let err = ConsistencyError::referenced(Entity::Customer, 4, "ShoppingCart");
        assert_eq!(
            err.to_string(),
            "customer 4 is still referenced by ShoppingCart"
        );
    }
}
