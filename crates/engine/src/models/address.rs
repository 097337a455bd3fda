//! Address models and the owners that reference them.

use serde::{Deserialize, Serialize};

use tristore_core::{AddressId, AddressReferenceId, CustomerId, OwnerKind, SupplierId, VendorId};

/// Address content as supplied by a caller, before it has an id.
///
/// Two candidates are the same address exactly when all four fields are
/// byte-for-byte equal. No normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressCandidate {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl AddressCandidate {
    /// Create a candidate from its four parts.
    #[must_use]
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            postal_code: postal_code.into(),
            country: country.into(),
        }
    }
}

/// A stored address row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Surrogate id.
    pub id: AddressId,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    /// Attach an id to a candidate.
    #[must_use]
    pub fn from_candidate(id: AddressId, candidate: AddressCandidate) -> Self {
        Self {
            id,
            street: candidate.street,
            city: candidate.city,
            postal_code: candidate.postal_code,
            country: candidate.country,
        }
    }

    /// Whether this row has exactly the content of `candidate`.
    #[must_use]
    pub fn matches(&self, candidate: &AddressCandidate) -> bool {
        self.street == candidate.street
            && self.city == candidate.city
            && self.postal_code == candidate.postal_code
            && self.country == candidate.country
    }
}

/// An entity that can own addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    Customer(CustomerId),
    Vendor(VendorId),
    Supplier(SupplierId),
}

impl Owner {
    /// The owner kind, which selects the junction table.
    #[must_use]
    pub const fn kind(self) -> OwnerKind {
        match self {
            Self::Customer(_) => OwnerKind::Customer,
            Self::Vendor(_) => OwnerKind::Vendor,
            Self::Supplier(_) => OwnerKind::Supplier,
        }
    }

    /// The owner's id as stored in the junction table.
    #[must_use]
    pub const fn raw_id(self) -> i32 {
        match self {
            Self::Customer(id) => id.as_i32(),
            Self::Vendor(id) => id.as_i32(),
            Self::Supplier(id) => id.as_i32(),
        }
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.raw_id())
    }
}

/// One row of a `*_address` junction table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerAddressReference {
    pub id: AddressReferenceId,
    pub owner: Owner,
    pub address_id: AddressId,
}
