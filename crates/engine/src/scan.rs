//! Reference scan.
//!
//! Before an entity is deleted (or, for listings, modified) the engine asks
//! every store that might point at it. Each entity kind has a fixed, ordered
//! list of probes; the scan stops at the first probe that finds a holder and
//! reports which one it was.

use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use tristore_core::{AddressId, CartId, CustomerId, ListingId, OwnerKind, SupplierId};

use crate::models::{DocumentCollection, DocumentFilter};
use crate::store::{StoreResult, Stores};

/// One place a reference to an entity can live.
#[async_trait]
pub trait ReferenceProbe: Copy + fmt::Display + Send + Sync + 'static {
    /// Id type of the referenced entity.
    type Key: Copy + fmt::Display + Send + Sync;

    /// Whether this location currently points at `key`.
    async fn holds(self, stores: &Stores, key: Self::Key) -> StoreResult<bool>;
}

/// Run `probes` in order and return the first one that holds `key`.
///
/// # Errors
///
/// Returns the first store error encountered; later probes are not run.
pub async fn first_holder<P: ReferenceProbe>(
    stores: &Stores,
    probes: &[P],
    key: P::Key,
) -> StoreResult<Option<P>> {
    for &probe in probes {
        let held = probe.holds(stores, key).await?;
        debug!(%probe, %key, held, "reference probe");
        if held {
            return Ok(Some(probe));
        }
    }
    Ok(None)
}

// =============================================================================
// Addresses
// =============================================================================

/// Holders of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressProbe {
    /// A row in the owner kind's junction table.
    Owner(OwnerKind),
    /// An order position delivering to the address.
    Delivery,
    /// An order billed to the address.
    Billing,
}

impl AddressProbe {
    /// Customer, vendor and supplier junctions, then delivery, then billing.
    pub const ORDER: [Self; 5] = [
        Self::Owner(OwnerKind::Customer),
        Self::Owner(OwnerKind::Vendor),
        Self::Owner(OwnerKind::Supplier),
        Self::Delivery,
        Self::Billing,
    ];
}

impl fmt::Display for AddressProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner(kind) => f.write_str(kind.junction_table()),
            Self::Delivery => f.write_str("order_position.delivery_address_id"),
            Self::Billing => f.write_str("customer_order.billing_address_id"),
        }
    }
}

#[async_trait]
impl ReferenceProbe for AddressProbe {
    type Key = AddressId;

    async fn holds(self, stores: &Stores, key: AddressId) -> StoreResult<bool> {
        match self {
            Self::Owner(kind) => stores.relational.has_owner_reference(kind, key).await,
            Self::Delivery => stores.relational.has_delivery_reference(key).await,
            Self::Billing => stores.relational.has_billing_reference(key).await,
        }
    }
}

// =============================================================================
// Listings
// =============================================================================

/// Holders of a listing that block its removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingProbe {
    /// An `IS_IN` edge from the listing node to a cart.
    CartItem,
    /// An order position for the listing.
    OrderPosition,
    /// A document in one of the collections.
    Document(DocumentCollection),
}

impl ListingProbe {
    /// Probes for the guarded delete of a listing entry.
    pub const REMOVAL: [Self; 6] = [
        Self::CartItem,
        Self::Document(DocumentCollection::ProductRecommendation),
        Self::Document(DocumentCollection::Review),
        Self::Document(DocumentCollection::CustomerAction),
        Self::Document(DocumentCollection::ProductImage),
        Self::Document(DocumentCollection::ProductVideo),
    ];

    /// Probes that lock a listing against updates.
    pub const UPDATE: [Self; 2] = [Self::OrderPosition, Self::CartItem];
}

impl fmt::Display for ListingProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CartItem => f.write_str("IS_IN"),
            Self::OrderPosition => f.write_str("order_position"),
            Self::Document(collection) => fmt::Display::fmt(collection, f),
        }
    }
}

#[async_trait]
impl ReferenceProbe for ListingProbe {
    type Key = ListingId;

    async fn holds(self, stores: &Stores, key: ListingId) -> StoreResult<bool> {
        match self {
            Self::CartItem => stores.graph.listing_has_reservations(key).await,
            Self::OrderPosition => stores.relational.has_position_for_listing(key).await,
            Self::Document(collection) => Ok(stores
                .documents
                .find_one(collection, DocumentFilter::Listing(key))
                .await?
                .is_some()),
        }
    }
}

// =============================================================================
// Customers
// =============================================================================

/// Holders of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerProbe {
    /// A `ShoppingCart` node owned by the customer.
    CartNode,
    /// A document in one of the collections.
    Document(DocumentCollection),
}

impl CustomerProbe {
    pub const ORDER: [Self; 4] = [
        Self::CartNode,
        Self::Document(DocumentCollection::Review),
        Self::Document(DocumentCollection::ProductRecommendation),
        Self::Document(DocumentCollection::CustomerAction),
    ];
}

impl fmt::Display for CustomerProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CartNode => f.write_str("ShoppingCart"),
            Self::Document(collection) => fmt::Display::fmt(collection, f),
        }
    }
}

#[async_trait]
impl ReferenceProbe for CustomerProbe {
    type Key = CustomerId;

    async fn holds(self, stores: &Stores, key: CustomerId) -> StoreResult<bool> {
        match self {
            Self::CartNode => stores.graph.customer_has_cart_node(key).await,
            Self::Document(collection) => Ok(stores
                .documents
                .find_one(collection, DocumentFilter::Customer(key))
                .await?
                .is_some()),
        }
    }
}

// =============================================================================
// Carts and suppliers
// =============================================================================

/// Holders of a shopping cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartProbe {
    /// An `IS_IN` edge into the cart.
    Reservation,
}

impl CartProbe {
    pub const ORDER: [Self; 1] = [Self::Reservation];
}

impl fmt::Display for CartProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reservation => f.write_str("IS_IN"),
        }
    }
}

#[async_trait]
impl ReferenceProbe for CartProbe {
    type Key = CartId;

    async fn holds(self, stores: &Stores, key: CartId) -> StoreResult<bool> {
        match self {
            Self::Reservation => Ok(!stores.graph.cart_reservations(key).await?.is_empty()),
        }
    }
}

/// Holders of a supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierProbe {
    /// An order position shipped by the supplier.
    OrderPosition,
}

impl SupplierProbe {
    pub const ORDER: [Self; 1] = [Self::OrderPosition];
}

impl fmt::Display for SupplierProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderPosition => f.write_str("order_position"),
        }
    }
}

#[async_trait]
impl ReferenceProbe for SupplierProbe {
    type Key = SupplierId;

    async fn holds(self, stores: &Stores, key: SupplierId) -> StoreResult<bool> {
        match self {
            Self::OrderPosition => stores.relational.has_position_for_supplier(key).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use tristore_core::{AddressReferenceId, DocumentId, VendorId};

    use super::*;
    use crate::models::{Address, AddressCandidate, Document, Owner, OwnerAddressReference};

    #[tokio::test]
    async fn test_address_scan_reports_first_holder() {
        let stores = Stores::in_memory();
        let address = Address::from_candidate(
            AddressId::new(1),
            AddressCandidate::new("Main St 1", "Springfield", "12345", "US"),
        );
        stores.relational.insert_address(&address).await.unwrap();

        let none = first_holder(&stores, &AddressProbe::ORDER, address.id)
            .await
            .unwrap();
        assert_eq!(none, None);

        stores
            .relational
            .insert_owner_reference(&OwnerAddressReference {
                id: AddressReferenceId::new(1),
                owner: Owner::Vendor(VendorId::new(3)),
                address_id: address.id,
            })
            .await
            .unwrap();

        let holder = first_holder(&stores, &AddressProbe::ORDER, address.id)
            .await
            .unwrap();
        assert_eq!(holder, Some(AddressProbe::Owner(OwnerKind::Vendor)));
    }

    #[tokio::test]
    async fn test_listing_scan_finds_documents() {
        let stores = Stores::in_memory();
        stores
            .documents
            .insert(&Document {
                id: DocumentId::new(1),
                collection: DocumentCollection::ProductVideo,
                customer_id: None,
                listing_id: Some(ListingId::new(5)),
                body: json!({ "fileName": "demo.mp4" }),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let holder = first_holder(&stores, &ListingProbe::REMOVAL, ListingId::new(5))
            .await
            .unwrap();
        assert_eq!(
            holder,
            Some(ListingProbe::Document(DocumentCollection::ProductVideo))
        );
        assert_eq!(holder.unwrap().to_string(), "ProductVideo");
    }
}
