//! Catalog models: global products, per-vendor listings and categories.

use serde::{Deserialize, Serialize};

use tristore_core::{CategoryId, ListingId, PriceEuro, ProductId, VendorId};

/// A global, vendor-agnostic product.
///
/// `name` is the natural key used to share one product between vendors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
}

/// One vendor's offering of a product (`VendorToProduct`).
///
/// Mirrored as a `VendorToProduct` graph node carrying the same properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub vendor_id: VendorId,
    pub product_id: ProductId,
    pub unit_price: PriceEuro,
    pub inventory_level: i32,
}

/// A product category. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A listing joined with the product it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedProduct {
    pub listing: Listing,
    pub product: Product,
}

/// Vendor-facing view of a listing: product content plus vendor terms.
///
/// Used both as the input to listing creation/update and as the read model
/// returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInformation {
    /// Set on read models, ignored on input.
    #[serde(default)]
    pub listing_id: Option<ListingId>,
    pub name: String,
    pub description: String,
    pub unit_price: PriceEuro,
    pub inventory_level: i32,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
}
