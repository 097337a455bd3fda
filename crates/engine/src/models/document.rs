//! Document store entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tristore_core::{CustomerId, DocumentId, ListingId};

/// The document collections the engine reads and cleans up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentCollection {
    Review,
    ProductRecommendation,
    CustomerAction,
    ProductImage,
    ProductVideo,
}

impl DocumentCollection {
    /// Every collection, in cleanup order.
    pub const ALL: [Self; 5] = [
        Self::Review,
        Self::ProductRecommendation,
        Self::CustomerAction,
        Self::ProductImage,
        Self::ProductVideo,
    ];

    /// Collection name as used by the document store.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Review => "Review",
            Self::ProductRecommendation => "ProductRecommendation",
            Self::CustomerAction => "CustomerAction",
            Self::ProductImage => "ProductImage",
            Self::ProductVideo => "ProductVideo",
        }
    }
}

impl std::fmt::Display for DocumentCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A document in one of the collections.
///
/// The two reference fields are the only parts of a document the engine
/// interprets; everything else lives in `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub collection: DocumentCollection,
    pub customer_id: Option<CustomerId>,
    pub listing_id: Option<ListingId>,
    pub body: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Selects documents within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFilter {
    Id(DocumentId),
    Customer(CustomerId),
    Listing(ListingId),
}

impl DocumentFilter {
    /// Whether `document` is selected by this filter.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        match *self {
            Self::Id(id) => document.id == id,
            Self::Customer(id) => document.customer_id == Some(id),
            Self::Listing(id) => document.listing_id == Some(id),
        }
    }
}
