//! In-memory document store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::models::{Document, DocumentCollection, DocumentFilter};
use crate::store::{DocumentStore, StoreError, StoreKind, StoreResult};

/// Document collections held in process memory, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<BTreeMap<DocumentCollection, Vec<Document>>>,
    fail_writes: AtomicBool,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of documents in a collection.
    #[must_use]
    pub fn len(&self, collection: DocumentCollection) -> usize {
        self.collections
            .read()
            .get(&collection)
            .map_or(0, Vec::len)
    }

    /// Whether a collection holds no documents.
    #[must_use]
    pub fn is_empty(&self, collection: DocumentCollection) -> bool {
        self.len(collection) == 0
    }

    fn writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(
                StoreKind::Document,
                "write rejected by failure injection",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, document: &Document) -> StoreResult<()> {
        self.writable()?;
        let mut collections = self.collections.write();
        let documents = collections.entry(document.collection).or_default();
        if documents.iter().any(|d| d.id == document.id) {
            return Err(StoreError::Conflict(format!(
                "{} document {} exists",
                document.collection, document.id
            )));
        }
        documents.push(document.clone());
        Ok(())
    }

    async fn find_one(
        &self,
        collection: DocumentCollection,
        filter: DocumentFilter,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn find(
        &self,
        collection: DocumentCollection,
        filter: DocumentFilter,
    ) -> StoreResult<Vec<Document>> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_many(
        &self,
        collection: DocumentCollection,
        filter: DocumentFilter,
    ) -> StoreResult<u64> {
        self.writable()?;
        let mut collections = self.collections.write();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|d| !filter.matches(d));
        Ok((before - documents.len()) as u64)
    }

    async fn find_one_and_delete(
        &self,
        collection: DocumentCollection,
        filter: DocumentFilter,
    ) -> StoreResult<Option<Document>> {
        self.writable()?;
        let mut collections = self.collections.write();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(None);
        };
        Ok(documents
            .iter()
            .position(|d| filter.matches(d))
            .map(|index| documents.remove(index)))
    }

    async fn find_one_and_update(
        &self,
        collection: DocumentCollection,
        filter: DocumentFilter,
        body: serde_json::Value,
    ) -> StoreResult<Option<Document>> {
        self.writable()?;
        let mut collections = self.collections.write();
        let Some(document) = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| filter.matches(d)))
        else {
            return Ok(None);
        };
        document.body = body;
        Ok(Some(document.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use tristore_core::{CustomerId, DocumentId, ListingId};

    use super::*;

    fn review(id: i32, customer: i32, listing: i32) -> Document {
        Document {
            id: DocumentId::new(id),
            collection: DocumentCollection::Review,
            customer_id: Some(CustomerId::new(customer)),
            listing_id: Some(ListingId::new(listing)),
            body: json!({ "rating": 4 }),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_delete_many_by_listing() {
        let store = InMemoryDocumentStore::new();
        store.insert(&review(1, 1, 10)).await.unwrap();
        store.insert(&review(2, 2, 10)).await.unwrap();
        store.insert(&review(3, 1, 11)).await.unwrap();

        let deleted = store
            .delete_many(
                DocumentCollection::Review,
                DocumentFilter::Listing(ListingId::new(10)),
            )
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.len(DocumentCollection::Review), 1);
    }

    #[tokio::test]
    async fn test_find_one_and_update_replaces_body() {
        let store = InMemoryDocumentStore::new();
        store.insert(&review(1, 1, 10)).await.unwrap();

        let updated = store
            .find_one_and_update(
                DocumentCollection::Review,
                DocumentFilter::Id(DocumentId::new(1)),
                json!({ "rating": 2 }),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.body, json!({ "rating": 2 }));

        let missing = store
            .find_one_and_update(
                DocumentCollection::Review,
                DocumentFilter::Id(DocumentId::new(9)),
                json!({}),
            )
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let store = InMemoryDocumentStore::new();
        store.insert(&review(1, 1, 10)).await.unwrap();
        let found = store
            .find_one(
                DocumentCollection::CustomerAction,
                DocumentFilter::Customer(CustomerId::new(1)),
            )
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
