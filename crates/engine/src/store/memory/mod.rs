//! In-process store adapters.
//!
//! Useful for tests and for embedding the engine without external services.
//! The graph and document adapters can be told to fail writes, which is how
//! partial-failure behavior is exercised.

mod document;
mod graph;
mod relational;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

pub use document::InMemoryDocumentStore;
pub use graph::InMemoryGraphStore;
pub use relational::InMemoryRelationalStore;

use super::{IdAllocator, IdSequence, StoreResult, Stores};

/// Per-sequence counters. The first id handed out is 1.
#[derive(Debug, Default)]
pub struct InMemoryIdAllocator {
    counters: Mutex<HashMap<IdSequence, i32>>,
}

impl InMemoryIdAllocator {
    /// Create an allocator with every sequence at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdAllocator for InMemoryIdAllocator {
    async fn next_id(&self, sequence: IdSequence) -> StoreResult<i32> {
        let mut counters = self.counters.lock();
        let current = counters.entry(sequence).or_insert(0);
        *current += 1;
        Ok(*current)
    }

    async fn advance_to(&self, sequence: IdSequence, last: i32) -> StoreResult<()> {
        let mut counters = self.counters.lock();
        let current = counters.entry(sequence).or_insert(0);
        *current = (*current).max(last);
        Ok(())
    }
}

/// Concrete handles to a full set of in-memory adapters.
///
/// Keeps the typed handles around so tests can inspect store contents and
/// inject failures, while [`InMemoryStores::stores`] hands the engine the
/// trait objects.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStores {
    pub relational: Arc<InMemoryRelationalStore>,
    pub graph: Arc<InMemoryGraphStore>,
    pub documents: Arc<InMemoryDocumentStore>,
    pub ids: Arc<InMemoryIdAllocator>,
}

impl InMemoryStores {
    /// Fresh, empty stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trait-object view for the engine.
    #[must_use]
    pub fn stores(&self) -> Stores {
        Stores::new(
            self.relational.clone(),
            self.graph.clone(),
            self.documents.clone(),
            self.ids.clone(),
        )
    }
}

impl Stores {
    /// Fresh in-memory stores, without keeping the typed handles.
    #[must_use]
    pub fn in_memory() -> Self {
        InMemoryStores::new().stores()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequences_are_independent() {
        let ids = InMemoryIdAllocator::new();
        assert_eq!(ids.next_id(IdSequence::Address).await.unwrap(), 1);
        assert_eq!(ids.next_id(IdSequence::Address).await.unwrap(), 2);
        assert_eq!(ids.next_id(IdSequence::Product).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_advance_to_never_rewinds() {
        let ids = InMemoryIdAllocator::new();
        ids.advance_to(IdSequence::Cart, 40).await.unwrap();
        ids.advance_to(IdSequence::Cart, 3).await.unwrap();
        assert_eq!(ids.next_id(IdSequence::Cart).await.unwrap(), 41);
    }

    #[tokio::test]
    async fn test_concurrent_allocation_is_unique() {
        let ids = Arc::new(InMemoryIdAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let ids = ids.clone();
            handles.push(tokio::spawn(async move {
                ids.next_id(IdSequence::Order).await.unwrap()
            }));
        }

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=16).collect::<Vec<_>>());
    }
}
