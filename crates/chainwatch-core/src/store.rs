//! Shared store for the current chain snapshot.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::chain::ChainSnapshot;

/// Holds the latest published [`ChainSnapshot`].
///
/// The refresh task publishes whole snapshots; the kill stream reads the
/// current one once per classification. Publishing swaps a single `Arc`, so
/// readers never observe a half-built graph, and a failed refresh simply
/// never calls [`ChainStore::publish`].
#[derive(Debug, Default)]
pub struct ChainStore {
    current: RwLock<Arc<ChainSnapshot>>,
}

impl ChainStore {
    /// Create a store holding an empty snapshot.
    ///
    /// Until the first successful refresh, nothing is relevant.
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently published snapshot.
    pub fn current(&self) -> Arc<ChainSnapshot> {
        self.current.read().clone()
    }

    /// Atomically replace the published snapshot.
    pub fn publish(&self, snapshot: ChainSnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }
}
