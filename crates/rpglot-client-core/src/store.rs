//! Snapshot store: the most recently accepted snapshot.

use std::sync::Arc;

use crate::model::Snapshot;

/// Holds the current snapshot for the controller and the renderer.
///
/// Written only by the event loop when the active provider delivers a
/// snapshot. After [`close`](SnapshotStore::close) every write is ignored so
/// late results from torn-down providers cannot land.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Option<Arc<Snapshot>>,
    generation: u64,
    error: Option<String>,
    closed: bool,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current snapshot. Returns false if the store is closed.
    pub fn replace(&mut self, snapshot: Arc<Snapshot>) -> bool {
        if self.closed {
            return false;
        }
        self.current = Some(snapshot);
        self.generation += 1;
        self.error = None;
        true
    }

    pub fn current(&self) -> Option<&Arc<Snapshot>> {
        self.current.as_ref()
    }

    /// Incremented on every accepted snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Marks the store as failed; existing contents are kept.
    pub fn set_error(&mut self, message: impl Into<String>) {
        if !self.closed {
            self.error = Some(message.into());
        }
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
