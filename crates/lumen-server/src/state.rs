//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::{Arc, PoisonError, RwLock};

use crate::table::HostTable;

/// Application state shared across all handlers.
#[derive(Debug, Default)]
pub struct AppState {
    /// Current host table, replaced wholesale on settings reload.
    table: RwLock<Arc<HostTable>>,
}

impl AppState {
    #[must_use]
    pub fn new(table: HostTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    /// Snapshot of the host table.
    #[must_use]
    pub fn table(&self) -> Arc<HostTable> {
        Arc::clone(&self.table.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Install a new host table, returning the previous one.
    ///
    /// Requests already holding the old table finish with it.
    pub fn replace_table(&self, table: HostTable) -> Arc<HostTable> {
        let mut guard = self.table.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(table))
    }
}
