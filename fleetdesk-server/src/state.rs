use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use fleetdesk_core::backend::MemoryBackend;
use fleetdesk_core::guard::AssignmentGuard;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    backend: Arc<MemoryBackend>,
}

impl AppState {
    /// Open (or create) the store under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Could not create data directory {}", data_dir.display()))?;
        let backend = MemoryBackend::open(data_dir.join("store.json"))?;
        Ok(AppState {
            backend: Arc::new(backend),
        })
    }

    /// Nothing persisted; used by tests.
    pub fn in_memory() -> Self {
        AppState {
            backend: Arc::new(MemoryBackend::new()),
        }
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    pub fn guard(&self) -> AssignmentGuard<'_, MemoryBackend> {
        AssignmentGuard::new(self.backend.as_ref())
    }
}
