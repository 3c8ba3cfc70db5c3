//! Process-wide storage handle.
//!
//! The backend is chosen from configuration once and then shared by every
//! caller until the process exits. Construction is single-flight: concurrent
//! first callers wait on the one in-flight construction instead of building
//! backends of their own. A failed construction leaves the cell empty.

use tokio::sync::OnceCell;

use super::AnyStorage;
use crate::config;
use crate::error::StorageResult;

static STORAGE: StorageCell = StorageCell::new();

/// The process-wide storage. The first call connects the backend described by
/// `config`; every later call returns that same handle and ignores `config`.
pub async fn storage(config: &config::Storage) -> StorageResult<&'static AnyStorage> {
    STORAGE.get_or_init(|| Ok(config.clone())).await
}

pub struct StorageCell {
    cell: OnceCell<AnyStorage>,
}

impl StorageCell {
    pub const fn new() -> Self {
        StorageCell {
            cell: OnceCell::const_new(),
        }
    }

    /// Get the storage, resolving its configuration and connecting the backend
    /// if nobody has yet.
    pub async fn get_or_init<F>(&self, resolve: F) -> StorageResult<&AnyStorage>
    where
        F: FnOnce() -> StorageResult<config::Storage>,
    {
        self.cell
            .get_or_try_init(|| async move {
                let config = resolve()?;
                AnyStorage::connect(&config).await
            })
            .await
    }
}

impl Default for StorageCell {
    fn default() -> Self {
        StorageCell::new()
    }
}
