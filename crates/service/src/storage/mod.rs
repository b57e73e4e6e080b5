//! Backing store abstraction and its engines.
//!
//! Every engine implements the same five operations with the same contract:
//! - `get` yields `None` for an absent key; it is not an error.
//! - `upsert` replaces the whole value atomically; racing upserts settle to one of them.
//! - `delete` reports how many entries it removed (0 or 1). An upsert that overlaps a
//!   delete of the same key may be dropped, leaving the key deleted.
//! - `nuke` may be refused with `ServiceError::Unsupported`.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use configs::{AppConfig, StoreBackend};
use serde_json::Value;
use tracing::info;

use crate::errors::ServiceError;

pub mod file_store;
pub mod memory;
pub mod seaorm;

pub use file_store::FileStore;
pub use memory::MemoryStore;
pub use seaorm::SeaOrmStore;

/// Unordered snapshot of every stored entry.
pub type Entries = HashMap<String, Value>;

#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;
    async fn get_all(&self) -> Result<Entries, ServiceError>;
    async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError>;
    async fn upsert(&self, key: &str, value: Value) -> Result<(), ServiceError>;
    async fn delete(&self, key: &str) -> Result<u64, ServiceError>;
    async fn nuke(&self) -> Result<(), ServiceError>;
}

/// Build the engine selected by `[store].backend`.
pub async fn connect(cfg: &AppConfig) -> Result<Arc<dyn BackingStore>, ServiceError> {
    let store: Arc<dyn BackingStore> = match cfg.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => FileStore::open(&cfg.store.file_path).await?,
        StoreBackend::Database => Arc::new(SeaOrmStore::connect(&cfg.database).await?),
    };
    info!(engine = store.name(), "backing store ready");
    Ok(store)
}
