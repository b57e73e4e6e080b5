use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use super::{BackingStore, Entries};
use crate::errors::ServiceError;

/// Process-local engine over a sharded concurrent map.
///
/// Each operation holds the shard lock of its key for its whole duration, so
/// single-key operations are atomic with respect to each other. `get_all` and
/// `nuke` walk the shards one at a time and are not a point-in-time snapshot.
#[derive(Default)]
pub struct MemoryStore {
    inner: DashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_all(&self) -> Result<Entries, ServiceError> {
        Ok(self
            .inner
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        Ok(self.inner.get(key).map(|v| v.value().clone()))
    }

    async fn upsert(&self, key: &str, value: Value) -> Result<(), ServiceError> {
        let replaced = self.inner.insert(key.to_owned(), value).is_some();
        debug!(%key, replaced, "memory upsert");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, ServiceError> {
        Ok(u64::from(self.inner.remove(key).is_some()))
    }

    async fn nuke(&self) -> Result<(), ServiceError> {
        self.inner.clear();
        Ok(())
    }
}
