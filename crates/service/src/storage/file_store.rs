use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::{fs, sync::RwLock};
use tracing::{debug, warn};

use super::{BackingStore, Entries};
use crate::errors::ServiceError;

/// JSON file-backed engine.
///
/// Keeps the whole mapping in memory and rewrites the file after every
/// mutation. Mutations run under the write lock and only become visible once
/// the file has been replaced, so a failed persist leaves no trace.
pub struct FileStore {
    inner: RwLock<Entries>,
    file_path: PathBuf,
}

impl FileStore {
    /// Open the store at `path`. Creates the file with an empty map if missing.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }

        let map: Entries = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ServiceError::Store(format!("corrupt store file {}: {e}", file_path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = Entries::new();
                persist(&file_path, &empty).await?;
                empty
            }
            Err(e) => return Err(ServiceError::store(e)),
        };
        debug!(path = %file_path.display(), entries = map.len(), "file store loaded");

        Ok(Arc::new(Self { inner: RwLock::new(map), file_path }))
    }

    /// Apply `f` to a copy of the map, persist the copy, then publish it.
    async fn commit<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Entries) -> T,
    {
        let mut map = self.inner.write().await;
        let mut next = map.clone();
        let out = f(&mut next);
        persist(&self.file_path, &next).await?;
        *map = next;
        Ok(out)
    }
}

/// Write to a sibling temp file and rename over the target.
async fn persist(path: &PathBuf, map: &Entries) -> Result<(), ServiceError> {
    let data = serde_json::to_vec(map).map_err(ServiceError::store)?;
    let mut tmp = path.clone().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, data).await.map_err(ServiceError::store)?;
    if let Err(e) = fs::rename(&tmp, path).await {
        warn!(path = %path.display(), error = %e, "failed to replace store file");
        let _ = fs::remove_file(&tmp).await;
        return Err(ServiceError::store(e));
    }
    Ok(())
}

#[async_trait]
impl BackingStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get_all(&self) -> Result<Entries, ServiceError> {
        Ok(self.inner.read().await.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn upsert(&self, key: &str, value: Value) -> Result<(), ServiceError> {
        self.commit(|m| {
            m.insert(key.to_owned(), value);
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<u64, ServiceError> {
        if !self.inner.read().await.contains_key(key) {
            return Ok(0);
        }
        self.commit(|m| u64::from(m.remove(key).is_some())).await
    }

    async fn nuke(&self) -> Result<(), ServiceError> {
        self.commit(|m| m.clear()).await
    }
}
