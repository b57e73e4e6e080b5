use std::sync::Arc;

use configs::StoreConfig;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::errors::ServiceError;
use crate::storage::{BackingStore, Entries};
use crate::validate::{self, Validator};

/// One addressable key-value unit: a validator in front of its own store.
///
/// Instances never share a store unless the caller hands them the same `Arc`.
/// `name` tags every span the instance emits.
pub struct KvService {
    name: String,
    store: Arc<dyn BackingStore>,
    validator: Validator,
    allow_nuke: bool,
}

impl KvService {
    pub fn new(name: impl Into<String>, store: Arc<dyn BackingStore>) -> Self {
        Self { name: name.into(), store, validator: Validator::default(), allow_nuke: false }
    }

    pub fn from_config(name: impl Into<String>, store: Arc<dyn BackingStore>, cfg: &StoreConfig) -> Self {
        Self::new(name, store)
            .with_validator(Validator::new(cfg.max_key_length))
            .with_allow_nuke(cfg.allow_nuke)
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_allow_nuke(mut self, allow: bool) -> Self {
        self.allow_nuke = allow;
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn allow_nuke(&self) -> bool { self.allow_nuke }

    #[instrument(skip(self), fields(service = %self.name))]
    pub async fn get_all(&self) -> Result<Entries, ServiceError> {
        self.store.get_all().await
    }

    /// `Ok(None)` when the key is absent.
    #[instrument(skip(self), fields(service = %self.name))]
    pub async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        self.validator.validate_key(key)?;
        self.store.get(key).await
    }

    /// Parse `body` and store it under `key`.
    #[instrument(skip(self, body), fields(service = %self.name, bytes = body.len()))]
    pub async fn put(&self, key: &str, body: &[u8]) -> Result<(), ServiceError> {
        self.validator.validate_key(key)?;
        let value = self.validator.parse_value(body)?;
        self.store.upsert(key, value).await?;
        debug!("stored");
        Ok(())
    }

    /// Store an already-parsed value under `key`.
    #[instrument(skip(self, value), fields(service = %self.name))]
    pub async fn upsert(&self, key: &str, value: Value) -> Result<(), ServiceError> {
        self.validator.validate_key(key)?;
        self.validator.validate_value(&value)?;
        self.store.upsert(key, value).await
    }

    /// Returns whether the key existed.
    #[instrument(skip(self), fields(service = %self.name))]
    pub async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        self.validator.validate_key(key)?;
        Ok(self.store.delete(key).await? > 0)
    }

    /// Remove every entry. Requires both `allow_nuke` and an exact
    /// `{"nuke": true}` body.
    #[instrument(skip(self, body), fields(service = %self.name))]
    pub async fn nuke(&self, body: &[u8]) -> Result<(), ServiceError> {
        if !self.allow_nuke {
            warn!("nuke requested but disabled");
            return Err(ServiceError::Unsupported("nuke is disabled for this store".into()));
        }
        if !validate::is_nuke_confirmation(body) {
            return Err(ServiceError::validation(r#"nuke requires the body {"nuke": true}"#));
        }
        self.store.nuke().await?;
        info!(engine = self.store.name(), "store nuked");
        Ok(())
    }
}
