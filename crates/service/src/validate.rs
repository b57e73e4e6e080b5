//! Key and value well-formedness checks. Everything here runs before a store is touched.

use serde_json::Value;

use crate::errors::ServiceError;

pub const DEFAULT_MAX_KEY_LENGTH: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct Validator {
    max_key_length: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self { max_key_length: DEFAULT_MAX_KEY_LENGTH }
    }
}

impl Validator {
    pub fn new(max_key_length: usize) -> Self {
        Self { max_key_length }
    }

    /// Keys are non-empty ASCII without NUL, at most `max_key_length` bytes.
    pub fn validate_key(&self, key: &str) -> Result<(), ServiceError> {
        if key.is_empty() {
            return Err(ServiceError::validation("key must not be empty"));
        }
        if key.len() > self.max_key_length {
            return Err(ServiceError::validation(format!(
                "key exceeds {} bytes",
                self.max_key_length
            )));
        }
        if !key.is_ascii() {
            return Err(ServiceError::validation("key must be ASCII"));
        }
        if key.contains('\0') {
            return Err(ServiceError::validation("key must not contain NUL"));
        }
        Ok(())
    }

    /// Values are JSON arrays or objects; bare scalars and `null` are rejected.
    pub fn validate_value(&self, value: &Value) -> Result<(), ServiceError> {
        match value {
            Value::Array(_) | Value::Object(_) => Ok(()),
            Value::Null => Err(ServiceError::validation("value must not be null")),
            _ => Err(ServiceError::validation("value must be a JSON array or object")),
        }
    }

    /// Parse a request body into a storable value.
    pub fn parse_value(&self, body: &[u8]) -> Result<Value, ServiceError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ServiceError::validation("request body is empty"));
        }
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ServiceError::validation(format!("body is not valid JSON: {e}")))?;
        self.validate_value(&value)?;
        Ok(value)
    }
}

/// A nuke request must carry exactly `{"nuke": true}`.
pub fn is_nuke_confirmation(body: &[u8]) -> bool {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(m)) => m.len() == 1 && m.get("nuke") == Some(&Value::Bool(true)),
        _ => false,
    }
}
