//! Service layer for the JSON key-value store.
//! - `storage`: the backing store contract and its engines.
//! - `validate`: key/value checks applied before any store call.
//! - `kv_service`: a validator and a store composed into one service instance.

pub mod errors;
pub mod kv_service;
pub mod storage;
pub mod validate;

pub use kv_service::KvService;
