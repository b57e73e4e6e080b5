//! Shared building blocks for the key-value service crates.
//!
//! - `types`: small response payloads shared by HTTP handlers.
//! - `utils::logging`: tracing subscriber initialisation.

pub mod types;
pub mod utils;
