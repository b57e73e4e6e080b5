pub mod errors;
pub mod db;
pub mod kv_entry;
