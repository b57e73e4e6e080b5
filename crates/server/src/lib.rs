pub mod routes;
pub mod startup;
pub mod errors;
