use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("model error: {0}")]
    Model(#[from] models::errors::ModelError),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

    pub fn store(e: impl std::fmt::Display) -> Self { Self::Store(e.to_string()) }
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(e: sea_orm::DbErr) -> Self { Self::Store(e.to_string()) }
}
