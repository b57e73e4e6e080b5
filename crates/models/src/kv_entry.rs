use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors;

/// A stored key and its JSON object column.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "kv_entry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub value: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// The `value` column accepts JSON objects only.
pub fn validate_column_value(v: &Json) -> Result<(), errors::ModelError> {
    if !v.is_object() {
        return Err(errors::ModelError::Validation("kv_entry.value must be a JSON object".into()));
    }
    Ok(())
}
