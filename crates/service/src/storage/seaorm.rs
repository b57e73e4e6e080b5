use async_trait::async_trait;
use migration::MigratorTrait;
use models::kv_entry;
use sea_orm::{
    sea_query::Expr, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, SqlErr,
};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use super::{BackingStore, Entries};
use crate::errors::ServiceError;

/// Field of the wrapper object that carries a non-object value.
const ENVELOPE_FIELD: &str = "__kv_envelope";

/// Relational engine: one `kv_entry` row per key.
///
/// The value column only holds JSON objects, so arrays are stored inside a
/// one-field wrapper object and unwrapped on read. Objects whose sole field is
/// the wrapper name are wrapped too, so unwrapping is never ambiguous.
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    /// Use an existing pool. The `kv_entry` table must already exist.
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open a pool from configuration and apply pending migrations.
    pub async fn connect(cfg: &configs::DatabaseConfig) -> Result<Self, ServiceError> {
        let db = models::db::connect_with_config(cfg)
            .await
            .map_err(ServiceError::store)?;
        migration::Migrator::up(&db, None).await?;
        info!("kv_entry migrations applied");
        Ok(Self::new(db))
    }
}

fn seal(value: Value) -> Value {
    let needs_envelope = match &value {
        Value::Object(m) => m.len() == 1 && m.contains_key(ENVELOPE_FIELD),
        _ => true,
    };
    if !needs_envelope {
        return value;
    }
    let mut m = Map::with_capacity(1);
    m.insert(ENVELOPE_FIELD.to_owned(), value);
    Value::Object(m)
}

fn unseal(value: Value) -> Value {
    match value {
        Value::Object(mut m) if m.len() == 1 && m.contains_key(ENVELOPE_FIELD) => {
            m.remove(ENVELOPE_FIELD).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[async_trait]
impl BackingStore for SeaOrmStore {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn get_all(&self) -> Result<Entries, ServiceError> {
        let rows = kv_entry::Entity::find().all(&self.db).await?;
        Ok(rows.into_iter().map(|r| (r.key, unseal(r.value))).collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        let row = kv_entry::Entity::find_by_id(key.to_owned()).one(&self.db).await?;
        Ok(row.map(|r| unseal(r.value)))
    }

    /// Insert first and fall back to update on a primary-key conflict. Two
    /// racing inserts of a new key cannot both succeed; the loser updates.
    #[instrument(skip(self, value))]
    async fn upsert(&self, key: &str, value: Value) -> Result<(), ServiceError> {
        let stored = seal(value);
        kv_entry::validate_column_value(&stored)?;

        let row = kv_entry::ActiveModel {
            key: Set(key.to_owned()),
            value: Set(stored.clone()),
        };
        match kv_entry::Entity::insert(row).exec_without_returning(&self.db).await {
            Ok(_) => return Ok(()),
            Err(e) if is_unique_violation(&e) => {}
            Err(e) => return Err(e.into()),
        }

        let res = kv_entry::Entity::update_many()
            .col_expr(kv_entry::Column::Value, Expr::value(stored))
            .filter(kv_entry::Column::Key.eq(key))
            .exec(&self.db)
            .await?;
        if res.rows_affected == 0 {
            // the row vanished between the insert and the update: a delete won
            debug!("upsert superseded by concurrent delete");
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, ServiceError> {
        let res = kv_entry::Entity::delete_by_id(key.to_owned()).exec(&self.db).await?;
        Ok(res.rows_affected)
    }

    async fn nuke(&self) -> Result<(), ServiceError> {
        let res = kv_entry::Entity::delete_many().exec(&self.db).await?;
        info!(rows = res.rows_affected, "kv_entry truncated");
        Ok(())
    }
}
