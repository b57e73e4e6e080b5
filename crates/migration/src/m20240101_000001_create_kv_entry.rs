//! Create `kv_entry` table.
//! One row per stored key; the value column only ever holds a JSON object
//! (arrays are enveloped by the store before they get here).
use sea_orm_migration::{prelude::*, schema::*};

/// Must match `configs::DB_KEY_COLUMN_LEN`.
const KEY_LEN: u32 = 1024;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(KvEntry::Table)
                    .if_not_exists()
                    .col(string_len(KvEntry::Key, KEY_LEN).primary_key())
                    .col(json_binary(KvEntry::Value).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(KvEntry::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum KvEntry {
    Table,
    Key,
    Value,
}
