//! Schema migration, gated by `PRAGMA user_version`.
//!
//! Version history:
//!   v1 — tables with a single-field index on the partition attribute.
//!   v2 — encrypted payloads introduced (no DDL; rows migrate lazily).
//!   v3 — compound (partition, date) indexes replace the v1 single-field
//!        indexes.
//!
//! Rather than replaying per-version scripts, every step checks for what
//! already exists (CREATE ... IF NOT EXISTS, ALTER TABLE for missing
//! columns, DROP INDEX IF EXISTS), so running the routine twice at the
//! same target version is a no-op and a half-applied run can be resumed.

use sqlx::{Row, SqlitePool};

use crate::error::StoreError;
use crate::schema::{StoreDef, STORES};

/// Target schema version.  Opening a database whose on-disk version is
/// higher than this is an error — never a downgrade.
pub const SCHEMA_VERSION: i64 = 3;

pub async fn run(pool: &SqlitePool) -> Result<(), StoreError> {
    let on_disk: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(|e| StoreError::Open(e.to_string()))?;

    if on_disk > SCHEMA_VERSION {
        return Err(StoreError::Open(format!(
            "database is at schema version {on_disk}, newer than supported version {SCHEMA_VERSION}"
        )));
    }

    for def in STORES {
        ensure_store(pool, def)
            .await
            .map_err(|e| StoreError::Open(format!("migrating store '{}': {e}", def.name)))?;
    }

    if on_disk < SCHEMA_VERSION {
        sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
            .execute(pool)
            .await
            .map_err(|e| StoreError::Open(e.to_string()))?;
        tracing::debug!(from = on_disk, to = SCHEMA_VERSION, "schema migrated");
    }

    Ok(())
}

async fn ensure_store(pool: &SqlitePool, def: &StoreDef) -> Result<(), sqlx::Error> {
    let attr_columns: String = def
        .indexed
        .iter()
        .map(|attr| format!("{attr} TEXT, "))
        .collect();
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY NOT NULL, {attr_columns}doc TEXT NOT NULL)",
        def.name
    ))
    .execute(pool)
    .await?;

    // Attribute columns added after the table first shipped.
    let existing: Vec<String> = sqlx::query(&format!("PRAGMA table_info({})", def.name))
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();
    for attr in def.indexed {
        if !existing.iter().any(|col| col == attr) {
            sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {attr} TEXT", def.name))
                .execute(pool)
                .await?;
        }
    }

    if let Some(legacy) = def.legacy_index {
        sqlx::query(&format!("DROP INDEX IF EXISTS {legacy}"))
            .execute(pool)
            .await?;
    }

    if let Some(idx) = def.compound {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
            idx.name, def.name, idx.keys.0, idx.keys.1
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}
