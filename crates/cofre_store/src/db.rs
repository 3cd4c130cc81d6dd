//! The storage engine: CRUD and cursor queries over SQLite via sqlx, with
//! transparent encryption for stores flagged in the schema.
//!
//! Error policy: on single-record paths every failure is fatal to that
//! call.  On scan paths (`query`, `get_all`) a record that will not
//! decrypt is logged and omitted — reporting screens prefer the rows that
//! are readable over all-or-nothing strictness.  A scan can therefore
//! return fewer rows than exist on disk.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use cofre_crypto::SessionKey;

use crate::codec::{self, StoredRecord};
use crate::custodian::KeyCustodian;
use crate::error::StoreError;
use crate::migrations;
use crate::query::Query;
use crate::schema::{self, StoreDef};

/// Cap on parallel cipher work ahead of a bulk write, so a large import
/// does not saturate every core.
const ENCRYPT_CONCURRENCY: usize = 8;

/// Central engine handle.  Cheap to clone (pool is Arc internally);
/// construct once per process and pass by reference.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    custodian: KeyCustodian,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) the database at `db_path` and migrate it to the
    /// current schema version.
    ///
    /// WAL journal mode is configured at connection time, not inside the
    /// migration — SQLite forbids changing `journal_mode` inside a
    /// transaction.
    pub async fn open(db_path: &Path, custodian: KeyCustodian) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts)
            .await
            .map_err(|e| StoreError::Open(e.to_string()))?;

        migrations::run(&pool).await?;

        Ok(Self { pool, custodian })
    }

    pub fn custodian(&self) -> &KeyCustodian {
        &self.custodian
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// Fetch one record by primary key.
    ///
    /// Encrypted store, key present: ciphertext is decrypted; a legacy
    /// plaintext row is returned immediately and re-encrypted in the
    /// background (read-repair).  No key: the raw on-disk form comes back
    /// unmodified, ciphertext as an opaque envelope.
    pub async fn get(&self, store: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let def = schema::store_def(store)?;
        let sql = format!("SELECT doc FROM {} WHERE id = ?", def.name);
        let doc: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(doc) = doc else {
            return Ok(None);
        };
        let stored = StoredRecord::from_value(serde_json::from_str(&doc)?)?;

        if !def.encrypted {
            return Ok(Some(stored.into_value()));
        }
        let Some(key) = self.custodian.session_key().await else {
            return Ok(Some(stored.into_value()));
        };

        match stored {
            StoredRecord::Encrypted(_) => Ok(Some(codec::decrypt(stored, &key)?.into_value())),
            StoredRecord::Plain(_) => {
                let value = stored.to_value();
                let engine = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = engine.repair_one(def, stored, &doc, &key).await {
                        tracing::warn!(store = def.name, error = %e, "read-repair failed");
                    }
                });
                Ok(Some(value))
            }
        }
    }

    /// Load and decrypt every record in a store, ordered by primary key.
    /// Legacy plaintext rows found along the way are flushed back through
    /// one background `bulk_put` pass.
    pub async fn get_all(&self, store: &str) -> Result<Vec<Value>, StoreError> {
        let def = schema::store_def(store)?;
        let sql = format!("SELECT doc FROM {} ORDER BY id ASC", def.name);
        let rows: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        let key = if def.encrypted {
            self.custodian.session_key().await
        } else {
            None
        };

        let mut out = Vec::with_capacity(rows.len());
        let mut legacy = Vec::new();
        for doc in rows {
            let stored = StoredRecord::from_value(serde_json::from_str(&doc)?)?;
            let was_plain = matches!(stored, StoredRecord::Plain(_));
            let Some(plain) = decrypt_or_skip(def, stored, key.as_ref())? else {
                continue;
            };
            let value = plain.into_value();
            if was_plain && key.is_some() {
                legacy.push(value.clone());
            }
            out.push(value);
        }

        if !legacy.is_empty() {
            let engine = self.clone();
            let count = legacy.len();
            tokio::spawn(async move {
                match engine.bulk_put(def.name, legacy).await {
                    Ok(()) => tracing::debug!(store = def.name, count, "bulk read-repair flushed"),
                    Err(e) => tracing::warn!(store = def.name, error = %e, "bulk read-repair failed"),
                }
            });
        }

        Ok(out)
    }

    /// Walk a store (or one of its compound indexes) in key order,
    /// decrypting and filtering along the way.
    pub async fn query(&self, store: &str, query: Query) -> Result<Vec<Value>, StoreError> {
        let def = schema::store_def(store)?;

        let mut sql = format!("SELECT doc FROM {}", def.name);
        let mut binds: Vec<String> = Vec::new();
        let order_cols: Vec<&str> = match &query.index {
            Some(name) => {
                let idx = def.index(name)?;
                if let Some(range) = &query.range {
                    sql.push_str(&format!(" WHERE {} = ?", idx.keys.0));
                    binds.push(range.partition.clone());
                    if let Some(lower) = &range.lower {
                        sql.push_str(&format!(" AND {} >= ?", idx.keys.1));
                        binds.push(lower.clone());
                    }
                    if let Some(upper) = &range.upper {
                        sql.push_str(&format!(" AND {} <= ?", idx.keys.1));
                        binds.push(upper.clone());
                    }
                }
                vec![idx.keys.0, idx.keys.1, "id"]
            }
            None => {
                if query.range.is_some() {
                    return Err(StoreError::Validation(
                        "a key range requires an index".into(),
                    ));
                }
                vec!["id"]
            }
        };
        let dir = query.direction.sql();
        let order = order_cols
            .iter()
            .map(|col| format!("{col} {dir}"))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" ORDER BY {order}"));

        let mut stmt = sqlx::query_scalar::<_, String>(&sql);
        for bind in &binds {
            stmt = stmt.bind(bind.as_str());
        }
        let rows = stmt.fetch_all(&self.pool).await?;

        let key = if def.encrypted {
            self.custodian.session_key().await
        } else {
            None
        };

        let mut out = Vec::with_capacity(rows.len());
        for doc in rows {
            let stored = StoredRecord::from_value(serde_json::from_str(&doc)?)?;
            let Some(record) = decrypt_or_skip(def, stored, key.as_ref())? else {
                continue;
            };
            let value = record.into_value();
            if query.filter.as_ref().map_or(true, |f| f(&value)) {
                out.push(value);
            }
        }
        Ok(out)
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Upsert one record (full replace — there is no partial field patch
    /// at this layer).  Encrypted before write when the store is flagged
    /// and a key is present; written as given otherwise.
    pub async fn put(&self, store: &str, record: Value) -> Result<(), StoreError> {
        let def = schema::store_def(store)?;
        let stored = self.prepare(def, record).await?;
        let mut conn = self.pool.acquire().await?;
        write_record(&mut conn, def, &stored).await
    }

    /// Batch upsert in one transaction — all records commit or none do.
    /// Cipher work happens before the transaction opens, bounded by
    /// `ENCRYPT_CONCURRENCY`, so it never extends the write lock.
    pub async fn bulk_put(&self, store: &str, records: Vec<Value>) -> Result<(), StoreError> {
        let def = schema::store_def(store)?;

        // Classify and validate everything up front: a malformed record
        // aborts the batch with nothing persisted.
        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            let stored = StoredRecord::from_value(record)?;
            require_id(&stored)?;
            prepared.push(stored);
        }

        if def.encrypted {
            if let Some(key) = self.custodian.session_key().await {
                prepared = encrypt_batch(def, prepared, key).await?;
            }
        }

        let mut tx = self.pool.begin().await?;
        for record in &prepared {
            write_record(&mut tx, def, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Remove one record.  No cascading effects on other stores.
    pub async fn delete(&self, store: &str, id: &str) -> Result<(), StoreError> {
        let def = schema::store_def(store)?;
        let sql = format!("DELETE FROM {} WHERE id = ?", def.name);
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Remove every record in a store.
    pub async fn clear(&self, store: &str) -> Result<(), StoreError> {
        let def = schema::store_def(store)?;
        let sql = format!("DELETE FROM {}", def.name);
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────────

    async fn prepare(&self, def: &StoreDef, record: Value) -> Result<StoredRecord, StoreError> {
        let stored = StoredRecord::from_value(record)?;
        require_id(&stored)?;
        if def.encrypted {
            if let Some(key) = self.custodian.session_key().await {
                return codec::encrypt(def, stored, &key);
            }
        }
        Ok(stored)
    }

    /// Upgrade one legacy plaintext row to ciphertext.  The UPDATE is
    /// guarded on the old row image so a write that landed after our read
    /// is never clobbered; plaintext is never written back.
    async fn repair_one(
        &self,
        def: &StoreDef,
        record: StoredRecord,
        old_doc: &str,
        key: &SessionKey,
    ) -> Result<(), StoreError> {
        let encrypted = codec::encrypt(def, record, key)?;
        let id = encrypted
            .id()
            .ok_or_else(|| StoreError::Validation("record is missing an id".into()))?
            .to_owned();
        let doc = serde_json::to_string(&encrypted.to_value())?;

        let mut sql = format!("UPDATE {} SET doc = ?", def.name);
        for attr in def.indexed {
            sql.push_str(&format!(", {attr} = ?"));
        }
        sql.push_str(" WHERE id = ? AND doc = ?");

        let mut stmt = sqlx::query(&sql).bind(&doc);
        for attr in def.indexed {
            stmt = stmt.bind(encrypted.attr(attr));
        }
        let result = stmt
            .bind(&id)
            .bind(old_doc)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            tracing::debug!(store = def.name, id = %id, "read-repair skipped, row changed underneath");
        }
        Ok(())
    }
}

fn require_id(record: &StoredRecord) -> Result<(), StoreError> {
    match record.id() {
        Some(id) if !id.is_empty() => Ok(()),
        _ => Err(StoreError::Validation("record is missing an id".into())),
    }
}

/// Decrypt for a scan path: an undecryptable record is logged and dropped
/// rather than aborting the whole walk.
fn decrypt_or_skip(
    def: &StoreDef,
    stored: StoredRecord,
    key: Option<&SessionKey>,
) -> Result<Option<StoredRecord>, StoreError> {
    let Some(key) = key else {
        return Ok(Some(stored));
    };
    match codec::decrypt(stored, key) {
        Ok(record) => Ok(Some(record)),
        Err(e @ (StoreError::Format(_) | StoreError::Decryption)) => {
            tracing::warn!(store = def.name, error = %e, "skipping undecryptable record");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Encrypt a batch ahead of a transaction, preserving input order.
async fn encrypt_batch(
    def: &'static StoreDef,
    records: Vec<StoredRecord>,
    key: SessionKey,
) -> Result<Vec<StoredRecord>, StoreError> {
    let count = records.len();
    let semaphore = Arc::new(Semaphore::new(ENCRYPT_CONCURRENCY));
    let mut tasks: JoinSet<(usize, Result<StoredRecord, StoreError>)> = JoinSet::new();

    for (i, record) in records.into_iter().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| StoreError::Open(e.to_string()))?;
        let key = key.clone();
        tasks.spawn_blocking(move || {
            let result = codec::encrypt(def, record, &key);
            drop(permit);
            (i, result)
        });
    }

    let mut out: Vec<Option<StoredRecord>> = std::iter::repeat_with(|| None).take(count).collect();
    while let Some(joined) = tasks.join_next().await {
        let (i, result) = joined.map_err(|e| StoreError::Open(format!("encrypt worker: {e}")))?;
        out[i] = Some(result?);
    }
    Ok(out.into_iter().flatten().collect())
}

async fn write_record(
    conn: &mut sqlx::SqliteConnection,
    def: &StoreDef,
    record: &StoredRecord,
) -> Result<(), StoreError> {
    let id = record
        .id()
        .ok_or_else(|| StoreError::Validation("record is missing an id".into()))?;
    let doc = serde_json::to_string(&record.to_value())?;

    let mut cols = vec!["id"];
    cols.extend(def.indexed);
    cols.push("doc");
    let placeholders = vec!["?"; cols.len()].join(", ");
    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({placeholders})",
        def.name,
        cols.join(", ")
    );

    let mut stmt = sqlx::query(&sql).bind(id);
    for attr in def.indexed {
        stmt = stmt.bind(record.attr(attr));
    }
    stmt.bind(&doc).execute(&mut *conn).await?;
    Ok(())
}
