//! cofre_store — versioned, transparently-encrypted local record store
//!
//! # Encryption strategy
//! SQLite does NOT natively encrypt.  We use application-level encryption:
//! - For stores flagged encrypted, the business fields of every record are
//!   folded into an AES-256-GCM payload string; only the `id` and the
//!   declared indexed attributes stay in plaintext so range queries keep
//!   working without decryption.
//! - The session key is derived from the user password via PBKDF2 and held
//!   in memory only while a session is unlocked.  Locking discards the key
//!   but never touches persisted ciphertext.
//! - Records written before encryption existed are upgraded lazily: a read
//!   that finds legacy plaintext returns it immediately and re-encrypts it
//!   in the background (read-repair).  There is no transition back from
//!   ciphertext to plaintext.
//!
//! # Migration
//! The store schema is a fixed map in `schema`; `migrations::run` brings
//! the on-disk shape up to `SCHEMA_VERSION` with existence-checked steps,
//! so re-running it is a no-op.

pub mod codec;
pub mod custodian;
pub mod db;
pub mod error;
pub mod migrations;
pub mod models;
pub mod query;
pub mod schema;

pub use custodian::KeyCustodian;
pub use db::Store;
pub use error::StoreError;
pub use query::{Direction, KeyRange, Query};
