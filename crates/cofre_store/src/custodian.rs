//! Key custodian: the single in-memory slot for the session key.
//!
//! The custodian owns the 32-byte session key for the duration of an
//! authenticated session.  An empty slot means encryption is disabled:
//! reads return raw on-disk forms and writes go through unencrypted.
//! Locking discards the key (zeroized on drop) but never erases persisted
//! ciphertext — it only removes the ability to read it until the next
//! unlock.
//!
//! The slot is not coordinated across processes; two processes unlocking
//! with different keys over the same database is a known limitation.

use std::sync::Arc;
use tokio::sync::RwLock;

use cofre_crypto::{kdf, SessionKey};

use crate::error::StoreError;

/// Thread-safe custodian handle.  Clone to share across tasks.
#[derive(Clone)]
pub struct KeyCustodian {
    inner: Arc<RwLock<Option<SessionKey>>>,
}

impl KeyCustodian {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// Derive the session key from `password` and the stored hex salt, and
    /// place it in the slot.  Call on successful login before any store
    /// read/write.
    pub async fn unlock(&self, password: &str, salt_hex: &str) -> Result<(), StoreError> {
        let key = kdf::derive_key(password, salt_hex)?;
        let mut guard = self.inner.write().await;
        *guard = Some(key);
        Ok(())
    }

    /// Install or clear the session key directly.  `None` disables
    /// encryption for the session (logout).
    pub async fn set_session_key(&self, key: Option<SessionKey>) {
        let mut guard = self.inner.write().await;
        *guard = key;
    }

    /// Discard the session key.
    pub async fn lock(&self) {
        self.set_session_key(None).await;
    }

    pub async fn is_locked(&self) -> bool {
        self.inner.read().await.is_none()
    }

    /// Copy of the current session key, if one is installed.
    pub async fn session_key(&self) -> Option<SessionKey> {
        self.inner.read().await.clone()
    }
}

impl Default for KeyCustodian {
    fn default() -> Self {
        Self::new()
    }
}
