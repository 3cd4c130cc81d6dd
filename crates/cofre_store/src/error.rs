use thiserror::Error;

use cofre_crypto::CryptoError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller-side input problem: missing `id`, malformed salt, unknown
    /// store or index name.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stored payload string that does not match the
    /// `base64(nonce).base64(ciphertext)` shape.
    #[error("Malformed payload: {0}")]
    Format(String),

    /// Authentication failure — wrong key or tampered ciphertext.
    #[error("Decryption failed (wrong key or tampered ciphertext)")]
    Decryption,

    /// Underlying database unavailable, blocked, or ahead of this build.
    #[error("Database unavailable: {0}")]
    Open(String),

    /// Engine-level statement or commit failure.
    #[error("Transaction error: {0}")]
    Transaction(#[from] sqlx::Error),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

impl From<CryptoError> for StoreError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AeadDecrypt => StoreError::Decryption,
            CryptoError::PayloadFormat(msg) => StoreError::Format(msg),
            CryptoError::Base64Decode(inner) => StoreError::Format(inner.to_string()),
            CryptoError::InvalidSalt(msg) => StoreError::Validation(format!("invalid salt: {msg}")),
            CryptoError::KeyDerivation(msg) => StoreError::Validation(msg),
            CryptoError::AeadEncrypt => StoreError::Validation("encryption failed".into()),
        }
    }
}
