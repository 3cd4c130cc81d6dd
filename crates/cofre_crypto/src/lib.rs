//! cofre_crypto — cryptographic primitives for the Cofre record store
//!
//! Two jobs, both pure and synchronous:
//! - `kdf` derives the 32-byte session key from a user password and a
//!   stored hex salt (PBKDF2-HMAC-SHA-256).
//! - `aead` seals/opens record payloads with AES-256-GCM in the
//!   `base64(nonce).base64(ciphertext)` wire format.
//!
//! Key material is zeroized on drop; decrypted buffers come back wrapped
//! in `Zeroizing`.

pub mod aead;
pub mod error;
pub mod kdf;

pub use error::CryptoError;
pub use kdf::SessionKey;
