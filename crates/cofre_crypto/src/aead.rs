//! Authenticated encryption of record payloads.
//!
//! AES-256-GCM.  Key: 32 bytes.  Nonce: 12 bytes (random per call).
//! Tag: 16 bytes, appended to the ciphertext by the cipher.
//!
//! Payload wire format:
//!   base64(nonce) "." base64(ciphertext + tag)
//!
//! A nonce is generated fresh from the OS RNG on every `seal` call and is
//! never reused with the same key; GCM's confidentiality collapses on a
//! (key, nonce) repeat.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under a 32-byte key into the dotted payload format.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::AeadEncrypt)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::AeadEncrypt)?;

    Ok(format!("{}.{}", B64.encode(nonce), B64.encode(&ciphertext)))
}

/// Decrypt a dotted payload. Fails closed: a wrong key or tampered
/// ciphertext is `AeadDecrypt`, never partial plaintext.
pub fn open(key: &[u8; 32], payload: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let (nonce_b64, ct_b64) = payload
        .split_once('.')
        .ok_or_else(|| CryptoError::PayloadFormat("missing '.' separator".into()))?;
    if ct_b64.contains('.') {
        return Err(CryptoError::PayloadFormat(
            "more than one '.' separator".into(),
        ));
    }

    let nonce_bytes = B64.decode(nonce_b64)?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(CryptoError::PayloadFormat(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce_bytes.len()
        )));
    }
    let ciphertext = B64.decode(ct_b64)?;

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::AeadDecrypt)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| CryptoError::AeadDecrypt)?;

    Ok(Zeroizing::new(plaintext))
}
