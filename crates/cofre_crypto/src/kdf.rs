//! Key derivation.
//!
//! `derive_key` — PBKDF2-HMAC-SHA-256, derives the 32-byte session key that
//! encrypts record payloads. The salt is stored next to the account data
//! (hex-encoded, not secret); the derived key lives only in memory.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

/// PBKDF2 round count — tuned for interactive login on desktop hardware.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// 32-byte session key derived from a user password. Zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SessionKey(pub [u8; 32]);

/// Derive a session key from a password and a hex-encoded salt.
///
/// Deterministic for a given (password, salt) pair; a different salt yields
/// a different key even for the same password.
pub fn derive_key(password: &str, salt_hex: &str) -> Result<SessionKey, CryptoError> {
    let salt = hex::decode(salt_hex).map_err(|e| CryptoError::InvalidSalt(e.to_string()))?;
    if salt.is_empty() {
        return Err(CryptoError::InvalidSalt("salt must not be empty".into()));
    }

    let mut output = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut output);
    Ok(SessionKey(output))
}

/// Generate a fresh random 16-byte salt, hex-encoded (call once per account;
/// store alongside the account record).
pub fn generate_salt() -> String {
    use rand::RngCore;
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    hex::encode(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let a = derive_key("senha123", "00112233445566778899aabbccddeeff").unwrap();
        let b = derive_key("senha123", "00112233445566778899aabbccddeeff").unwrap();
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn different_salt_different_key() {
        let a = derive_key("senha123", "00112233445566778899aabbccddeeff").unwrap();
        let b = derive_key("senha123", "ff112233445566778899aabbccddee00").unwrap();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn rejects_non_hex_salt() {
        assert!(matches!(
            derive_key("senha123", "not-hex!"),
            Err(CryptoError::InvalidSalt(_))
        ));
    }

    #[test]
    fn rejects_empty_salt() {
        assert!(matches!(
            derive_key("senha123", ""),
            Err(CryptoError::InvalidSalt(_))
        ));
    }

    #[test]
    fn generated_salt_is_16_bytes_hex() {
        let salt = generate_salt();
        assert_eq!(salt.len(), 32);
        assert!(hex::decode(&salt).is_ok());
    }
}
