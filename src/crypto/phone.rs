/// Reversible encryption for phone numbers at rest
///
/// AES-256-GCM with a random 12-byte nonce prepended to the ciphertext and
/// the whole payload hex-encoded. Wrong key or corrupt ciphertext surfaces
/// as a decryption error, never a silent default.
use crate::error::{ApiError, ApiResult};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

/// Symmetric cipher for PII fields
#[derive(Clone)]
pub struct PhoneCipher {
    cipher: Aes256Gcm,
}

impl PhoneCipher {
    /// Create a cipher from a hex-encoded 32-byte key
    pub fn from_hex_key(key_hex: &str) -> ApiResult<Self> {
        let key_bytes = hex::decode(key_hex.trim())
            .map_err(|e| ApiError::Validation(format!("Invalid phone key: {}", e)))?;

        Self::from_key(&key_bytes)
    }

    /// Create a cipher from raw key bytes
    pub fn from_key(key: &[u8]) -> ApiResult<Self> {
        if key.len() != KEY_SIZE {
            return Err(ApiError::Validation(format!(
                "Phone key must be {} bytes, got {}",
                KEY_SIZE,
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| ApiError::Validation(format!("Invalid phone key: {}", e)))?;

        Ok(Self { cipher })
    }

    /// Encrypt a plaintext phone number
    pub fn encrypt(&self, plain: &str) -> ApiResult<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plain.as_bytes())
            .map_err(|e| ApiError::Internal(format!("Encryption failed: {}", e)))?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(hex::encode(payload))
    }

    /// Decrypt a stored phone number
    pub fn decrypt(&self, stored: &str) -> ApiResult<String> {
        let payload = hex::decode(stored)
            .map_err(|e| ApiError::Internal(format!("Corrupt ciphertext: {}", e)))?;

        if payload.len() < NONCE_SIZE {
            return Err(ApiError::Internal("Corrupt ciphertext: too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plain = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| ApiError::Internal("Decryption failed".to_string()))?;

        String::from_utf8(plain)
            .map_err(|_| ApiError::Internal("Decryption produced invalid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        [7u8; 32]
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = PhoneCipher::from_key(&test_key()).unwrap();
        let ct = cipher.encrypt("+201234567890").unwrap();

        assert_ne!(ct, "+201234567890");
        assert_eq!(cipher.decrypt(&ct).unwrap(), "+201234567890");
    }

    #[test]
    fn test_nonce_varies_per_encryption() {
        let cipher = PhoneCipher::from_key(&test_key()).unwrap();
        let a = cipher.encrypt("+201234567890").unwrap();
        let b = cipher.encrypt("+201234567890").unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher = PhoneCipher::from_key(&test_key()).unwrap();
        let other = PhoneCipher::from_key(&[9u8; 32]).unwrap();

        let ct = cipher.encrypt("+201234567890").unwrap();
        assert!(other.decrypt(&ct).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = PhoneCipher::from_key(&test_key()).unwrap();
        let mut ct = cipher.encrypt("+201234567890").unwrap();

        // Flip the last hex digit
        let flipped = if ct.ends_with('0') { "1" } else { "0" };
        ct.truncate(ct.len() - 1);
        ct.push_str(flipped);

        assert!(cipher.decrypt(&ct).is_err());
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(PhoneCipher::from_key(&[1u8; 16]).is_err());
    }
}
