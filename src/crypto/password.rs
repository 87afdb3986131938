/// One-way credential hashing (Argon2id)
///
/// Used for account passwords and for password-reset OTPs, which are never
/// stored in the clear. Verification goes through the scheme's own verifier,
/// so comparisons do not short-circuit on early byte mismatch.
use crate::error::{ApiError, ApiResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordVerifier, SaltString},
    Argon2, Params,
};

/// Parameterized Argon2id hasher
#[derive(Clone)]
pub struct PasswordHasher {
    memory_kib: u32,
    iterations: u32,
}

impl PasswordHasher {
    /// Create a hasher with the configured work factor
    pub fn new(memory_kib: u32, iterations: u32) -> Self {
        Self {
            memory_kib,
            iterations,
        }
    }

    fn argon2(&self) -> ApiResult<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| ApiError::Internal(format!("Invalid hash parameters: {}", e)))?;

        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }

    /// Hash a plaintext credential into a PHC string with a fresh salt
    pub fn hash(&self, plain: &str) -> ApiResult<String> {
        use argon2::password_hash::PasswordHasher as _;

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Verify a plaintext credential against a stored PHC string
    pub fn verify(&self, plain: &str, hashed: &str) -> ApiResult<bool> {
        let parsed = PasswordHash::new(hashed)
            .map_err(|e| ApiError::Internal(format!("Corrupt password hash: {}", e)))?;

        match self.argon2()?.verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ApiError::Internal(format!(
                "Password verification failed: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low-cost parameters keep the tests fast
    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1024, 1)
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let h = hasher();
        let hashed = h.hash("s3cret-pass").unwrap();

        assert!(hashed.starts_with("$argon2id$"));
        assert!(h.verify("s3cret-pass", &hashed).unwrap());
        assert!(!h.verify("wrong-pass", &hashed).unwrap());
    }

    #[test]
    fn test_same_input_different_salt() {
        let h = hasher();
        let a = h.hash("password").unwrap();
        let b = h.hash("password").unwrap();

        assert_ne!(a, b);
        assert!(h.verify("password", &a).unwrap());
        assert!(h.verify("password", &b).unwrap());
    }

    #[test]
    fn test_corrupt_hash_is_an_error() {
        let h = hasher();
        assert!(h.verify("password", "not-a-phc-string").is_err());
    }
}
