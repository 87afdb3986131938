/// Credential hashing and PII encryption primitives

pub mod password;
pub mod phone;

pub use password::PasswordHasher;
pub use phone::PhoneCipher;
