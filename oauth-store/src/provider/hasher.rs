use crate::password::{self, PasswordError};

/// Hashes and checks client secrets.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, PasswordError>;

    fn compare(&self, hash: &str, secret: &str) -> Result<bool, PasswordError>;
}

/// Argon2id hasher, the same scheme used for account passwords.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        password::hash_password(secret)
    }

    fn compare(&self, hash: &str, secret: &str) -> Result<bool, PasswordError> {
        password::verify_password(secret, hash)
    }
}
