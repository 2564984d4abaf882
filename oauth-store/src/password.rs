//! Argon2id password hashing.
//!
//! New hashes are PHC strings (`$argon2id$v=19$m=65536,t=1,p=4$...`). Hashes
//! written by the previous account service use the form
//! `argon2id$v=19$t=<t>$m=<m>$p=<p>$<salt>$<hash>` with unpadded standard
//! base64, and still verify.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use log::warn;
use once_cell::sync::Lazy;
use subtle::ConstantTimeEq;
use thiserror::Error;

const ARGON_TIME: u32 = 1;
const ARGON_MEMORY_KIB: u32 = 64 * 1024;
const ARGON_THREADS: u32 = 4;
const ARGON_KEY_LEN: usize = 32;

/// Hash verified when there is no real hash to check, so every credential
/// failure costs one Argon2id evaluation.
static DECOY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("decoy-password-for-constant-effort").ok());

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password cannot be empty")]
    Empty,
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("failed to parse password hash: {0}")]
    Format(String),
    #[error("password verification task failed: {0}")]
    Task(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(
        ARGON_MEMORY_KIB,
        ARGON_TIME,
        ARGON_THREADS,
        Some(ARGON_KEY_LEN),
    )
    .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `password` into a PHC string with a fresh 16-byte salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Checks `password` against `encoded`.
///
/// A mismatch is `Ok(false)`. `Err` means the hash could not be evaluated at
/// all, which is an operational fault rather than a bad credential.
pub fn verify_password(password: &str, encoded: &str) -> Result<bool, PasswordError> {
    if encoded.starts_with("argon2id$") {
        return verify_legacy(password, encoded);
    }

    let parsed = PasswordHash::new(encoded).map_err(|e| PasswordError::Format(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Hash(e.to_string())),
    }
}

/// Runs [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(
    password: String,
    encoded: String,
) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &encoded))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
}

/// Spends one verification on the decoy hash and discards the outcome.
pub async fn burn_verification(password: &str) {
    let Some(decoy) = DECOY_HASH.as_ref() else {
        warn!("Decoy password hash unavailable, failure path is not constant effort");
        return;
    };
    let _ = verify_password_blocking(password.to_string(), decoy.clone()).await;
}

fn verify_legacy(password: &str, encoded: &str) -> Result<bool, PasswordError> {
    let parts: Vec<&str> = encoded.split('$').collect();
    if parts.len() != 7 {
        return Err(PasswordError::Format("unexpected segment count".to_string()));
    }

    let version = parse_field(parts[1], "v=")?;
    if version != 19 {
        return Err(PasswordError::Format(format!(
            "unsupported version {version}"
        )));
    }
    let time_cost = parse_field(parts[2], "t=")?;
    let memory_cost = parse_field(parts[3], "m=")?;
    let threads = parse_field(parts[4], "p=")?;

    let salt = STANDARD_NO_PAD
        .decode(parts[5])
        .map_err(|e| PasswordError::Format(format!("salt: {e}")))?;
    let expected = STANDARD_NO_PAD
        .decode(parts[6])
        .map_err(|e| PasswordError::Format(format!("hash: {e}")))?;

    let params = Params::new(memory_cost, time_cost, threads, Some(expected.len()))
        .map_err(|e| PasswordError::Format(e.to_string()))?;
    let mut actual = vec![0u8; expected.len()];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password.as_bytes(), &salt, &mut actual)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(bool::from(actual.ct_eq(&expected)))
}

fn parse_field(segment: &str, prefix: &str) -> Result<u32, PasswordError> {
    segment
        .strip_prefix(prefix)
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(|| PasswordError::Format(format!("invalid segment '{segment}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_hash(password: &str, salt: &[u8]) -> String {
        let params = Params::new(ARGON_MEMORY_KIB, ARGON_TIME, ARGON_THREADS, Some(32)).unwrap();
        let mut out = [0u8; 32];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(password.as_bytes(), salt, &mut out)
            .unwrap();
        format!(
            "argon2id$v=19$t={ARGON_TIME}$m={ARGON_MEMORY_KIB}$p={ARGON_THREADS}${}${}",
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(out)
        )
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=65536,t=1,p=4$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_empty_password_is_rejected() {
        assert!(matches!(hash_password(""), Err(PasswordError::Empty)));
    }

    #[test]
    fn test_legacy_format_verifies() {
        let hash = legacy_hash("correct horse", b"0123456789abcdef");
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("pw", "not-a-hash"),
            Err(PasswordError::Format(_))
        ));
        assert!(matches!(
            verify_password("pw", "argon2id$v=18$t=1$m=65536$p=4$c2FsdA$aGFzaA"),
            Err(PasswordError::Format(_))
        ));
        assert!(matches!(
            verify_password("pw", "argon2id$v=19$t=1$m=65536"),
            Err(PasswordError::Format(_))
        ));
    }

    #[tokio::test]
    async fn test_blocking_verification() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(verify_password_blocking("s3cret-pass".into(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("other".into(), hash).await.unwrap());
        burn_verification("anything").await;
    }
}
