//! Opaque HMAC-signed tokens.
//!
//! A token reads `{prefix}{key}.{signature}` where both halves are unpadded
//! base64url. Only the signature half is ever persisted, so a leaked row
//! cannot be replayed as a bearer token.

use crate::request::TokenType;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrategyError {
    #[error("Token is malformed")]
    Malformed,
    #[error("Token does not carry the {0} prefix")]
    WrongPrefix(TokenType),
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Signing key error: {0}")]
    Key(String),
}

/// A freshly minted token and the signature it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedToken {
    pub token: String,
    pub signature: String,
}

pub trait TokenStrategy: Send + Sync {
    fn generate(&self, token_type: TokenType) -> Result<GeneratedToken, StrategyError>;

    /// Checks the token's integrity and returns its storage signature.
    fn validate(&self, token_type: TokenType, token: &str) -> Result<String, StrategyError>;
}

pub struct HmacStrategy {
    secret: Vec<u8>,
    entropy: usize,
}

impl HmacStrategy {
    pub fn new(secret: Vec<u8>, entropy: usize) -> Self {
        Self { secret, entropy }
    }

    fn prefix(token_type: TokenType) -> &'static str {
        match token_type {
            TokenType::AuthorizeCode | TokenType::Pkce => "ac_",
            TokenType::AccessToken => "at_",
            TokenType::RefreshToken => "rt_",
        }
    }

    fn mac(&self) -> Result<HmacSha256, StrategyError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| StrategyError::Key(e.to_string()))
    }
}

impl TokenStrategy for HmacStrategy {
    fn generate(&self, token_type: TokenType) -> Result<GeneratedToken, StrategyError> {
        let mut key = vec![0u8; self.entropy];
        rand::thread_rng().fill_bytes(&mut key);

        let mut mac = self.mac()?;
        mac.update(&key);
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(GeneratedToken {
            token: format!(
                "{}{}.{}",
                Self::prefix(token_type),
                URL_SAFE_NO_PAD.encode(&key),
                signature
            ),
            signature,
        })
    }

    fn validate(&self, token_type: TokenType, token: &str) -> Result<String, StrategyError> {
        let body = token
            .strip_prefix(Self::prefix(token_type))
            .ok_or(StrategyError::WrongPrefix(token_type))?;
        let (key, signature) = body.split_once('.').ok_or(StrategyError::Malformed)?;
        if key.is_empty() || signature.is_empty() {
            return Err(StrategyError::Malformed);
        }

        let key_bytes = URL_SAFE_NO_PAD
            .decode(key)
            .map_err(|_| StrategyError::Malformed)?;
        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| StrategyError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(&key_bytes);
        mac.verify_slice(&signature_bytes)
            .map_err(|_| StrategyError::InvalidSignature)?;
        Ok(signature.to_string())
    }
}
