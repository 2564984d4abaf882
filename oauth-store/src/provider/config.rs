use super::hasher::SecretHasher;
use crate::request::TokenType;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ACCESS_TOKEN_LIFESPAN: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_REFRESH_TOKEN_LIFESPAN: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_AUTHORIZE_CODE_LIFESPAN: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_ID_TOKEN_LIFESPAN: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_TOKEN_ENTROPY: usize = 32;

/// Resolved provider settings shared by the strategy, handlers and storage.
///
/// A zero lifespan means "not configured".
#[derive(Clone)]
pub struct ProviderConfig {
    pub access_token_lifespan: Duration,
    pub refresh_token_lifespan: Duration,
    pub authorize_code_lifespan: Duration,
    pub id_token_lifespan: Duration,
    pub global_secret: Vec<u8>,
    /// Random bytes per generated token
    pub token_entropy: usize,
    pub enforce_pkce: bool,
    pub enable_pkce_plain_challenge_method: bool,
    pub client_secrets_hasher: Option<Arc<dyn SecretHasher>>,
}

impl ProviderConfig {
    /// Standard lifetimes, PKCE enforced, plain PKCE disabled.
    pub fn standard() -> Self {
        Self {
            access_token_lifespan: DEFAULT_ACCESS_TOKEN_LIFESPAN,
            refresh_token_lifespan: DEFAULT_REFRESH_TOKEN_LIFESPAN,
            authorize_code_lifespan: DEFAULT_AUTHORIZE_CODE_LIFESPAN,
            id_token_lifespan: DEFAULT_ID_TOKEN_LIFESPAN,
            global_secret: Vec::new(),
            token_entropy: DEFAULT_TOKEN_ENTROPY,
            enforce_pkce: true,
            enable_pkce_plain_challenge_method: false,
            client_secrets_hasher: None,
        }
    }

    /// Configured lifespan for a stored token type. PKCE follows the authorization code.
    pub fn lifespan(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::AuthorizeCode | TokenType::Pkce => self.authorize_code_lifespan,
            TokenType::AccessToken => self.access_token_lifespan,
            TokenType::RefreshToken => self.refresh_token_lifespan,
        }
    }

    /// Replaces unset lifetimes and entropy with the standard values.
    pub(crate) fn fill_defaults(&mut self) {
        let standard = Self::standard();
        if self.access_token_lifespan.is_zero() {
            self.access_token_lifespan = standard.access_token_lifespan;
        }
        if self.refresh_token_lifespan.is_zero() {
            self.refresh_token_lifespan = standard.refresh_token_lifespan;
        }
        if self.authorize_code_lifespan.is_zero() {
            self.authorize_code_lifespan = standard.authorize_code_lifespan;
        }
        if self.id_token_lifespan.is_zero() {
            self.id_token_lifespan = standard.id_token_lifespan;
        }
        if self.token_entropy == 0 {
            self.token_entropy = standard.token_entropy;
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("access_token_lifespan", &self.access_token_lifespan)
            .field("refresh_token_lifespan", &self.refresh_token_lifespan)
            .field("authorize_code_lifespan", &self.authorize_code_lifespan)
            .field("id_token_lifespan", &self.id_token_lifespan)
            .field("global_secret", &"<redacted>")
            .field("token_entropy", &self.token_entropy)
            .field("enforce_pkce", &self.enforce_pkce)
            .field(
                "enable_pkce_plain_challenge_method",
                &self.enable_pkce_plain_challenge_method,
            )
            .field("client_secrets_hasher", &self.client_secrets_hasher.is_some())
            .finish()
    }
}
