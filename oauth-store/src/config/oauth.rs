//! Provider and client configuration

use crate::provider::ProviderConfig;
use confique::Config;
use serde::Deserialize;
use std::time::Duration;

/// A pre-provisioned client loaded at startup. `secret` is plaintext here and
/// is hashed when the provider is composed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StaticClient {
    pub id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default)]
    pub public: bool,
}

/// OAuth provider configuration
#[derive(Debug, Config, Clone)]
pub struct OAuthConfig {
    /// Global HMAC secret, at least 32 bytes
    #[config(env = "OAUTH_HMAC_SECRET", default = "")]
    pub hmac_secret: String,

    /// Primary service client identifier (default: user-org-admin)
    #[config(env = "OAUTH_CLIENT_ID", default = "user-org-admin")]
    pub client_id: String,

    /// Primary service client secret; the client is only registered when set
    #[config(env = "OAUTH_CLIENT_SECRET", default = "")]
    pub client_secret: String,

    /// Access token lifespan in seconds (default: 3600 = 1 hour)
    #[config(env = "OAUTH_ACCESS_TOKEN_LIFESPAN", default = 3600)]
    pub access_token_lifespan: u64,

    /// Refresh token lifespan in seconds (default: 86400 = 24 hours)
    #[config(env = "OAUTH_REFRESH_TOKEN_LIFESPAN", default = 86400)]
    pub refresh_token_lifespan: u64,

    /// Authorization code lifespan in seconds (default: 600 = 10 minutes)
    #[config(env = "OAUTH_AUTHORIZE_CODE_LIFESPAN", default = 600)]
    pub authorize_code_lifespan: u64,

    /// ID token lifespan in seconds (default: 3600 = 1 hour)
    #[config(env = "OAUTH_ID_TOKEN_LIFESPAN", default = 3600)]
    pub id_token_lifespan: u64,

    /// Random bytes per generated token (default: 32)
    #[config(env = "OAUTH_TOKEN_ENTROPY", default = 32)]
    pub token_entropy: usize,

    /// Require PKCE for public clients (default: true)
    #[config(env = "OAUTH_ENFORCE_PKCE", default = true)]
    pub enforce_pkce: bool,

    /// Additional static clients, only settable from the config file
    #[config(default = [])]
    pub static_clients: Vec<StaticClient>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            hmac_secret: String::new(),
            client_id: "user-org-admin".to_string(),
            client_secret: String::new(),
            access_token_lifespan: 3600,
            refresh_token_lifespan: 86400,
            authorize_code_lifespan: 600,
            id_token_lifespan: 3600,
            token_entropy: 32,
            enforce_pkce: true,
            static_clients: Vec::new(),
        }
    }
}

impl OAuthConfig {
    /// Every static client: the primary client (when it has a secret) followed by the file-defined ones.
    pub fn clients(&self) -> Vec<StaticClient> {
        let mut clients = Vec::with_capacity(self.static_clients.len() + 1);
        if !self.client_secret.is_empty() {
            clients.push(StaticClient {
                id: self.client_id.clone(),
                secret: self.client_secret.clone(),
                ..Default::default()
            });
        }
        clients.extend(self.static_clients.iter().cloned());
        clients
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            access_token_lifespan: Duration::from_secs(self.access_token_lifespan),
            refresh_token_lifespan: Duration::from_secs(self.refresh_token_lifespan),
            authorize_code_lifespan: Duration::from_secs(self.authorize_code_lifespan),
            id_token_lifespan: Duration::from_secs(self.id_token_lifespan),
            global_secret: self.hmac_secret.as_bytes().to_vec(),
            token_entropy: self.token_entropy,
            enforce_pkce: self.enforce_pkce,
            ..ProviderConfig::standard()
        }
    }
}
