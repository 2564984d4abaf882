//! Provider composition: configuration defaults, static clients, storage,
//! token strategy and grant handlers wired into one [`Provider`].

use crate::cache::SessionCache;
use crate::config::oauth::StaticClient;
use crate::errors::{ProviderError, StoreError};
use crate::registry::ClientRegistry;
use crate::request::{Client, OAuthRequest, TokenType};
use crate::storage::OAuthStorage;
use crate::store::repository::Database;
use crate::store::TokenStore;
use handlers::{default_factories, ComposeContext, GrantHandler, HandlerFactory, HandlerKind};
use hasher::{Argon2Hasher, SecretHasher};
use log::{debug, info};
use std::sync::Arc;
use strategy::{HmacStrategy, TokenStrategy};

pub mod config;
pub mod handlers;
pub mod hasher;
pub mod strategy;

pub use config::ProviderConfig;

/// Shortest accepted global HMAC secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

const DEFAULT_GRANT_TYPES: [&str; 2] = ["password", "refresh_token"];
const DEFAULT_RESPONSE_TYPES: [&str; 1] = ["token"];
const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Everything [`compose`] needs. Either `storage` or `database` must be set.
#[derive(Default)]
pub struct ProviderDependencies {
    /// A complete storage implementation. Takes precedence over `database`.
    pub storage: Option<Arc<dyn OAuthStorage>>,
    pub database: Option<Database>,
    pub session_cache: Option<Arc<dyn SessionCache>>,
    pub config: Option<ProviderConfig>,
    pub hmac_secret: Vec<u8>,
    pub static_clients: Vec<StaticClient>,
    /// Replaces the default handler set when present.
    pub factories: Option<Vec<HandlerFactory>>,
}

/// A composed provider, ready to hand to the protocol endpoints.
pub struct Provider {
    config: Arc<ProviderConfig>,
    storage: Arc<dyn OAuthStorage>,
    strategy: Arc<dyn TokenStrategy>,
    handlers: Vec<Arc<dyn GrantHandler>>,
}

impl Provider {
    pub fn config(&self) -> &Arc<ProviderConfig> {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn OAuthStorage> {
        &self.storage
    }

    pub fn strategy(&self) -> &Arc<dyn TokenStrategy> {
        &self.strategy
    }

    pub fn handlers(&self) -> &[Arc<dyn GrantHandler>] {
        &self.handlers
    }

    pub fn handler(&self, kind: HandlerKind) -> Option<&Arc<dyn GrantHandler>> {
        self.handlers.iter().find(|handler| handler.kind() == kind)
    }

    pub fn has_handler(&self, kind: HandlerKind) -> bool {
        self.handler(kind).is_some()
    }

    pub fn supports_grant_type(&self, grant_type: &str) -> bool {
        self.handlers
            .iter()
            .any(|handler| handler.can_handle(grant_type))
    }

    /// Resolves a bearer access token to its stored request.
    ///
    /// Tokens that fail validation are reported as not found.
    pub async fn validate_access_token(&self, token: &str) -> Result<OAuthRequest, StoreError> {
        let signature = self
            .strategy
            .validate(TokenType::AccessToken, token)
            .map_err(|err| {
                debug!("Rejected access token: {}", err);
                StoreError::NotFound
            })?;
        self.storage.get_access_token_session(&signature).await
    }
}

/// Builds a [`Provider`] from its dependencies. Fails fast on any
/// misconfiguration.
pub fn compose(dependencies: ProviderDependencies) -> Result<Provider, ProviderError> {
    let ProviderDependencies {
        storage,
        database,
        session_cache,
        config,
        hmac_secret,
        static_clients,
        factories,
    } = dependencies;

    let mut config = config.unwrap_or_default();
    // The configured secret is the signing key; `hmac_secret` only fills it in
    if config.global_secret.is_empty() {
        config.global_secret = hmac_secret;
    }
    if config.global_secret.len() < MIN_SECRET_LEN {
        return Err(ProviderError::SecretTooShort {
            required: MIN_SECRET_LEN,
            actual: config.global_secret.len(),
        });
    }

    config.fill_defaults();
    let hasher = config
        .client_secrets_hasher
        .get_or_insert_with(|| Arc::new(Argon2Hasher) as Arc<dyn SecretHasher>)
        .clone();

    let clients = static_clients
        .into_iter()
        .enumerate()
        .map(|(index, client)| build_static_client(index, client, hasher.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let storage: Arc<dyn OAuthStorage> = match (storage, database) {
        (Some(storage), _) => storage,
        (None, Some(database)) => Arc::new(TokenStore::new(database, session_cache)),
        (None, None) => return Err(ProviderError::MissingStorage),
    };
    let storage: Arc<dyn OAuthStorage> = if clients.is_empty() {
        storage
    } else {
        info!("Registering {} static client(s)", clients.len());
        Arc::new(ClientRegistry::new(storage, clients))
    };

    let config = Arc::new(config);
    storage.attach_config(config.clone());

    let strategy: Arc<dyn TokenStrategy> = Arc::new(HmacStrategy::new(
        config.global_secret.clone(),
        config.token_entropy,
    ));

    let context = ComposeContext {
        config: config.clone(),
        storage: storage.clone(),
        strategy: strategy.clone(),
    };
    let handlers = factories
        .unwrap_or_else(default_factories)
        .into_iter()
        .map(|factory| factory(&context))
        .collect::<Vec<_>>();
    debug!(
        "Composed provider with handlers: {}",
        handlers
            .iter()
            .map(|handler| handler.kind().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(Provider {
        config,
        storage,
        strategy,
        handlers,
    })
}

fn build_static_client(
    index: usize,
    client: StaticClient,
    hasher: &dyn SecretHasher,
) -> Result<Client, ProviderError> {
    if client.id.is_empty() {
        return Err(ProviderError::StaticClientMissingId(index));
    }

    let secret_hash = if client.secret.is_empty() {
        None
    } else {
        let hash = hasher
            .hash(&client.secret)
            .map_err(|source| ProviderError::ClientSecretHash {
                client_id: client.id.clone(),
                source,
            })?;
        Some(hash)
    };

    Ok(Client {
        id: client.id,
        secret_hash,
        redirect_uris: client.redirect_uris,
        grant_types: or_defaults(client.grant_types, &DEFAULT_GRANT_TYPES),
        response_types: or_defaults(client.response_types, &DEFAULT_RESPONSE_TYPES),
        scopes: or_defaults(client.scopes, &DEFAULT_SCOPES),
        audience: client.audience,
        public: client.public,
    })
}

fn or_defaults(values: Vec<String>, defaults: &[&str]) -> Vec<String> {
    if values.is_empty() {
        defaults.iter().map(|value| value.to_string()).collect()
    } else {
        values
    }
}
