use super::config::ProviderConfig;
use super::strategy::TokenStrategy;
use crate::request::TokenType;
use crate::storage::OAuthStorage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The grant and endpoint handlers a provider can be composed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    AuthorizeCode,
    ResourceOwnerPassword,
    RefreshToken,
    ClientCredentials,
    Introspection,
    Revocation,
    Pkce,
}

impl HandlerKind {
    /// The `grant_type` value served at the token endpoint, if any.
    pub fn grant_type(&self) -> Option<&'static str> {
        match self {
            HandlerKind::AuthorizeCode => Some("authorization_code"),
            HandlerKind::ResourceOwnerPassword => Some("password"),
            HandlerKind::RefreshToken => Some("refresh_token"),
            HandlerKind::ClientCredentials => Some("client_credentials"),
            HandlerKind::Introspection | HandlerKind::Revocation | HandlerKind::Pkce => None,
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandlerKind::AuthorizeCode => "authorize-code",
            HandlerKind::ResourceOwnerPassword => "password",
            HandlerKind::RefreshToken => "refresh-token",
            HandlerKind::ClientCredentials => "client-credentials",
            HandlerKind::Introspection => "introspection",
            HandlerKind::Revocation => "revocation",
            HandlerKind::Pkce => "pkce",
        };
        f.write_str(name)
    }
}

/// What a handler factory receives once storage and strategy are built.
#[derive(Clone)]
pub struct ComposeContext {
    pub config: Arc<ProviderConfig>,
    pub storage: Arc<dyn OAuthStorage>,
    pub strategy: Arc<dyn TokenStrategy>,
}

pub trait GrantHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    fn can_handle(&self, grant_type: &str) -> bool {
        self.kind().grant_type() == Some(grant_type)
    }

    /// Lifetime of the token this handler issues, if it issues one.
    fn lifespan(&self) -> Option<Duration> {
        None
    }

    fn requires_pkce(&self) -> bool {
        false
    }
}

pub type HandlerFactory = fn(&ComposeContext) -> Arc<dyn GrantHandler>;

/// A handler whose issuing parameters are resolved from the provider configuration.
#[derive(Debug, Clone, Copy)]
pub struct StandardHandler {
    kind: HandlerKind,
    lifespan: Option<Duration>,
    requires_pkce: bool,
}

impl StandardHandler {
    pub fn new(kind: HandlerKind, config: &ProviderConfig) -> Self {
        let issues = match kind {
            HandlerKind::AuthorizeCode => Some(TokenType::AuthorizeCode),
            HandlerKind::Pkce => Some(TokenType::Pkce),
            HandlerKind::ResourceOwnerPassword | HandlerKind::ClientCredentials => {
                Some(TokenType::AccessToken)
            }
            HandlerKind::RefreshToken => Some(TokenType::RefreshToken),
            HandlerKind::Introspection | HandlerKind::Revocation => None,
        };
        Self {
            kind,
            lifespan: issues.map(|token_type| config.lifespan(token_type)),
            requires_pkce: config.enforce_pkce
                && matches!(kind, HandlerKind::AuthorizeCode | HandlerKind::Pkce),
        }
    }
}

impl GrantHandler for StandardHandler {
    fn kind(&self) -> HandlerKind {
        self.kind
    }

    fn lifespan(&self) -> Option<Duration> {
        self.lifespan
    }

    fn requires_pkce(&self) -> bool {
        self.requires_pkce
    }
}

fn standard(kind: HandlerKind, context: &ComposeContext) -> Arc<dyn GrantHandler> {
    Arc::new(StandardHandler::new(kind, &context.config))
}

pub fn authorize_code_factory(context: &ComposeContext) -> Arc<dyn GrantHandler> {
    standard(HandlerKind::AuthorizeCode, context)
}

pub fn password_factory(context: &ComposeContext) -> Arc<dyn GrantHandler> {
    standard(HandlerKind::ResourceOwnerPassword, context)
}

pub fn refresh_token_factory(context: &ComposeContext) -> Arc<dyn GrantHandler> {
    standard(HandlerKind::RefreshToken, context)
}

pub fn client_credentials_factory(context: &ComposeContext) -> Arc<dyn GrantHandler> {
    standard(HandlerKind::ClientCredentials, context)
}

pub fn introspection_factory(context: &ComposeContext) -> Arc<dyn GrantHandler> {
    standard(HandlerKind::Introspection, context)
}

pub fn revocation_factory(context: &ComposeContext) -> Arc<dyn GrantHandler> {
    standard(HandlerKind::Revocation, context)
}

pub fn pkce_factory(context: &ComposeContext) -> Arc<dyn GrantHandler> {
    standard(HandlerKind::Pkce, context)
}

/// Authorize code, password, refresh token, client credentials,
/// introspection, revocation and PKCE.
pub fn default_factories() -> Vec<HandlerFactory> {
    vec![
        authorize_code_factory as HandlerFactory,
        password_factory as HandlerFactory,
        refresh_token_factory as HandlerFactory,
        client_credentials_factory as HandlerFactory,
        introspection_factory as HandlerFactory,
        revocation_factory as HandlerFactory,
        pkce_factory as HandlerFactory,
    ]
}
