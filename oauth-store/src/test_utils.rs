use crate::cache::{CacheError, CachedEntry, SessionCache};
use crate::request::{Client, OAuthRequest, TokenType};
use crate::session::Session;
use crate::store::record::StoredRequest;
use crate::store::repository::AccountCredentials;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Initializes test logging once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Session for `user-1` in organization `org-A`.
pub fn tenant_session() -> Session {
    let mut session = Session::new("user-1").with_tenant("org-A", "user-1");
    session.granted_scopes = vec!["openid".to_string()];
    session
}

/// A request from `client-123` asking for `openid profile`, granted `openid`.
pub fn oauth_request(request_id: &str) -> OAuthRequest {
    let mut request = OAuthRequest::new(Client::new("client-123"), tenant_session())
        .with_id(request_id)
        .with_requested_scopes(["openid", "profile"])
        .with_requested_audience(["api"]);
    request.grant_scope("openid");
    request.grant_audience("api");
    request.add_form_value("grant_type", "authorization_code");
    request
}

pub fn stored_request(request_id: &str) -> StoredRequest {
    StoredRequest {
        request_id: request_id.to_string(),
        requested_at: Utc::now(),
        client_id: "client-123".to_string(),
        form: Default::default(),
        requested_scope: vec!["openid".to_string(), "profile".to_string()],
        granted_scope: vec!["openid".to_string()],
        requested_audience: Vec::new(),
        granted_audience: Vec::new(),
        session: tenant_session(),
    }
}

pub fn account(user_id: &str, password_hash: &str) -> AccountCredentials {
    AccountCredentials {
        user_id: user_id.to_string(),
        status: "active".to_string(),
        password_hash: password_hash.to_string(),
        lockout_until: None,
    }
}

/// A cache whose every operation fails, standing in for an unreachable backend.
pub struct FailingCache;

#[async_trait]
impl SessionCache for FailingCache {
    async fn get(
        &self,
        _token_type: TokenType,
        _signature: &str,
    ) -> Result<Option<CachedEntry>, CacheError> {
        Err(CacheError::Redis("connection refused".to_string()))
    }

    async fn set(
        &self,
        _token_type: TokenType,
        _signature: &str,
        _request: &StoredRequest,
        _expires_at: DateTime<Utc>,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::Redis("connection refused".to_string()))
    }

    async fn delete(&self, _token_type: TokenType, _signature: &str) -> Result<(), CacheError> {
        Err(CacheError::Redis("connection refused".to_string()))
    }

    async fn delete_by_request_id(
        &self,
        _token_type: TokenType,
        _request_id: &str,
    ) -> Result<(), CacheError> {
        Err(CacheError::Redis("connection refused".to_string()))
    }

    async fn health_check(&self) -> Result<(), String> {
        Err("connection refused".to_string())
    }
}
