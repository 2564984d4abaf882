//! The storage contract consumed by the protocol engine.

use crate::errors::StoreError;
use crate::provider::ProviderConfig;
use crate::request::{Client, OAuthRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Storage contract for the grant handlers.
///
/// Every token type has a create / get / invalidate-or-delete triplet. Get
/// operations return [`StoreError::NotFound`] for absent, expired, inactive
/// or mistyped records.
#[async_trait]
pub trait OAuthStorage: Send + Sync {
    async fn get_client(&self, client_id: &str) -> Result<Client, StoreError>;

    /// Replay check for JWT client assertions.
    async fn client_assertion_jwt_valid(&self, jti: &str) -> Result<(), StoreError>;

    async fn set_client_assertion_jwt(
        &self,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Resource-owner password check. Returns the account identifier.
    async fn authenticate(&self, username: &str, password: &str) -> Result<String, StoreError>;

    async fn create_authorize_code_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError>;

    async fn get_authorize_code_session(&self, signature: &str)
        -> Result<OAuthRequest, StoreError>;

    async fn invalidate_authorize_code_session(&self, signature: &str) -> Result<(), StoreError>;

    async fn create_access_token_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError>;

    async fn get_access_token_session(&self, signature: &str) -> Result<OAuthRequest, StoreError>;

    async fn delete_access_token_session(&self, signature: &str) -> Result<(), StoreError>;

    async fn create_refresh_token_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError>;

    async fn get_refresh_token_session(&self, signature: &str)
        -> Result<OAuthRequest, StoreError>;

    async fn delete_refresh_token_session(&self, signature: &str) -> Result<(), StoreError>;

    async fn create_pkce_request_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError>;

    async fn get_pkce_request_session(&self, signature: &str) -> Result<OAuthRequest, StoreError>;

    async fn delete_pkce_request_session(&self, signature: &str) -> Result<(), StoreError>;

    /// Revokes the refresh tokens issued under `request_id`.
    async fn revoke_refresh_token(&self, request_id: &str) -> Result<(), StoreError>;

    /// Refresh-token revocation allowing a grace period. No grace period is
    /// kept, so this revokes immediately.
    async fn revoke_refresh_token_maybe_grace_period(
        &self,
        signature: &str,
        request_id: &str,
    ) -> Result<(), StoreError>;

    /// Revokes the access tokens issued under `request_id`.
    async fn revoke_access_token(&self, request_id: &str) -> Result<(), StoreError>;

    /// Revokes every token of every type issued under `request_id`.
    async fn revoke_by_request(&self, request_id: &str) -> Result<(), StoreError>;

    /// Makes provider lifetimes available for expiry computation.
    fn attach_config(&self, _config: Arc<ProviderConfig>) {}

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
