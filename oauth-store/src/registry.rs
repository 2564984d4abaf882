//! Static client table layered over another storage implementation.

use crate::errors::StoreError;
use crate::provider::ProviderConfig;
use crate::request::{Client, OAuthRequest};
use crate::storage::OAuthStorage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Serves pre-provisioned clients from memory and forwards everything else
/// to the wrapped storage.
pub struct ClientRegistry {
    inner: Arc<dyn OAuthStorage>,
    clients: HashMap<String, Client>,
}

impl ClientRegistry {
    /// Later clients with a duplicate id replace earlier ones.
    pub fn new(inner: Arc<dyn OAuthStorage>, clients: Vec<Client>) -> Self {
        let clients = clients
            .into_iter()
            .map(|client| (client.id.clone(), client))
            .collect();
        Self { inner, clients }
    }

    pub fn static_client(&self, client_id: &str) -> Option<&Client> {
        self.clients.get(client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl OAuthStorage for ClientRegistry {
    async fn get_client(&self, client_id: &str) -> Result<Client, StoreError> {
        if let Some(client) = self.clients.get(client_id) {
            debug!("Serving static client '{}'", client_id);
            return Ok(client.clone());
        }
        self.inner.get_client(client_id).await
    }

    async fn client_assertion_jwt_valid(&self, jti: &str) -> Result<(), StoreError> {
        self.inner.client_assertion_jwt_valid(jti).await
    }

    async fn set_client_assertion_jwt(
        &self,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.set_client_assertion_jwt(jti, expires_at).await
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<String, StoreError> {
        self.inner.authenticate(username, password).await
    }

    async fn create_authorize_code_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError> {
        self.inner
            .create_authorize_code_session(signature, request)
            .await
    }

    async fn get_authorize_code_session(
        &self,
        signature: &str,
    ) -> Result<OAuthRequest, StoreError> {
        self.inner.get_authorize_code_session(signature).await
    }

    async fn invalidate_authorize_code_session(&self, signature: &str) -> Result<(), StoreError> {
        self.inner.invalidate_authorize_code_session(signature).await
    }

    async fn create_access_token_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError> {
        self.inner
            .create_access_token_session(signature, request)
            .await
    }

    async fn get_access_token_session(&self, signature: &str) -> Result<OAuthRequest, StoreError> {
        self.inner.get_access_token_session(signature).await
    }

    async fn delete_access_token_session(&self, signature: &str) -> Result<(), StoreError> {
        self.inner.delete_access_token_session(signature).await
    }

    async fn create_refresh_token_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError> {
        self.inner
            .create_refresh_token_session(signature, request)
            .await
    }

    async fn get_refresh_token_session(
        &self,
        signature: &str,
    ) -> Result<OAuthRequest, StoreError> {
        self.inner.get_refresh_token_session(signature).await
    }

    async fn delete_refresh_token_session(&self, signature: &str) -> Result<(), StoreError> {
        self.inner.delete_refresh_token_session(signature).await
    }

    async fn create_pkce_request_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError> {
        self.inner
            .create_pkce_request_session(signature, request)
            .await
    }

    async fn get_pkce_request_session(&self, signature: &str) -> Result<OAuthRequest, StoreError> {
        self.inner.get_pkce_request_session(signature).await
    }

    async fn delete_pkce_request_session(&self, signature: &str) -> Result<(), StoreError> {
        self.inner.delete_pkce_request_session(signature).await
    }

    async fn revoke_refresh_token(&self, request_id: &str) -> Result<(), StoreError> {
        self.inner.revoke_refresh_token(request_id).await
    }

    async fn revoke_refresh_token_maybe_grace_period(
        &self,
        signature: &str,
        request_id: &str,
    ) -> Result<(), StoreError> {
        self.inner
            .revoke_refresh_token_maybe_grace_period(signature, request_id)
            .await
    }

    async fn revoke_access_token(&self, request_id: &str) -> Result<(), StoreError> {
        self.inner.revoke_access_token(request_id).await
    }

    async fn revoke_by_request(&self, request_id: &str) -> Result<(), StoreError> {
        self.inner.revoke_by_request(request_id).await
    }

    fn attach_config(&self, config: Arc<ProviderConfig>) {
        self.inner.attach_config(config);
    }

    async fn health_check(&self) -> Result<(), String> {
        self.inner.health_check().await
    }
}
