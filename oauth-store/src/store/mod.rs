//! Durable implementation of the storage contract.

use crate::cache::null::NullSessionCache;
use crate::cache::SessionCache;
use crate::errors::StoreError;
use crate::password;
use crate::provider::ProviderConfig;
use crate::request::{Client, OAuthRequest, TokenType};
use crate::storage::OAuthStorage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use record::{StoredRequest, StoredTokenRecord};
use repository::{AccountRepository, ClientRepository, Database, SessionRepository};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

pub mod memory;
pub mod postgres;
pub mod record;
pub mod repository;

/// Upper bound for the detached last-login update.
const LAST_LOGIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifetime used when neither the session nor the configuration sets one.
fn default_lifespan(token_type: TokenType) -> Duration {
    match token_type {
        TokenType::AuthorizeCode | TokenType::Pkce => Duration::from_secs(10 * 60),
        TokenType::AccessToken => Duration::from_secs(60 * 60),
        TokenType::RefreshToken => Duration::from_secs(24 * 60 * 60),
    }
}

/// Token store backed by the durable database with an optional session cache in front.
pub struct TokenStore {
    database: Database,
    cache: Arc<dyn SessionCache>,
    config: RwLock<Option<Arc<ProviderConfig>>>,
}

impl TokenStore {
    /// Without a cache every read goes to the database.
    pub fn new(database: Database, cache: Option<Arc<dyn SessionCache>>) -> Self {
        Self {
            database,
            cache: cache.unwrap_or_else(|| Arc::new(NullSessionCache::new())),
            config: RwLock::new(None),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn config(&self) -> Option<Arc<ProviderConfig>> {
        self.config.read().ok().and_then(|config| config.clone())
    }

    /// Time a token of `token_type` should stay cached.
    ///
    /// A session expiry wins; an expiry already in the past yields zero. Without
    /// one, the attached configuration's lifespan applies, and failing that
    /// the type's default (10 min code and PKCE, 1 h access, 24 h refresh).
    pub fn ttl_for(&self, token_type: TokenType, expires_at: Option<DateTime<Utc>>) -> Duration {
        if let Some(expires_at) = expires_at {
            return (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        }
        self.config()
            .map(|config| config.lifespan(token_type))
            .filter(|lifespan| !lifespan.is_zero())
            .unwrap_or_else(|| default_lifespan(token_type))
    }

    async fn store_request(
        &self,
        token_type: TokenType,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError> {
        let client = request
            .client
            .as_ref()
            .ok_or_else(|| StoreError::precondition("client must be set on request"))?;
        let session = request
            .session
            .clone()
            .ok_or_else(|| StoreError::precondition("session must be set on request"))?;

        let request_id = if request.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            request.id.clone()
        };

        let stored = StoredRequest {
            request_id,
            requested_at: request.requested_at,
            client_id: client.id.clone(),
            form: request.sanitized_form(),
            requested_scope: request.requested_scope.clone(),
            granted_scope: request.granted_scope.clone(),
            requested_audience: request.requested_audience.clone(),
            granted_audience: request.granted_audience.clone(),
            session,
        };
        let expires_at = stored.session.expires_at(token_type);
        let record = StoredTokenRecord::new(signature, token_type, &stored, expires_at);

        self.database.upsert_session(&record).await?;
        debug!(
            "Stored {} for request {} (client '{}')",
            token_type, stored.request_id, stored.client_id
        );

        self.write_through(token_type, signature, &stored, expires_at)
            .await;
        Ok(())
    }

    /// Mirrors a stored request into the cache. Failures are logged and swallowed;
    /// returns whether an entry was written.
    async fn write_through(
        &self,
        token_type: TokenType,
        signature: &str,
        stored: &StoredRequest,
        expires_at: Option<DateTime<Utc>>,
    ) -> bool {
        let ttl = self.ttl_for(token_type, expires_at);
        if ttl.is_zero() {
            debug!("Skipping cache write for expired {}", token_type);
            return false;
        }
        let now = Utc::now();
        let cache_expires_at = expires_at.unwrap_or_else(|| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| now.checked_add_signed(ttl))
                .unwrap_or(now)
        });

        if let Err(err) = self
            .cache
            .set(token_type, signature, stored, cache_expires_at, ttl)
            .await
        {
            warn!("Failed to cache {} {}: {}", token_type, signature, err);
            return false;
        }
        true
    }

    /// Cache-first lookup shared by every Get operation, repairing the cache
    /// from the durable store on a miss.
    async fn read_through(
        &self,
        token_type: TokenType,
        signature: &str,
    ) -> Result<OAuthRequest, StoreError> {
        match self.cache.get(token_type, signature).await {
            Ok(Some(entry)) if entry.expires_at > Utc::now() => {
                debug!("Cache hit for {} {}", token_type, signature);
                return Ok(entry.request.into_request());
            }
            Ok(Some(_)) => {
                debug!("Evicting expired cache entry for {} {}", token_type, signature);
                if let Err(err) = self.cache.delete(token_type, signature).await {
                    warn!("Failed to evict {} {}: {}", token_type, signature, err);
                }
            }
            Ok(None) => {
                debug!("Cache miss for {} {}", token_type, signature);
            }
            Err(err) => {
                warn!("Cache error for {} {}: {}", token_type, signature, err);
            }
        }

        let record = self
            .database
            .find_session(signature)
            .await?
            .ok_or(StoreError::NotFound)?;
        if !record.is_live(token_type, Utc::now()) {
            return Err(StoreError::NotFound);
        }

        let expires_at = record.expires_at;
        let stored = record.into_stored_request();
        if self
            .write_through(token_type, signature, &stored, expires_at)
            .await
        {
            // A revoke may have landed between the read and the cache write
            let still_live = self
                .database
                .find_session(signature)
                .await?
                .is_some_and(|record| record.is_live(token_type, Utc::now()));
            if !still_live {
                debug!("Dropping repaired {} {} revoked meanwhile", token_type, signature);
                self.cache.delete(token_type, signature).await?;
                return Err(StoreError::NotFound);
            }
        }
        Ok(stored.into_request())
    }

    async fn invalidate(&self, token_type: TokenType, signature: &str) -> Result<(), StoreError> {
        self.database
            .deactivate_signature(token_type, signature)
            .await?;
        self.cache.delete(token_type, signature).await?;
        Ok(())
    }

    async fn revoke_request_tokens(
        &self,
        token_type: TokenType,
        request_id: &str,
    ) -> Result<(), StoreError> {
        let revoked = self
            .database
            .deactivate_request(Some(token_type), request_id)
            .await?;
        debug!("Revoked {} {} for request {}", revoked, token_type, request_id);
        self.cache
            .delete_by_request_id(token_type, request_id)
            .await?;
        Ok(())
    }

    async fn check_credentials(&self, username: &str, password: &str) -> Result<String, StoreError> {
        if username.is_empty() || password.is_empty() {
            return Err(StoreError::NotFound);
        }

        let Some(account) = self.database.find_account_by_email(username).await? else {
            password::burn_verification(password).await;
            return Err(StoreError::NotFound);
        };

        if account.is_locked(Utc::now())
            || !account.is_active()
            || account.password_hash.is_empty()
        {
            password::burn_verification(password).await;
            return Err(StoreError::NotFound);
        }

        let matched =
            password::verify_password_blocking(password.to_string(), account.password_hash)
                .await?;
        if !matched {
            return Err(StoreError::NotFound);
        }

        self.spawn_last_login_touch(account.user_id.clone());
        Ok(account.user_id)
    }

    /// Records the login in a detached task. The caller never waits on it and
    /// its failures are only logged.
    fn spawn_last_login_touch(&self, user_id: String) {
        let database = self.database.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(LAST_LOGIN_TIMEOUT, database.touch_last_login(&user_id))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!("Failed to record last login: {}", err),
                Err(_) => debug!("Timed out recording last login"),
            }
        });
    }
}

#[async_trait]
impl OAuthStorage for TokenStore {
    async fn get_client(&self, client_id: &str) -> Result<Client, StoreError> {
        self.database
            .find_client(client_id)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn client_assertion_jwt_valid(&self, _jti: &str) -> Result<(), StoreError> {
        Err(StoreError::NotFound)
    }

    async fn set_client_assertion_jwt(
        &self,
        _jti: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<String, StoreError> {
        self.check_credentials(username, password).await
    }

    async fn create_authorize_code_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError> {
        self.store_request(TokenType::AuthorizeCode, signature, request)
            .await
    }

    async fn get_authorize_code_session(
        &self,
        signature: &str,
    ) -> Result<OAuthRequest, StoreError> {
        self.read_through(TokenType::AuthorizeCode, signature).await
    }

    async fn invalidate_authorize_code_session(&self, signature: &str) -> Result<(), StoreError> {
        self.invalidate(TokenType::AuthorizeCode, signature).await
    }

    async fn create_access_token_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError> {
        self.store_request(TokenType::AccessToken, signature, request)
            .await
    }

    async fn get_access_token_session(&self, signature: &str) -> Result<OAuthRequest, StoreError> {
        self.read_through(TokenType::AccessToken, signature).await
    }

    async fn delete_access_token_session(&self, signature: &str) -> Result<(), StoreError> {
        self.invalidate(TokenType::AccessToken, signature).await
    }

    async fn create_refresh_token_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError> {
        self.store_request(TokenType::RefreshToken, signature, request)
            .await
    }

    async fn get_refresh_token_session(
        &self,
        signature: &str,
    ) -> Result<OAuthRequest, StoreError> {
        self.read_through(TokenType::RefreshToken, signature).await
    }

    async fn delete_refresh_token_session(&self, signature: &str) -> Result<(), StoreError> {
        self.invalidate(TokenType::RefreshToken, signature).await
    }

    async fn create_pkce_request_session(
        &self,
        signature: &str,
        request: &OAuthRequest,
    ) -> Result<(), StoreError> {
        self.store_request(TokenType::Pkce, signature, request).await
    }

    async fn get_pkce_request_session(&self, signature: &str) -> Result<OAuthRequest, StoreError> {
        self.read_through(TokenType::Pkce, signature).await
    }

    async fn delete_pkce_request_session(&self, signature: &str) -> Result<(), StoreError> {
        self.invalidate(TokenType::Pkce, signature).await
    }

    async fn revoke_refresh_token(&self, request_id: &str) -> Result<(), StoreError> {
        self.revoke_request_tokens(TokenType::RefreshToken, request_id)
            .await
    }

    async fn revoke_refresh_token_maybe_grace_period(
        &self,
        _signature: &str,
        request_id: &str,
    ) -> Result<(), StoreError> {
        self.revoke_refresh_token(request_id).await
    }

    async fn revoke_access_token(&self, request_id: &str) -> Result<(), StoreError> {
        self.revoke_request_tokens(TokenType::AccessToken, request_id)
            .await
    }

    async fn revoke_by_request(&self, request_id: &str) -> Result<(), StoreError> {
        let revoked = self.database.deactivate_request(None, request_id).await?;
        debug!("Revoked {} tokens for request {}", revoked, request_id);
        for token_type in TokenType::ALL {
            self.cache
                .delete_by_request_id(token_type, request_id)
                .await?;
        }
        Ok(())
    }

    fn attach_config(&self, config: Arc<ProviderConfig>) {
        match self.config.write() {
            Ok(mut slot) => *slot = Some(config),
            Err(_) => warn!("Provider configuration lock poisoned, keeping previous value"),
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        self.database.health_check().await
    }
}
