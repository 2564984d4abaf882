use crate::config::{CacheConfig, CacheStore};
use crate::request::TokenType;
use crate::store::record::StoredRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod null;
pub mod redis;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to parse value: {0}")]
    Deserialization(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A cached token: the stored request plus the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub request: StoredRequest,
    pub expires_at: DateTime<Utc>,
}

/// Session cache contract.
///
/// Entries are scoped by token type and signature. Every backend also keeps a
/// reverse index from request identifier to the signatures issued under it,
/// so that a whole grant can be evicted at once.
#[async_trait::async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(
        &self,
        token_type: TokenType,
        signature: &str,
    ) -> Result<Option<CachedEntry>, CacheError>;

    /// Stores the entry and records the signature in the request's reverse
    /// index. Both writes land together; the index never expires before the
    /// longest-lived entry recorded in it.
    async fn set(
        &self,
        token_type: TokenType,
        signature: &str,
        request: &StoredRequest,
        expires_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Removes the entry and, when the entry is still readable, its reverse-index member.
    async fn delete(&self, token_type: TokenType, signature: &str) -> Result<(), CacheError>;

    /// Removes every entry recorded against `request_id` and the index itself.
    async fn delete_by_request_id(
        &self,
        token_type: TokenType,
        request_id: &str,
    ) -> Result<(), CacheError>;

    /// Returns Ok(()) if healthy, or Err with a descriptive message if unhealthy.
    async fn health_check(&self) -> Result<(), String>;
}

/// Key layout shared by every backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    pub const DEFAULT_PREFIX: &'static str = "oauth";

    pub fn new(prefix: &str) -> Self {
        let prefix = if prefix.is_empty() {
            Self::DEFAULT_PREFIX
        } else {
            prefix
        };
        Self {
            prefix: prefix.to_string(),
        }
    }

    /// `{prefix}:{token_type}:{signature}`
    pub fn signature_key(&self, token_type: TokenType, signature: &str) -> String {
        format!("{}:{}:{}", self.prefix, token_type, signature)
    }

    /// `{prefix}:req:{token_type}:{request_id}`
    pub fn request_key(&self, token_type: TokenType, request_id: &str) -> String {
        format!("{}:req:{}:{}", self.prefix, token_type, request_id)
    }
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

/// Cache implementation that provides a uniform interface regardless of backend.
///
/// The concrete backend is chosen at runtime from configuration.
#[derive(Clone)]
pub enum Cache {
    /// In-memory cache implementation using Moka
    InMemory(memory::InMemorySessionCache),
    /// Redis-based cache implementation
    Redis(redis::RedisSessionCache),
    /// No-op cache implementation that doesn't actually cache anything
    Null(null::NullSessionCache),
}

#[async_trait::async_trait]
impl SessionCache for Cache {
    async fn get(
        &self,
        token_type: TokenType,
        signature: &str,
    ) -> Result<Option<CachedEntry>, CacheError> {
        match self {
            Self::InMemory(cache) => cache.get(token_type, signature).await,
            Self::Redis(cache) => cache.get(token_type, signature).await,
            Self::Null(cache) => cache.get(token_type, signature).await,
        }
    }

    async fn set(
        &self,
        token_type: TokenType,
        signature: &str,
        request: &StoredRequest,
        expires_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        match self {
            Self::InMemory(cache) => {
                cache
                    .set(token_type, signature, request, expires_at, ttl)
                    .await
            }
            Self::Redis(cache) => {
                cache
                    .set(token_type, signature, request, expires_at, ttl)
                    .await
            }
            Self::Null(cache) => {
                cache
                    .set(token_type, signature, request, expires_at, ttl)
                    .await
            }
        }
    }

    async fn delete(&self, token_type: TokenType, signature: &str) -> Result<(), CacheError> {
        match self {
            Self::InMemory(cache) => cache.delete(token_type, signature).await,
            Self::Redis(cache) => cache.delete(token_type, signature).await,
            Self::Null(cache) => cache.delete(token_type, signature).await,
        }
    }

    async fn delete_by_request_id(
        &self,
        token_type: TokenType,
        request_id: &str,
    ) -> Result<(), CacheError> {
        match self {
            Self::InMemory(cache) => cache.delete_by_request_id(token_type, request_id).await,
            Self::Redis(cache) => cache.delete_by_request_id(token_type, request_id).await,
            Self::Null(cache) => cache.delete_by_request_id(token_type, request_id).await,
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::InMemory(cache) => cache.health_check().await,
            Self::Redis(cache) => cache.health_check().await,
            Self::Null(cache) => cache.health_check().await,
        }
    }
}

/// Creates the session cache selected by `config`.
///
/// A Redis backend is connected and pinged before being returned, so an
/// unreachable server surfaces here rather than on the first token write.
pub async fn create_cache(config: &CacheConfig) -> Result<Cache, CacheError> {
    match config.store {
        CacheStore::InMemory => {
            let cache = memory::InMemorySessionCache::new(&config.prefix, config.memory.capacity)
                .map_err(CacheError::Config)?;
            Ok(Cache::InMemory(cache))
        }
        CacheStore::Redis => {
            if config.redis.url.is_empty() {
                return Err(CacheError::Config(
                    "Redis URL is required for Redis cache".to_string(),
                ));
            }
            let cache = redis::RedisSessionCache::new(
                &config.redis.url,
                &config.prefix,
                Duration::from_secs(config.redis.connect_timeout),
            )
            .await
            .map_err(CacheError::Config)?;
            Ok(Cache::Redis(cache))
        }
        CacheStore::None => Ok(Cache::Null(null::NullSessionCache::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::stored_request;

    #[test]
    fn test_key_scheme() {
        let keys = CacheKeys::new("user-org-service");
        assert_eq!(
            keys.signature_key(TokenType::AccessToken, "sig-1"),
            "user-org-service:access_token:sig-1"
        );
        assert_eq!(
            keys.request_key(TokenType::RefreshToken, "R1"),
            "user-org-service:req:refresh_token:R1"
        );
    }

    #[test]
    fn test_empty_prefix_falls_back_to_default() {
        let keys = CacheKeys::new("");
        assert_eq!(keys, CacheKeys::default());
        assert_eq!(keys.signature_key(TokenType::Pkce, "s"), "oauth:pkce:s");
    }

    #[tokio::test]
    async fn test_create_cache_selects_backend() {
        let config = CacheConfig {
            store: CacheStore::InMemory,
            ..Default::default()
        };
        let cache = create_cache(&config).await.unwrap();
        assert!(matches!(cache, Cache::InMemory(_)));

        let cache = create_cache(&CacheConfig::default()).await.unwrap();
        assert!(matches!(cache, Cache::Null(_)));
    }

    #[tokio::test]
    async fn test_create_redis_cache_requires_url() {
        let config = CacheConfig {
            store: CacheStore::Redis,
            ..Default::default()
        };
        let result = create_cache(&config).await;
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[tokio::test]
    async fn test_enum_dispatch_round_trip() {
        let cache = Cache::InMemory(memory::InMemorySessionCache::new("test", 16).unwrap());
        let request = stored_request("R1");
        let expires_at = Utc::now() + chrono::Duration::minutes(5);

        cache
            .set(
                TokenType::AccessToken,
                "sig-1",
                &request,
                expires_at,
                Duration::from_secs(300),
            )
            .await
            .unwrap();

        let entry = cache
            .get(TokenType::AccessToken, "sig-1")
            .await
            .unwrap()
            .expect("entry should be cached");
        assert_eq!(entry.request, request);
        assert_eq!(entry.expires_at, expires_at);

        // Same signature under another token type is a different key
        assert!(cache
            .get(TokenType::RefreshToken, "sig-1")
            .await
            .unwrap()
            .is_none());
        assert!(cache.health_check().await.is_ok());
    }
}
