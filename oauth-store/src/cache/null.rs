use super::{CachedEntry, CacheError, SessionCache};
use crate::request::TokenType;
use crate::store::record::StoredRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// NullSessionCache is a cache implementation that does nothing.
/// With it in place every read goes to the durable store.
#[derive(Clone, Debug)]
pub struct NullSessionCache;

impl NullSessionCache {
    /// Create a new NullSessionCache instance
    pub fn new() -> Self {
        NullSessionCache
    }
}

impl Default for NullSessionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionCache for NullSessionCache {
    async fn get(
        &self,
        _token_type: TokenType,
        _signature: &str,
    ) -> Result<Option<CachedEntry>, CacheError> {
        Ok(None)
    }

    async fn set(
        &self,
        _token_type: TokenType,
        _signature: &str,
        _request: &StoredRequest,
        _expires_at: DateTime<Utc>,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _token_type: TokenType, _signature: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete_by_request_id(
        &self,
        _token_type: TokenType,
        _request_id: &str,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::stored_request;

    #[tokio::test]
    async fn test_null_cache_operations() {
        let cache = NullSessionCache::new();
        let request = stored_request("R1");

        // Test set (should do nothing)
        assert!(cache
            .set(
                TokenType::AccessToken,
                "sig",
                &request,
                Utc::now(),
                Duration::from_secs(60)
            )
            .await
            .is_ok());

        // Test get (should always return None)
        let result = cache.get(TokenType::AccessToken, "sig").await.unwrap();
        assert!(result.is_none());

        assert!(cache.delete(TokenType::AccessToken, "sig").await.is_ok());
        assert!(cache
            .delete_by_request_id(TokenType::AccessToken, "R1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_health_check() {
        let cache = NullSessionCache::new();
        let result = cache.health_check().await;
        assert!(result.is_ok(), "health check failed: {:?}", result);
    }
}
