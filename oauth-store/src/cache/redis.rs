use super::{CacheError, CacheKeys, CachedEntry, SessionCache};
use crate::request::TokenType;
use crate::store::record::StoredRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::error;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::time::Duration;

#[derive(Clone)]
pub struct RedisSessionCache {
    _client: Client,
    conn_manager: ConnectionManager,
    keys: CacheKeys,
}

impl RedisSessionCache {
    /// Connects to Redis and verifies the connection with a `PING` bounded by `connect_timeout`.
    pub async fn new(
        redis_url: &str,
        prefix: &str,
        connect_timeout: Duration,
    ) -> Result<Self, String> {
        let client = match Client::open(redis_url) {
            Ok(client) => client,
            Err(err) => {
                return Err(format!("Failed to connect to Redis: {}", err));
            }
        };

        let conn_manager =
            match tokio::time::timeout(connect_timeout, ConnectionManager::new(client.clone()))
                .await
            {
                Ok(Ok(manager)) => manager,
                Ok(Err(err)) => {
                    return Err(format!(
                        "Failed to create Redis connection manager: {}",
                        err
                    ));
                }
                Err(_) => {
                    return Err(format!(
                        "Timed out connecting to Redis after {:?}",
                        connect_timeout
                    ));
                }
            };

        let mut conn = conn_manager.clone();
        match tokio::time::timeout(
            connect_timeout,
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => return Err(format!("Failed to ping Redis: {}", err)),
            Err(_) => return Err("Timed out pinging Redis".to_string()),
        }

        Ok(Self {
            _client: client,
            conn_manager,
            keys: CacheKeys::new(prefix),
        })
    }
}

/// Redis rejects a zero expiry, so sub-millisecond lifetimes are rounded up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn get(
        &self,
        token_type: TokenType,
        signature: &str,
    ) -> Result<Option<CachedEntry>, CacheError> {
        let key = self.keys.signature_key(token_type, signature);
        let mut conn = self.conn_manager.clone();

        let result: Option<String> = match conn.get(&key).await {
            Ok(value) => value,
            Err(err) => {
                error!("Redis error while getting key {}: {}", key, err);
                return Err(CacheError::Redis(err.to_string()));
            }
        };

        if let Some(value) = result {
            serde_json::from_str(&value)
                .map_err(|e| CacheError::Deserialization(e.to_string()))
                .map(Some)
        } else {
            Ok(None)
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
        let entry = CachedEntry {
            request: request.clone(),
            expires_at,
        };
        let payload = serde_json::to_string(&entry)?;
        let signature_key = self.keys.signature_key(token_type, signature);
        let request_key = self.keys.request_key(token_type, &request.request_id);
        let millis = ttl_millis(ttl);
        let mut conn = self.conn_manager.clone();

        // NX sets the first deadline, GT only ever extends it (Redis 7+)
        let result = redis::pipe()
            .atomic()
            .pset_ex(&signature_key, payload, millis)
            .ignore()
            .sadd(&request_key, signature)
            .ignore()
            .cmd("PEXPIRE")
            .arg(&request_key)
            .arg(millis)
            .arg("NX")
            .ignore()
            .cmd("PEXPIRE")
            .arg(&request_key)
            .arg(millis)
            .arg("GT")
            .ignore()
            .query_async::<()>(&mut conn)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("Redis error while setting key {}: {}", signature_key, err);
                Err(CacheError::Redis(err.to_string()))
            }
        }
    }

    async fn delete(&self, token_type: TokenType, signature: &str) -> Result<(), CacheError> {
        let signature_key = self.keys.signature_key(token_type, signature);
        let mut conn = self.conn_manager.clone();

        let existing: Option<String> = conn.get(&signature_key).await.map_err(|err| {
            error!("Redis error while reading key {}: {}", signature_key, err);
            CacheError::Redis(err.to_string())
        })?;
        let request_id = existing
            .and_then(|value| serde_json::from_str::<CachedEntry>(&value).ok())
            .map(|entry| entry.request.request_id);

        let mut pipe = redis::pipe();
        pipe.atomic().del(&signature_key).ignore();
        if let Some(request_id) = request_id {
            pipe.srem(self.keys.request_key(token_type, &request_id), signature)
                .ignore();
        }

        match pipe.query_async::<()>(&mut conn).await {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("Redis error while deleting key {}: {}", signature_key, err);
                Err(CacheError::Redis(err.to_string()))
            }
        }
    }

    async fn delete_by_request_id(
        &self,
        token_type: TokenType,
        request_id: &str,
    ) -> Result<(), CacheError> {
        let request_key = self.keys.request_key(token_type, request_id);
        let mut conn = self.conn_manager.clone();

        let members: Vec<String> = conn.smembers(&request_key).await.map_err(|err| {
            error!("Redis error while reading set {}: {}", request_key, err);
            CacheError::Redis(err.to_string())
        })?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for signature in &members {
            pipe.del(self.keys.signature_key(token_type, signature))
                .ignore();
        }
        pipe.del(&request_key).ignore();

        match pipe.query_async::<()>(&mut conn).await {
            Ok(()) => Ok(()),
            Err(err) => {
                error!(
                    "Redis error while evicting request {}: {}",
                    request_key, err
                );
                Err(CacheError::Redis(err.to_string()))
            }
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        let mut conn = self.conn_manager.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("Redis health check failed: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::stored_request;
    use redis_test::server::RedisServer;

    fn get_redis_url(server: &RedisServer) -> String {
        match &server.addr {
            redis::ConnectionAddr::Tcp(host, port) => {
                format!("redis://{}:{}/", host, port)
            }
            _ => "redis://127.0.0.1:6379/".to_string(),
        }
    }

    #[test]
    fn test_ttl_is_never_zero() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_cache_operations() {
        let server = RedisServer::new();
        let cache = RedisSessionCache::new(&get_redis_url(&server), "test", Duration::from_secs(2))
            .await
            .unwrap();
        let request = stored_request("R1");
        let expires_at = Utc::now() + chrono::Duration::seconds(1);

        cache
            .set(
                TokenType::AccessToken,
                "sig-1",
                &request,
                expires_at,
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        let entry = cache
            .get(TokenType::AccessToken, "sig-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.request, request);

        // Test expiration
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(cache
            .get(TokenType::AccessToken, "sig-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_reverse_index() {
        let server = RedisServer::new();
        let cache = RedisSessionCache::new(&get_redis_url(&server), "test", Duration::from_secs(2))
            .await
            .unwrap();
        let request = stored_request("R1");
        let expires_at = Utc::now() + chrono::Duration::minutes(1);
        let ttl = Duration::from_secs(60);

        for signature in ["a", "b", "c"] {
            cache
                .set(TokenType::RefreshToken, signature, &request, expires_at, ttl)
                .await
                .unwrap();
        }

        cache.delete(TokenType::RefreshToken, "a").await.unwrap();
        let mut conn = cache.conn_manager.clone();
        let mut members: Vec<String> = conn
            .smembers(cache.keys.request_key(TokenType::RefreshToken, "R1"))
            .await
            .unwrap();
        members.sort();
        assert_eq!(members, vec!["b", "c"]);

        cache
            .delete_by_request_id(TokenType::RefreshToken, "R1")
            .await
            .unwrap();
        for signature in ["b", "c"] {
            assert!(cache
                .get(TokenType::RefreshToken, signature)
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_reverse_index_ttl_only_grows() {
        let server = RedisServer::new();
        let cache = RedisSessionCache::new(&get_redis_url(&server), "test", Duration::from_secs(2))
            .await
            .unwrap();
        let request = stored_request("R1");

        cache
            .set(
                TokenType::RefreshToken,
                "long-lived",
                &request,
                Utc::now() + chrono::Duration::minutes(1),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        cache
            .set(
                TokenType::RefreshToken,
                "short-lived",
                &request,
                Utc::now() + chrono::Duration::seconds(1),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        let mut conn = cache.conn_manager.clone();
        let remaining: i64 = conn
            .pttl(cache.keys.request_key(TokenType::RefreshToken, "R1"))
            .await
            .unwrap();
        assert!(remaining > 30_000, "index ttl shrank to {remaining} ms");
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_health_check() {
        let server = RedisServer::new();
        let cache = RedisSessionCache::new(&get_redis_url(&server), "test", Duration::from_secs(2))
            .await
            .unwrap();

        let result = cache.health_check().await;

        assert!(result.is_ok(), "health check failed: {:?}", result);
    }
}
