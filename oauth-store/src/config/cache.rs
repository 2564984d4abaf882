use confique::Config;
use serde::Deserialize;

/// Specifies which cache store implementation to use
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStore {
    InMemory,
    Redis,
    #[serde(other)]
    #[default]
    None,
}

/// Configuration for the session cache
#[derive(Debug, Config, Clone)]
pub struct CacheConfig {
    /// Cache store type: "in-memory", "redis", or "none" (default)
    #[config(env = "OAUTH_CACHE_STORE", default = "none")]
    pub store: CacheStore,

    /// Key prefix shared by every cache entry (default: oauth)
    #[config(env = "OAUTH_CACHE_PREFIX", default = "oauth")]
    pub prefix: String,

    /// In-memory cache specific configuration
    #[config(nested)]
    pub memory: InMemoryConfig,

    /// Redis cache specific configuration
    #[config(nested)]
    pub redis: RedisConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store: CacheStore::None,
            prefix: "oauth".to_string(),
            memory: InMemoryConfig::default(),
            redis: RedisConfig::default(),
        }
    }
}

/// In-memory cache configuration options
#[derive(Debug, Config, Clone)]
pub struct InMemoryConfig {
    /// Maximum capacity in MiB (default: 128 MiB)
    #[config(env = "OAUTH_CACHE_MEMORY_CAPACITY", default = 128)]
    pub capacity: usize,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self { capacity: 128 }
    }
}

/// Redis cache configuration options
#[derive(Debug, Config, Clone)]
pub struct RedisConfig {
    /// Redis connection string
    #[config(env = "OAUTH_CACHE_REDIS_URL", default = "")]
    pub url: String,

    /// Connect and ping timeout in seconds (default: 2)
    #[config(env = "OAUTH_CACHE_REDIS_CONNECT_TIMEOUT", default = 2)]
    pub connect_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_config() {
        let config = CacheConfig::default();
        assert_eq!(config.store, CacheStore::None);
        assert_eq!(config.prefix, "oauth");
        assert_eq!(config.memory.capacity, 128);
        assert_eq!(config.redis.url, "");
        assert_eq!(config.redis.connect_timeout, 2);
    }

    #[test]
    fn test_unknown_store_falls_back_to_none() {
        let store: CacheStore = serde_json::from_str("\"memcached\"").unwrap();
        assert_eq!(store, CacheStore::None);
        let store: CacheStore = serde_json::from_str("\"in-memory\"").unwrap();
        assert_eq!(store, CacheStore::InMemory);
    }
}
