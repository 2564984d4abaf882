use confique::Config;
use serde::Deserialize;

/// Durable store backend
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseStore {
    #[default]
    Postgres,
    /// Process-local maps, for tests and local development
    InMemory,
}

/// Durable store configuration
#[derive(Debug, Config, Clone)]
pub struct DatabaseConfig {
    /// Store type: "postgres" (default) or "in-memory"
    #[config(env = "OAUTH_DATABASE_STORE", default = "postgres")]
    pub store: DatabaseStore,

    /// Postgres connection string, required for the postgres store
    #[config(env = "OAUTH_DATABASE_URL", default = "")]
    pub url: String,

    /// Maximum pooled connections (default: 10)
    #[config(env = "OAUTH_DATABASE_MAX_CONNECTIONS", default = 10)]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection (default: 5)
    #[config(env = "OAUTH_DATABASE_ACQUIRE_TIMEOUT", default = 5)]
    pub acquire_timeout: u64,

    /// Apply bundled schema migrations at startup (default: false)
    #[config(env = "OAUTH_DATABASE_RUN_MIGRATIONS", default = false)]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            store: DatabaseStore::Postgres,
            url: String::new(),
            max_connections: 10,
            acquire_timeout: 5,
            run_migrations: false,
        }
    }
}
