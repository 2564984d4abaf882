pub use crate::config::cache::{CacheConfig, CacheStore};
pub use crate::config::database::{DatabaseConfig, DatabaseStore};
pub use crate::config::oauth::{OAuthConfig, StaticClient};
use confique::Config;
use std::path::Path;

pub mod cache;
pub mod database;
pub mod oauth;

/// Top-level settings for the token engine.
///
/// Values are layered: environment variables override the optional TOML
/// file, which overrides the built-in defaults.
#[derive(Debug, Config, Clone)]
pub struct Settings {
    /// Durable store configuration
    #[config(nested)]
    pub database: DatabaseConfig,

    /// Session cache configuration
    #[config(nested)]
    pub cache: CacheConfig,

    /// Provider and client configuration
    #[config(nested)]
    pub oauth: OAuthConfig,
}

impl Settings {
    /// Loads settings from the environment, then from `path` if one is given.
    pub fn load(path: Option<&Path>) -> Result<Self, confique::Error> {
        let mut builder = Self::builder().env();
        if let Some(path) = path {
            builder = builder.file(path);
        }
        builder.load()
    }
}
