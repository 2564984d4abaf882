use log::{error, info, warn};
use oauth_store::cache::{create_cache, SessionCache};
use oauth_store::config::Settings;
use oauth_store::store::repository::create_database;
use oauth_store::{compose, OAuthStorage, ProviderDependencies};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Optional TOML file as the first argument; environment variables still win
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = match Settings::load(config_path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let database = match create_database(&settings.database).await {
        Ok(database) => database,
        Err(e) => {
            error!("Failed to open durable store: {}", e);
            std::process::exit(1);
        }
    };

    // The cache is an accelerator; the engine is correct without it
    let cache: Option<Arc<dyn SessionCache>> = match create_cache(&settings.cache).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!("Session cache unavailable, continuing without it: {}", e);
            None
        }
    };

    let provider = match compose(ProviderDependencies {
        database: Some(database),
        session_cache: cache.clone(),
        config: Some(settings.oauth.provider_config()),
        static_clients: settings.oauth.clients(),
        ..Default::default()
    }) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to compose provider: {}", e);
            std::process::exit(1);
        }
    };

    let mut healthy = true;
    match provider.storage().health_check().await {
        Ok(()) => info!("Durable store is healthy"),
        Err(e) => {
            error!("Durable store is unhealthy: {}", e);
            healthy = false;
        }
    }
    if let Some(cache) = cache {
        match cache.health_check().await {
            Ok(()) => info!("Session cache is healthy"),
            Err(e) => {
                error!("Session cache is unhealthy: {}", e);
                healthy = false;
            }
        }
    }

    if !healthy {
        std::process::exit(1);
    }
    info!(
        "Provider ready with {} handler(s)",
        provider.handlers().len()
    );
}
