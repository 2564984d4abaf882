//! Durable store contracts and backend selection.

use crate::config::{DatabaseConfig, DatabaseStore};
use crate::request::{Client, TokenType};
use crate::store::memory::InMemoryRepository;
use crate::store::postgres::PostgresRepository;
use crate::store::record::StoredTokenRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("failed to decode column {column}: {reason}")]
    Decode { column: &'static str, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
}

/// The account columns password authentication needs.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountCredentials {
    pub user_id: String,
    pub status: String,
    pub password_hash: String,
    pub lockout_until: Option<DateTime<Utc>>,
}

impl AccountCredentials {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lockout_until.is_some_and(|until| until > now)
    }

    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// Token rows keyed by signature.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Inserts the record or, on a signature conflict, replaces it and marks it active again.
    async fn upsert_session(&self, record: &StoredTokenRecord) -> Result<(), RepositoryError>;

    async fn find_session(
        &self,
        signature: &str,
    ) -> Result<Option<StoredTokenRecord>, RepositoryError>;

    async fn deactivate_signature(
        &self,
        token_type: TokenType,
        signature: &str,
    ) -> Result<(), RepositoryError>;

    /// Deactivates rows issued under `request_id`, limited to one token type
    /// when given. Returns the number of rows touched.
    async fn deactivate_request(
        &self,
        token_type: Option<TokenType>,
        request_id: &str,
    ) -> Result<u64, RepositoryError>;

    async fn health_check(&self) -> Result<(), String>;
}

/// Read access to resource-owner accounts.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Oldest non-deleted account whose email matches case-insensitively.
    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AccountCredentials>, RepositoryError>;

    async fn touch_last_login(&self, user_id: &str) -> Result<(), RepositoryError>;
}

/// Dynamically registered clients.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>, RepositoryError>;
}

/// Durable store handle, dispatching to the configured backend.
#[derive(Clone)]
pub enum Database {
    Postgres(PostgresRepository),
    InMemory(InMemoryRepository),
}

#[async_trait]
impl SessionRepository for Database {
    async fn upsert_session(&self, record: &StoredTokenRecord) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(db) => db.upsert_session(record).await,
            Self::InMemory(db) => db.upsert_session(record).await,
        }
    }

    async fn find_session(
        &self,
        signature: &str,
    ) -> Result<Option<StoredTokenRecord>, RepositoryError> {
        match self {
            Self::Postgres(db) => db.find_session(signature).await,
            Self::InMemory(db) => db.find_session(signature).await,
        }
    }

    async fn deactivate_signature(
        &self,
        token_type: TokenType,
        signature: &str,
    ) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(db) => db.deactivate_signature(token_type, signature).await,
            Self::InMemory(db) => db.deactivate_signature(token_type, signature).await,
        }
    }

    async fn deactivate_request(
        &self,
        token_type: Option<TokenType>,
        request_id: &str,
    ) -> Result<u64, RepositoryError> {
        match self {
            Self::Postgres(db) => db.deactivate_request(token_type, request_id).await,
            Self::InMemory(db) => db.deactivate_request(token_type, request_id).await,
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::Postgres(db) => db.health_check().await,
            Self::InMemory(db) => db.health_check().await,
        }
    }
}

#[async_trait]
impl AccountRepository for Database {
    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AccountCredentials>, RepositoryError> {
        match self {
            Self::Postgres(db) => db.find_account_by_email(email).await,
            Self::InMemory(db) => db.find_account_by_email(email).await,
        }
    }

    async fn touch_last_login(&self, user_id: &str) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(db) => db.touch_last_login(user_id).await,
            Self::InMemory(db) => db.touch_last_login(user_id).await,
        }
    }
}

#[async_trait]
impl ClientRepository for Database {
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>, RepositoryError> {
        match self {
            Self::Postgres(db) => db.find_client(client_id).await,
            Self::InMemory(db) => db.find_client(client_id).await,
        }
    }
}

/// Opens the durable store selected by `config`, applying migrations when asked to.
pub async fn create_database(config: &DatabaseConfig) -> Result<Database, RepositoryError> {
    match config.store {
        DatabaseStore::Postgres => {
            if config.url.is_empty() {
                return Err(RepositoryError::Config(
                    "Database URL is required for the postgres store".to_string(),
                ));
            }
            let repository = PostgresRepository::connect(config).await?;
            if config.run_migrations {
                repository.migrate().await?;
            }
            Ok(Database::Postgres(repository))
        }
        DatabaseStore::InMemory => Ok(Database::InMemory(InMemoryRepository::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account(status: &str, lockout_until: Option<DateTime<Utc>>) -> AccountCredentials {
        AccountCredentials {
            user_id: "user-1".to_string(),
            status: status.to_string(),
            password_hash: String::new(),
            lockout_until,
        }
    }

    #[test]
    fn test_lockout_is_time_boxed() {
        let now = Utc::now();
        assert!(account("active", Some(now + Duration::minutes(5))).is_locked(now));
        assert!(!account("active", Some(now - Duration::minutes(5))).is_locked(now));
        assert!(!account("active", None).is_locked(now));
    }

    #[test]
    fn test_status_comparison_ignores_case() {
        assert!(account("ACTIVE", None).is_active());
        assert!(!account("suspended", None).is_active());
    }

    #[tokio::test]
    async fn test_create_database() {
        let config = DatabaseConfig {
            store: DatabaseStore::InMemory,
            ..Default::default()
        };
        let database = create_database(&config).await.unwrap();
        assert!(matches!(database, Database::InMemory(_)));
        assert!(database.health_check().await.is_ok());

        let missing_url = create_database(&DatabaseConfig::default()).await;
        assert!(matches!(missing_url, Err(RepositoryError::Config(_))));
    }
}
