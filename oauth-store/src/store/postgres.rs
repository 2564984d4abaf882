use super::record::StoredTokenRecord;
use super::repository::{
    AccountCredentials, AccountRepository, ClientRepository, RepositoryError, SessionRepository,
};
use crate::config::DatabaseConfig;
use crate::request::{Client, Form, TokenType};
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;

const UPSERT_SESSION: &str = r#"
    INSERT INTO oauth_sessions (
        signature, token_type, request_id, client_id, subject, organization_id, user_id,
        scopes, granted_scopes, audience, granted_audience, form_data, session_data,
        requested_at, expires_at, active
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, TRUE)
    ON CONFLICT (signature) DO UPDATE SET
        token_type = EXCLUDED.token_type,
        request_id = EXCLUDED.request_id,
        client_id = EXCLUDED.client_id,
        subject = EXCLUDED.subject,
        organization_id = EXCLUDED.organization_id,
        user_id = EXCLUDED.user_id,
        scopes = EXCLUDED.scopes,
        granted_scopes = EXCLUDED.granted_scopes,
        audience = EXCLUDED.audience,
        granted_audience = EXCLUDED.granted_audience,
        form_data = EXCLUDED.form_data,
        session_data = EXCLUDED.session_data,
        requested_at = EXCLUDED.requested_at,
        expires_at = EXCLUDED.expires_at,
        active = TRUE
"#;

const SELECT_SESSION: &str = r#"
    SELECT signature, token_type, request_id, client_id, subject, organization_id, user_id,
           scopes, granted_scopes, audience, granted_audience, form_data, session_data,
           requested_at, expires_at, active
    FROM oauth_sessions
    WHERE signature = $1
"#;

const SELECT_ACCOUNT: &str = r#"
    SELECT user_id::text AS user_id, status, password_hash, lockout_until
    FROM users
    WHERE LOWER(email) = LOWER($1) AND deleted_at IS NULL
    ORDER BY created_at ASC
    LIMIT 1
"#;

const SELECT_CLIENT: &str = r#"
    SELECT client_id, secret_hash, redirect_uris, grant_types, response_types, scopes,
           audience, public
    FROM oauth_clients
    WHERE client_id = $1 AND disabled_at IS NULL
"#;

/// Postgres-backed durable store.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Reads a nullable JSONB column, treating NULL as the type's default.
fn json_column<T: DeserializeOwned + Default>(
    row: &PgRow,
    column: &'static str,
) -> Result<T, RepositoryError> {
    let value: Option<Json<T>> = row.try_get(column)?;
    Ok(value.map(|Json(inner)| inner).unwrap_or_default())
}

fn row_to_record(row: &PgRow) -> Result<StoredTokenRecord, RepositoryError> {
    let token_type: String = row.try_get("token_type")?;
    let token_type = token_type
        .parse::<TokenType>()
        .map_err(|reason| RepositoryError::Decode {
            column: "token_type",
            reason,
        })?;

    Ok(StoredTokenRecord {
        signature: row.try_get("signature")?,
        token_type,
        request_id: row.try_get("request_id")?,
        client_id: row.try_get("client_id")?,
        subject: row.try_get("subject")?,
        organization_id: row.try_get("organization_id")?,
        user_id: row.try_get("user_id")?,
        requested_scope: json_column(row, "scopes")?,
        granted_scope: json_column(row, "granted_scopes")?,
        requested_audience: json_column(row, "audience")?,
        granted_audience: json_column(row, "granted_audience")?,
        form_data: json_column::<Form>(row, "form_data")?,
        session_data: json_column::<Session>(row, "session_data")?,
        requested_at: row.try_get("requested_at")?,
        expires_at: row.try_get::<Option<DateTime<Utc>>, _>("expires_at")?,
        active: row.try_get("active")?,
    })
}

#[async_trait]
impl SessionRepository for PostgresRepository {
    async fn upsert_session(&self, record: &StoredTokenRecord) -> Result<(), RepositoryError> {
        sqlx::query(UPSERT_SESSION)
            .bind(&record.signature)
            .bind(record.token_type.as_str())
            .bind(&record.request_id)
            .bind(&record.client_id)
            .bind(record.subject.as_deref())
            .bind(record.organization_id.as_deref())
            .bind(record.user_id.as_deref())
            .bind(Json(&record.requested_scope))
            .bind(Json(&record.granted_scope))
            .bind(Json(&record.requested_audience))
            .bind(Json(&record.granted_audience))
            .bind(Json(&record.form_data))
            .bind(Json(&record.session_data))
            .bind(record.requested_at)
            .bind(record.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session(
        &self,
        signature: &str,
    ) -> Result<Option<StoredTokenRecord>, RepositoryError> {
        let row = sqlx::query(SELECT_SESSION)
            .bind(signature)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn deactivate_signature(
        &self,
        token_type: TokenType,
        signature: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE oauth_sessions SET active = FALSE WHERE signature = $1 AND token_type = $2",
        )
        .bind(signature)
        .bind(token_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate_request(
        &self,
        token_type: Option<TokenType>,
        request_id: &str,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE oauth_sessions SET active = FALSE \
             WHERE request_id = $1 AND ($2::text IS NULL OR token_type = $2)",
        )
        .bind(request_id)
        .bind(token_type.map(|token_type| token_type.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), String> {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("Postgres health check failed: {}", err)),
        }
    }
}

#[async_trait]
impl AccountRepository for PostgresRepository {
    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AccountCredentials>, RepositoryError> {
        let row = sqlx::query(SELECT_ACCOUNT)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(AccountCredentials {
            user_id: row.try_get("user_id")?,
            status: row.try_get("status")?,
            password_hash: row
                .try_get::<Option<String>, _>("password_hash")?
                .unwrap_or_default(),
            lockout_until: row.try_get("lockout_until")?,
        }))
    }

    async fn touch_last_login(&self, user_id: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE users SET last_login_at = now(), version = version + 1 \
             WHERE user_id = $1::uuid AND deleted_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ClientRepository for PostgresRepository {
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query(SELECT_CLIENT)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Client {
            id: row.try_get("client_id")?,
            secret_hash: row.try_get("secret_hash")?,
            redirect_uris: json_column(&row, "redirect_uris")?,
            grant_types: json_column(&row, "grant_types")?,
            response_types: json_column(&row, "response_types")?,
            scopes: json_column(&row, "scopes")?,
            audience: json_column(&row, "audience")?,
            public: row.try_get("public")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::stored_request;

    // Requires a reachable Postgres with the bundled migrations applied;
    // set OAUTH_TEST_DATABASE_URL to run.
    async fn test_repository() -> PostgresRepository {
        let config = DatabaseConfig {
            url: std::env::var("OAUTH_TEST_DATABASE_URL")
                .expect("OAUTH_TEST_DATABASE_URL must be set"),
            ..Default::default()
        };
        let repository = PostgresRepository::connect(&config).await.unwrap();
        repository.migrate().await.unwrap();
        repository
    }

    #[tokio::test]
    #[ignore]
    async fn test_upsert_and_find_session() {
        let repository = test_repository().await;
        let signature = format!("pg-test-{}", uuid::Uuid::new_v4());
        let stored = stored_request(&uuid::Uuid::new_v4().to_string());
        let record = StoredTokenRecord::new(&signature, TokenType::AccessToken, &stored, None);

        repository.upsert_session(&record).await.unwrap();
        let found = repository.find_session(&signature).await.unwrap().unwrap();
        assert_eq!(found.organization_id.as_deref(), Some("org-A"));
        assert_eq!(found.granted_scope, record.granted_scope);
        assert!(found.expires_at.is_none());

        repository
            .deactivate_signature(TokenType::AccessToken, &signature)
            .await
            .unwrap();
        assert!(!repository.find_session(&signature).await.unwrap().unwrap().active);

        // Re-issuing the same signature reactivates it
        repository.upsert_session(&record).await.unwrap();
        assert!(repository.find_session(&signature).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    #[ignore]
    async fn test_deactivate_request() {
        let repository = test_repository().await;
        let request_id = uuid::Uuid::new_v4().to_string();
        let stored = stored_request(&request_id);

        for (signature, token_type) in [
            (format!("{request_id}-at"), TokenType::AccessToken),
            (format!("{request_id}-rt"), TokenType::RefreshToken),
        ] {
            let record = StoredTokenRecord::new(&signature, token_type, &stored, None);
            repository.upsert_session(&record).await.unwrap();
        }

        let touched = repository
            .deactivate_request(Some(TokenType::RefreshToken), &request_id)
            .await
            .unwrap();
        assert_eq!(touched, 1);
        let touched = repository
            .deactivate_request(None, &request_id)
            .await
            .unwrap();
        assert_eq!(touched, 2);
    }

    #[tokio::test]
    #[ignore]
    async fn test_postgres_health_check() {
        let repository = test_repository().await;
        let result = repository.health_check().await;
        assert!(result.is_ok(), "health check failed: {:?}", result);
    }
}
