use super::record::StoredTokenRecord;
use super::repository::{
    AccountCredentials, AccountRepository, ClientRepository, RepositoryError, SessionRepository,
};
use crate::request::{Client, TokenType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct AccountRow {
    email: String,
    credentials: AccountCredentials,
    created_at: DateTime<Utc>,
    deleted: bool,
    last_login_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct State {
    sessions: HashMap<String, StoredTokenRecord>,
    accounts: Vec<AccountRow>,
    clients: HashMap<String, Client>,
}

/// Durable store held in process memory, with the same row semantics as the
/// Postgres backend. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_account(
        &self,
        email: &str,
        credentials: AccountCredentials,
        created_at: DateTime<Utc>,
    ) {
        self.state.write().await.accounts.push(AccountRow {
            email: email.to_string(),
            credentials,
            created_at,
            deleted: false,
            last_login_at: None,
        });
    }

    /// Soft-deletes every account registered under `user_id`.
    pub async fn delete_account(&self, user_id: &str) {
        let mut state = self.state.write().await;
        for account in state
            .accounts
            .iter_mut()
            .filter(|account| account.credentials.user_id == user_id)
        {
            account.deleted = true;
        }
    }

    pub async fn register_client(&self, client: Client) {
        self.state
            .write()
            .await
            .clients
            .insert(client.id.clone(), client);
    }

    /// The raw row for `signature`, including inactive ones.
    pub async fn session_record(&self, signature: &str) -> Option<StoredTokenRecord> {
        self.state.read().await.sessions.get(signature).cloned()
    }

    pub async fn last_login(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .await
            .accounts
            .iter()
            .find(|account| account.credentials.user_id == user_id)
            .and_then(|account| account.last_login_at)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn upsert_session(&self, record: &StoredTokenRecord) -> Result<(), RepositoryError> {
        let mut record = record.clone();
        record.active = true;
        self.state
            .write()
            .await
            .sessions
            .insert(record.signature.clone(), record);
        Ok(())
    }

    async fn find_session(
        &self,
        signature: &str,
    ) -> Result<Option<StoredTokenRecord>, RepositoryError> {
        Ok(self.session_record(signature).await)
    }

    async fn deactivate_signature(
        &self,
        token_type: TokenType,
        signature: &str,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(record) = state.sessions.get_mut(signature) {
            if record.token_type == token_type {
                record.active = false;
            }
        }
        Ok(())
    }

    async fn deactivate_request(
        &self,
        token_type: Option<TokenType>,
        request_id: &str,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let mut touched = 0;
        for record in state.sessions.values_mut().filter(|record| {
            record.request_id == request_id
                && token_type.map_or(true, |token_type| record.token_type == token_type)
        }) {
            record.active = false;
            touched += 1;
        }
        Ok(touched)
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for InMemoryRepository {
    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AccountCredentials>, RepositoryError> {
        let email = email.to_lowercase();
        Ok(self
            .state
            .read()
            .await
            .accounts
            .iter()
            .filter(|account| !account.deleted && account.email.to_lowercase() == email)
            .min_by_key(|account| account.created_at)
            .map(|account| account.credentials.clone()))
    }

    async fn touch_last_login(&self, user_id: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        for account in state
            .accounts
            .iter_mut()
            .filter(|account| !account.deleted && account.credentials.user_id == user_id)
        {
            account.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl ClientRepository for InMemoryRepository {
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>, RepositoryError> {
        Ok(self.state.read().await.clients.get(client_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{account, stored_request};
    use chrono::Duration;

    #[tokio::test]
    async fn test_upsert_reactivates_row() {
        let repository = InMemoryRepository::new();
        let record =
            StoredTokenRecord::new("sig", TokenType::AccessToken, &stored_request("R1"), None);

        repository.upsert_session(&record).await.unwrap();
        repository
            .deactivate_signature(TokenType::AccessToken, "sig")
            .await
            .unwrap();
        assert!(!repository.session_record("sig").await.unwrap().active);

        repository.upsert_session(&record).await.unwrap();
        assert!(repository.session_record("sig").await.unwrap().active);
    }

    #[tokio::test]
    async fn test_deactivate_signature_checks_token_type() {
        let repository = InMemoryRepository::new();
        let record =
            StoredTokenRecord::new("sig", TokenType::AccessToken, &stored_request("R1"), None);
        repository.upsert_session(&record).await.unwrap();

        repository
            .deactivate_signature(TokenType::RefreshToken, "sig")
            .await
            .unwrap();
        assert!(repository.session_record("sig").await.unwrap().active);
    }

    #[tokio::test]
    async fn test_account_lookup_is_case_insensitive_and_oldest_first() {
        let repository = InMemoryRepository::new();
        let now = Utc::now();
        repository
            .insert_account("Ada@Example.com", account("newer", "hash"), now)
            .await;
        repository
            .insert_account(
                "ada@example.com",
                account("older", "hash"),
                now - Duration::days(1),
            )
            .await;

        let found = repository
            .find_account_by_email("ADA@example.COM")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.user_id, "older");

        repository.delete_account("older").await;
        let found = repository
            .find_account_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.user_id, "newer");
    }

    #[tokio::test]
    async fn test_touch_last_login() {
        let repository = InMemoryRepository::new();
        repository
            .insert_account("ada@example.com", account("user-1", "hash"), Utc::now())
            .await;
        assert!(repository.last_login("user-1").await.is_none());

        repository.touch_last_login("user-1").await.unwrap();
        assert!(repository.last_login("user-1").await.is_some());
    }

    #[tokio::test]
    async fn test_registered_clients() {
        let repository = InMemoryRepository::new();
        repository.register_client(Client::new("dynamic")).await;

        assert!(repository.find_client("dynamic").await.unwrap().is_some());
        assert!(repository.find_client("unknown").await.unwrap().is_none());
    }
}
