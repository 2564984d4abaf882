use crate::cache::CacheError;
use crate::password::PasswordError;
use crate::store::repository::RepositoryError;
use thiserror::Error;

/// Outcomes of storage contract operations.
///
/// `NotFound` deliberately covers every credential and token miss (absent,
/// expired, inactive, wrong type, bad password, locked account) so callers
/// cannot tell those cases apart.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("durable store error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("session cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("password verification error: {0}")]
    PasswordVerification(#[from] PasswordError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    pub(crate) fn precondition<S: ToString>(detail: S) -> Self {
        StoreError::Precondition(detail.to_string())
    }
}

/// Errors raised while composing a provider. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("hmac secret must be at least {required} bytes, got {actual}")]
    SecretTooShort { required: usize, actual: usize },
    #[error("either a storage implementation or a database handle must be supplied")]
    MissingStorage,
    #[error("static client #{0} is missing an id")]
    StaticClientMissingId(usize),
    #[error("failed to hash secret for client {client_id}: {source}")]
    ClientSecretHash {
        client_id: String,
        #[source]
        source: PasswordError,
    },
}
