use oauth_store::store::memory::InMemoryRepository;
use oauth_store::store::repository::Database;
use oauth_store::{Client, OAuthRequest, Session};

pub const HMAC_SECRET: &[u8] = b"integration-test-secret-32-bytes";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn in_memory_database() -> (InMemoryRepository, Database) {
    let repository = InMemoryRepository::new();
    let database = Database::InMemory(repository.clone());
    (repository, database)
}

/// A request from `client-123` for `openid profile`, granted `openid`, on
/// behalf of `user-1` in `org-A`.
pub fn request(request_id: &str) -> OAuthRequest {
    let mut session = Session::new("user-1").with_tenant("org-A", "user-1");
    session.granted_scopes = vec!["openid".to_string()];

    let mut request = OAuthRequest::new(Client::new("client-123"), session)
        .with_id(request_id)
        .with_requested_scopes(["openid", "profile"]);
    request.grant_scope("openid");
    request
}
