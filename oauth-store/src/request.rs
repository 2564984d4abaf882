//! Protocol-level request, client and token-type types shared by every component.

use crate::session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Request parameters, one key to many values.
pub type Form = BTreeMap<String, Vec<String>>;

/// Form parameters that carry credentials and are never persisted.
const CREDENTIAL_PARAMETERS: [&str; 3] = ["password", "client_secret", "client_assertion"];

/// The four token artifacts issued during a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    AuthorizeCode,
    AccessToken,
    RefreshToken,
    Pkce,
}

impl TokenType {
    pub const ALL: [TokenType; 4] = [
        TokenType::AuthorizeCode,
        TokenType::AccessToken,
        TokenType::RefreshToken,
        TokenType::Pkce,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::AuthorizeCode => "authorize_code",
            TokenType::AccessToken => "access_token",
            TokenType::RefreshToken => "refresh_token",
            TokenType::Pkce => "pkce",
        }
    }

    /// The session expiry slot consulted for this token type.
    ///
    /// A PKCE verifier lives exactly as long as its authorization code, so it
    /// shares the code's slot.
    pub fn expiry_slot(&self) -> TokenType {
        match self {
            TokenType::Pkce => TokenType::AuthorizeCode,
            other => *other,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TokenType::ALL
            .into_iter()
            .find(|token_type| token_type.as_str() == value)
            .ok_or_else(|| format!("unknown token type '{value}'"))
    }
}

/// A registered OAuth client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    /// Hashed client secret; `None` for public clients.
    #[serde(default)]
    pub secret_hash: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default)]
    pub public: bool,
}

impl Client {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// One logical OAuth2 exchange as seen by the storage contract.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthRequest {
    /// Request identifier shared by every token issued for this grant.
    /// Left empty, one is assigned when the first token is stored.
    pub id: String,
    pub requested_at: DateTime<Utc>,
    pub client: Option<Client>,
    pub form: Form,
    pub requested_scope: Vec<String>,
    pub granted_scope: Vec<String>,
    pub requested_audience: Vec<String>,
    pub granted_audience: Vec<String>,
    pub session: Option<Session>,
}

impl OAuthRequest {
    pub fn new(client: Client, session: Session) -> Self {
        Self {
            id: String::new(),
            requested_at: Utc::now(),
            client: Some(client),
            form: Form::new(),
            requested_scope: Vec::new(),
            granted_scope: Vec::new(),
            requested_audience: Vec::new(),
            granted_audience: Vec::new(),
            session: Some(session),
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_requested_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_scope = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_requested_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_audience = audience.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a form parameter value.
    pub fn add_form_value<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.form.entry(key.into()).or_default().push(value.into());
    }

    /// Grants a scope once; repeated grants are ignored.
    pub fn grant_scope<S: Into<String>>(&mut self, scope: S) {
        let scope = scope.into();
        if !self.granted_scope.contains(&scope) {
            self.granted_scope.push(scope);
        }
    }

    pub fn grant_audience<S: Into<String>>(&mut self, audience: S) {
        let audience = audience.into();
        if !self.granted_audience.contains(&audience) {
            self.granted_audience.push(audience);
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client.as_ref().map(|client| client.id.as_str())
    }

    /// Form parameters safe to persist: every value is copied, credentials are dropped.
    pub fn sanitized_form(&self) -> Form {
        self.form
            .iter()
            .filter(|(key, _)| !CREDENTIAL_PARAMETERS.contains(&key.as_str()))
            .map(|(key, values)| (key.clone(), values.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_type_string_forms() {
        for token_type in TokenType::ALL {
            assert_eq!(token_type.as_str().parse::<TokenType>(), Ok(token_type));
            assert_eq!(
                serde_json::to_string(&token_type).unwrap(),
                format!("\"{}\"", token_type.as_str())
            );
        }
        assert!("id_token".parse::<TokenType>().is_err());
    }

    #[test]
    fn test_pkce_uses_authorize_code_slot() {
        assert_eq!(TokenType::Pkce.expiry_slot(), TokenType::AuthorizeCode);
        assert_eq!(TokenType::AccessToken.expiry_slot(), TokenType::AccessToken);
    }

    #[test]
    fn test_sanitized_form_drops_credentials() {
        let mut request = OAuthRequest::new(Client::new("client-123"), Session::default());
        request.add_form_value("grant_type", "password");
        request.add_form_value("username", "ada@example.com");
        request.add_form_value("password", "hunter2");
        request.add_form_value("client_secret", "s3cret");
        request.add_form_value("scope", "openid");
        request.add_form_value("scope", "profile");

        let form = request.sanitized_form();
        assert!(!form.contains_key("password"));
        assert!(!form.contains_key("client_secret"));
        assert_eq!(form["scope"], vec!["openid", "profile"]);
        assert_eq!(form["username"], vec!["ada@example.com"]);
    }

    #[test]
    fn test_grant_scope_is_idempotent() {
        let mut request = OAuthRequest::new(Client::new("client-123"), Session::default());
        request.grant_scope("openid");
        request.grant_scope("openid");
        request.grant_audience("api");
        assert_eq!(request.granted_scope, vec!["openid"]);
        assert_eq!(request.granted_audience, vec!["api"]);
        assert_eq!(request.client_id(), Some("client-123"));
    }
}
