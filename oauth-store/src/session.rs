//! Session payload carried by every stored token.

use crate::request::TokenType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Protocol-level session state: who the principal is and when each token expires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseSession {
    /// Expiry per token type, keyed by the token type's string form.
    #[serde(default)]
    pub expires_at: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

/// Session stored with each token: the base session plus tenancy context.
///
/// `Clone` is a deep copy. The base session, the expiry map and the granted
/// scopes are owned values, so clones never share backing storage and
/// concurrent holders never observe each other's mutations. Cloning an
/// absent `Option<Session>` yields `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(flatten)]
    pub base: BaseSession,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub granted_scopes: Vec<String>,
}

impl Session {
    pub fn new<S: Into<String>>(subject: S) -> Self {
        let mut session = Self::default();
        session.base.subject = subject.into();
        session
    }

    pub fn with_tenant<O: Into<String>, U: Into<String>>(
        mut self,
        organization_id: O,
        user_id: U,
    ) -> Self {
        self.organization_id = organization_id.into();
        self.user_id = user_id.into();
        self
    }

    pub fn subject(&self) -> &str {
        &self.base.subject
    }

    pub fn set_subject<S: Into<String>>(&mut self, subject: S) {
        self.base.subject = subject.into();
    }

    pub fn username(&self) -> &str {
        &self.base.username
    }

    /// Expiry recorded for `token_type`, if any.
    pub fn expires_at(&self, token_type: TokenType) -> Option<DateTime<Utc>> {
        self.base
            .expires_at
            .get(token_type.expiry_slot().as_str())
            .copied()
    }

    pub fn set_expires_at(&mut self, token_type: TokenType, expires_at: DateTime<Utc>) {
        self.base
            .expires_at
            .insert(token_type.expiry_slot().as_str().to_string(), expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_session() -> Session {
        let mut session = Session::new("user-1").with_tenant("org-A", "user-1");
        session.granted_scopes = vec!["openid".to_string()];
        session.base.username = "ada@example.com".to_string();
        session
            .base
            .extra
            .insert("amr".to_string(), Value::from("pwd"));
        session
    }

    #[test]
    fn test_clone_is_independent() {
        let original = sample_session();
        let mut copy = original.clone();

        copy.granted_scopes.push("profile".to_string());
        copy.set_subject("someone-else");
        copy.set_expires_at(TokenType::AccessToken, Utc::now());
        copy.base.extra.insert("acr".to_string(), Value::from("1"));

        assert_eq!(original.granted_scopes, vec!["openid"]);
        assert_eq!(original.subject(), "user-1");
        assert!(original.expires_at(TokenType::AccessToken).is_none());
        assert!(!original.base.extra.contains_key("acr"));
    }

    #[test]
    fn test_clone_of_absent_session_is_absent() {
        let absent: Option<Session> = None;
        assert!(absent.clone().is_none());
    }

    #[test]
    fn test_expiry_is_per_token_type() {
        let now = Utc::now();
        let mut session = Session::default();
        session.set_expires_at(TokenType::AuthorizeCode, now + Duration::minutes(10));
        session.set_expires_at(TokenType::RefreshToken, now + Duration::hours(24));

        assert_eq!(
            session.expires_at(TokenType::AuthorizeCode),
            Some(now + Duration::minutes(10))
        );
        assert_eq!(
            session.expires_at(TokenType::Pkce),
            Some(now + Duration::minutes(10))
        );
        assert_eq!(
            session.expires_at(TokenType::RefreshToken),
            Some(now + Duration::hours(24))
        );
        assert!(session.expires_at(TokenType::AccessToken).is_none());
    }

    #[test]
    fn test_json_round_trip_keeps_tenancy() {
        let mut session = sample_session();
        session.set_expires_at(TokenType::AccessToken, Utc::now());

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["organization_id"], "org-A");
        assert_eq!(json["subject"], "user-1");

        let decoded: Session = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn test_decodes_sparse_payload() {
        let decoded: Session = serde_json::from_str(r#"{"subject":"user-9"}"#).unwrap();
        assert_eq!(decoded.subject(), "user-9");
        assert!(decoded.organization_id.is_empty());
        assert!(decoded.granted_scopes.is_empty());
    }
}
