//! Persisted forms of a protocol request.

use crate::request::{Client, Form, OAuthRequest, TokenType};
use crate::session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serializable projection of an [`OAuthRequest`]; the session cache payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRequest {
    pub request_id: String,
    pub requested_at: DateTime<Utc>,
    pub client_id: String,
    #[serde(default)]
    pub form: Form,
    #[serde(default)]
    pub requested_scope: Vec<String>,
    #[serde(default)]
    pub granted_scope: Vec<String>,
    #[serde(default)]
    pub requested_audience: Vec<String>,
    #[serde(default)]
    pub granted_audience: Vec<String>,
    #[serde(default)]
    pub session: Session,
}

impl StoredRequest {
    /// Rebuilds the protocol request. Only the client identifier is persisted,
    /// so the client carries no other attributes.
    pub fn into_request(self) -> OAuthRequest {
        OAuthRequest {
            id: self.request_id,
            requested_at: self.requested_at,
            client: Some(Client::new(self.client_id)),
            form: self.form,
            requested_scope: self.requested_scope,
            granted_scope: self.granted_scope,
            requested_audience: self.requested_audience,
            granted_audience: self.granted_audience,
            session: Some(self.session),
        }
    }
}

/// One durable row per issued token signature.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTokenRecord {
    pub signature: String,
    pub token_type: TokenType,
    pub request_id: String,
    pub client_id: String,
    pub subject: Option<String>,
    pub organization_id: Option<String>,
    pub user_id: Option<String>,
    pub requested_scope: Vec<String>,
    pub granted_scope: Vec<String>,
    pub requested_audience: Vec<String>,
    pub granted_audience: Vec<String>,
    pub form_data: Form,
    pub session_data: Session,
    pub requested_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl StoredTokenRecord {
    /// Builds an active record. Tenancy columns are copied verbatim from the session.
    pub fn new(
        signature: &str,
        token_type: TokenType,
        stored: &StoredRequest,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            signature: signature.to_string(),
            token_type,
            request_id: stored.request_id.clone(),
            client_id: stored.client_id.clone(),
            subject: non_empty(stored.session.subject()),
            organization_id: non_empty(&stored.session.organization_id),
            user_id: non_empty(&stored.session.user_id),
            requested_scope: stored.requested_scope.clone(),
            granted_scope: stored.granted_scope.clone(),
            requested_audience: stored.requested_audience.clone(),
            granted_audience: stored.granted_audience.clone(),
            form_data: stored.form.clone(),
            session_data: stored.session.clone(),
            requested_at: stored.requested_at,
            expires_at,
            active: true,
        }
    }

    /// Whether the record may be served as a token of `expected` type at `now`.
    pub fn is_live(&self, expected: TokenType, now: DateTime<Utc>) -> bool {
        self.token_type == expected
            && self.active
            && self.expires_at.map_or(true, |expires_at| expires_at > now)
    }

    /// The subject column wins over the serialized session's subject.
    pub fn into_stored_request(self) -> StoredRequest {
        let mut session = self.session_data;
        if let Some(subject) = self.subject {
            session.set_subject(subject);
        }
        StoredRequest {
            request_id: self.request_id,
            requested_at: self.requested_at,
            client_id: self.client_id,
            form: self.form_data,
            requested_scope: self.requested_scope,
            granted_scope: self.granted_scope,
            requested_audience: self.requested_audience,
            granted_audience: self.granted_audience,
            session,
        }
    }
}
