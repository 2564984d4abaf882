//! # oauth-store
//!
//! Token lifecycle and session persistence for an OAuth2/OpenID Connect
//! authorization server.
//!
//! ## Components
//!
//! - **Session:** per-token payload carrying identity, tenancy and per-type expiry.
//! - **Store:** durable implementation of the storage contract, plus password authentication.
//! - **Cache:** optional read-through/write-through session cache keyed by signature.
//! - **Registry:** static client table layered over any storage implementation.
//! - **Provider:** composes strategy, registry, handler factories and lifetimes.

pub mod cache;
pub mod config;
pub mod errors;
pub mod password;
pub mod provider;
pub mod registry;
pub mod request;
pub mod session;
pub mod storage;
pub mod store;
#[cfg(test)]
mod test_utils;

pub use crate::errors::{ProviderError, StoreError};
pub use crate::provider::{compose, Provider, ProviderConfig, ProviderDependencies};
pub use crate::registry::ClientRegistry;
pub use crate::request::{Client, Form, OAuthRequest, TokenType};
pub use crate::session::{BaseSession, Session};
pub use crate::storage::OAuthStorage;
pub use crate::store::TokenStore;
