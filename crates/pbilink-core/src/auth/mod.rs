//! Authentication module for acquiring and caching OAuth2 access tokens.
//!
//! This module provides:
//! - `Token`: the access token, its type and its expiry
//! - `Authenticator`: the platform login flow, supplied by the host
//! - `TokenManager`: returns a valid token, refreshing it through the
//!   authenticator when the cached one is missing or expired
//!
//! Tokens are persisted in a `SettingsStore` so they survive restarts. A token
//! counts as expired from the exact instant of its `expires_at`.

pub mod authenticator;
pub mod error;
pub mod manager;
pub mod token;

pub use authenticator::Authenticator;
pub use error::AuthError;
pub use manager::{RefreshMode, TokenManager};
pub use token::{AuthenticationResult, StoredToken, Token, TokenKeys};
