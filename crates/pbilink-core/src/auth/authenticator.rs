use anyhow::Result;
use async_trait::async_trait;

use super::AuthenticationResult;
use crate::config::AuthorityConfig;

/// Platform login flow (e.g. an interactive OAuth2 web view).
///
/// Fails with an opaque error when the user cancels or the identity provider
/// rejects the request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, authority: &AuthorityConfig) -> Result<AuthenticationResult>;
}
