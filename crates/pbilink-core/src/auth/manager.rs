//! Token manager: lazy acquisition, reuse while valid, refresh on expiry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{AuthError, Authenticator, StoredToken, Token, TokenKeys};
use crate::busy::BusyIndicator;
use crate::clock::{Clock, SystemClock};
use crate::config::AuthorityConfig;
use crate::settings::SettingsStore;

/// How overlapping callers that find a stale token are coordinated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// One refresh at a time. Callers that queued behind it reuse its token.
    #[default]
    SingleFlight,
    /// Every caller that sees a stale token authenticates on its own; the last
    /// write to settings wins.
    Concurrent,
}

pub struct TokenManager {
    authority: AuthorityConfig,
    keys: TokenKeys,
    authenticator: Arc<dyn Authenticator>,
    settings: Arc<dyn SettingsStore>,
    busy: Arc<BusyIndicator>,
    clock: Arc<dyn Clock>,
    mode: RefreshMode,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        authority: AuthorityConfig,
        keys: TokenKeys,
        authenticator: Arc<dyn Authenticator>,
        settings: Arc<dyn SettingsStore>,
        busy: Arc<BusyIndicator>,
    ) -> Self {
        Self {
            authority,
            keys,
            authenticator,
            settings,
            busy,
            clock: Arc::new(SystemClock),
            mode: RefreshMode::default(),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_mode(mut self, mode: RefreshMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> RefreshMode {
        self.mode
    }

    /// Get a token that is valid right now.
    ///
    /// Returns the cached token without touching the network if it is complete
    /// and not expired; otherwise authenticates, persists the new token and
    /// returns it. Authentication failures are returned to the caller and
    /// leave the stored token as it was.
    ///
    /// If the new token cannot be written to settings, it is dropped and
    /// `AuthError::Persist` is returned. The settings keep the previous token,
    /// so the next call authenticates again instead of handing out a token
    /// the store never recorded.
    pub async fn get_valid_token(&self) -> Result<Token, AuthError> {
        if let Some(token) = self.valid_cached_token() {
            return Ok(token);
        }

        match self.mode {
            RefreshMode::SingleFlight => {
                let _lock = self.refresh_lock.lock().await;
                // Another caller may have refreshed while we waited
                if let Some(token) = self.valid_cached_token() {
                    debug!("Reusing token refreshed by a concurrent caller");
                    return Ok(token);
                }
                self.refresh().await
            }
            RefreshMode::Concurrent => self.refresh().await,
        }
    }

    /// Authenticate again regardless of the cached token's expiry
    pub async fn force_refresh(&self) -> Result<Token, AuthError> {
        match self.mode {
            RefreshMode::SingleFlight => {
                let _lock = self.refresh_lock.lock().await;
                self.refresh().await
            }
            RefreshMode::Concurrent => self.refresh().await,
        }
    }

    /// Replace a token the API refused.
    ///
    /// If the cached token has already moved on from `rejected` (another caller
    /// got there first) and is still valid, that one is returned instead of
    /// authenticating again.
    pub async fn refresh_rejected(&self, rejected: &Token) -> Result<Token, AuthError> {
        let _lock = match self.mode {
            RefreshMode::SingleFlight => Some(self.refresh_lock.lock().await),
            RefreshMode::Concurrent => None,
        };

        if let Some(token) = self.valid_cached_token() {
            if token.access_token != rejected.access_token {
                debug!("Rejected token already replaced");
                return Ok(token);
            }
        }
        self.refresh().await
    }

    /// The stored token whether or not it has expired
    pub fn cached_token(&self) -> Option<Token> {
        StoredToken::load(self.settings.as_ref(), &self.keys).token()
    }

    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.cached_token()
            .map(|token| token.seconds_until_expiry(self.clock.now()))
    }

    fn valid_cached_token(&self) -> Option<Token> {
        StoredToken::load(self.settings.as_ref(), &self.keys).valid_token(self.clock.now())
    }

    async fn refresh(&self) -> Result<Token, AuthError> {
        let _busy = self.busy.guard();
        info!(authority = %self.authority.authority, "Authenticating");

        let result = self
            .authenticator
            .authenticate(&self.authority)
            .await
            .map_err(|e| {
                warn!(error = %e, "Authenticator failed");
                AuthError::Authenticator(e)
            })?;

        let token = result.into_token()?;

        StoredToken::save(self.settings.as_ref(), &self.keys, &token).map_err(|e| {
            warn!(
                token_type = %token.token_type,
                expires_at = %token.expires_at,
                error = %e,
                "Discarding refreshed token that could not be saved"
            );
            AuthError::Persist(e)
        })?;

        info!(
            token_type = %token.token_type,
            expires_at = %token.expires_at,
            "Access token refreshed"
        );
        Ok(token)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("authority", &self.authority)
            .field("keys", &self.keys)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
