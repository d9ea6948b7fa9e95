use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::settings::SettingsStore;

/// A bearer credential. All three fields come from the same authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// True from the exact instant of expiry onward
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }

    /// Value for the `Authorization` header: `"<token_type> <access_token>"`
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

// Keep the credential itself out of logs
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// What the platform authenticator hands back.
/// Only converted into a `Token` when every field is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub access_token: String,
    pub token_type: String,
    pub expires_on: Option<DateTime<Utc>>,
}

impl AuthenticationResult {
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_on: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_on: Some(expires_on),
        }
    }

    pub fn into_token(self) -> Result<Token, AuthError> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::IncompleteCredentials("access token"));
        }
        if self.token_type.trim().is_empty() {
            return Err(AuthError::IncompleteCredentials("token type"));
        }
        let expires_at = self
            .expires_on
            .ok_or(AuthError::IncompleteCredentials("expiry"))?;

        Ok(Token {
            access_token: self.access_token,
            token_type: self.token_type,
            expires_at,
        })
    }
}

/// Settings keys the token fields are stored under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenKeys {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: String,
}

impl Default for TokenKeys {
    fn default() -> Self {
        Self {
            access_token: "TokenKey".to_string(),
            token_type: "AccessTokenTypeKey".to_string(),
            expires_at: "TokenExpirationDateTimeOffsetKey".to_string(),
        }
    }
}

/// Token fields as read back from settings, possibly blank or partial
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredToken {
    pub access_token: String,
    pub token_type: String,
    /// `None` when the stored expiry is missing or unparseable
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    pub fn load(settings: &dyn SettingsStore, keys: &TokenKeys) -> Self {
        let expires_raw = settings.get(&keys.expires_at, "");
        let expires_at = if expires_raw.is_empty() {
            None
        } else {
            DateTime::parse_from_rfc3339(&expires_raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        };

        Self {
            access_token: settings.get(&keys.access_token, ""),
            token_type: settings.get(&keys.token_type, ""),
            expires_at,
        }
    }

    /// Write all three token fields in one `set_many` call
    pub fn save(settings: &dyn SettingsStore, keys: &TokenKeys, token: &Token) -> anyhow::Result<()> {
        let expires = token
            .expires_at
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        settings.set_many(&[
            (keys.access_token.as_str(), token.access_token.as_str()),
            (keys.token_type.as_str(), token.token_type.as_str()),
            (keys.expires_at.as_str(), expires.as_str()),
        ])
    }

    /// The stored token, if it is complete. Validity is not checked.
    pub fn token(&self) -> Option<Token> {
        if self.access_token.trim().is_empty() || self.token_type.trim().is_empty() {
            return None;
        }
        Some(Token {
            access_token: self.access_token.clone(),
            token_type: self.token_type.clone(),
            expires_at: self.expires_at?,
        })
    }

    /// The stored token if it is complete and not yet expired at `now`
    pub fn valid_token(&self, now: DateTime<Utc>) -> Option<Token> {
        self.token().filter(|token| !token.is_expired_at(now))
    }
}
