//! pbilink core library.
//!
//! Token lifecycle and authenticated access to a cloud BI REST API:
//!
//! - `auth`: OAuth2 token acquisition, expiry checks, refresh and persistence
//! - `api`: the `ApiGateway` that attaches credentials and decodes JSON responses
//! - `settings`: durable key-value stores the token is cached in
//! - `busy`: the counter behind the UI busy indicator
//! - `context`: `AppContext`, which owns all of the above for one app session
//!
//! The platform authenticator, the settings backend and the busy-indicator UI
//! binding are supplied by the host through the `Authenticator`,
//! `SettingsStore` and `BusyObserver` traits.

pub mod api;
pub mod auth;
pub mod busy;
pub mod clock;
pub mod config;
pub mod context;
pub mod logging;
pub mod settings;

pub use api::{ApiGateway, FetchError, FetchOutcome};
pub use auth::{AuthError, AuthenticationResult, Authenticator, RefreshMode, Token, TokenManager};
pub use busy::{BusyIndicator, BusyObserver};
pub use config::{AuthorityConfig, Config};
pub use context::AppContext;
pub use settings::{FileSettings, KeyringSettings, MemorySettings, SettingsStore};
