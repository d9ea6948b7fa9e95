//! Session-scoped context that owns every piece of shared state.
//!
//! Create one `AppContext` when the app (or user session) starts and drop it,
//! or call `shutdown`, when it ends. Nothing here lives in a global.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use tracing::{info, warn};

use crate::api::{ApiGateway, SharedHttpClient};
use crate::auth::{Authenticator, TokenManager};
use crate::busy::{BusyIndicator, BusyObserver};
use crate::config::Config;
use crate::settings::SettingsStore;

pub struct AppContext {
    config: Config,
    busy: Arc<BusyIndicator>,
    tokens: Arc<TokenManager>,
    gateway: ApiGateway,
}

impl AppContext {
    /// Wire up the token manager and gateway for a validated `config`
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        settings: Arc<dyn SettingsStore>,
        observer: Arc<dyn BusyObserver>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let base_url = Url::parse(&config.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", config.api_base_url))?;

        let busy = Arc::new(BusyIndicator::new(observer));
        let tokens = Arc::new(
            TokenManager::new(
                config.authority.clone(),
                config.token_keys.clone(),
                authenticator,
                settings,
                busy.clone(),
            )
            .with_mode(config.refresh_mode),
        );
        let http = Arc::new(SharedHttpClient::new(Duration::from_secs(
            config.request_timeout_secs,
        )));
        let gateway = ApiGateway::new(tokens.clone(), http, busy.clone()).with_base_url(base_url);

        info!(
            api_base_url = %config.api_base_url,
            refresh_mode = ?config.refresh_mode,
            "Session context created"
        );

        Ok(Self {
            config,
            busy,
            tokens,
            gateway,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    pub fn busy(&self) -> &Arc<BusyIndicator> {
        &self.busy
    }

    /// End the session. Outstanding gateway clones keep working until dropped.
    pub fn shutdown(self) {
        if self.busy.is_busy() {
            warn!(outstanding = self.busy.count(), "Shutting down with work in flight");
        }
        info!("Session context shut down");
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("busy", &self.busy)
            .finish_non_exhaustive()
    }
}
