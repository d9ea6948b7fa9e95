//! Gateway for authenticated GET requests against the BI REST API.

use std::sync::Arc;

use futures::StreamExt;
use reqwest::{header, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::MAX_ERROR_BODY_LENGTH;
use super::{FetchError, SharedHttpClient};
use crate::auth::{Token, TokenManager};
use crate::busy::BusyIndicator;

/// Largest response body the gateway will buffer.
/// BI list endpoints stay well under this; anything bigger is a runaway response.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Result of a fail-soft fetch
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Data(T),
    /// Nothing to show; the error is kept for callers that want to inspect it
    Empty(FetchError),
}

impl<T> FetchOutcome<T> {
    pub fn data(self) -> Option<T> {
        match self {
            FetchOutcome::Data(data) => Some(data),
            FetchOutcome::Empty(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Data(_) => None,
            FetchOutcome::Empty(e) => Some(e),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FetchOutcome::Empty(_))
    }
}

impl<T: Default> FetchOutcome<T> {
    pub fn into_data_or_default(self) -> T {
        self.data().unwrap_or_default()
    }
}

impl<T> From<Result<T, FetchError>> for FetchOutcome<T> {
    fn from(result: Result<T, FetchError>) -> Self {
        match result {
            Ok(data) => FetchOutcome::Data(data),
            Err(e) => FetchOutcome::Empty(e),
        }
    }
}

/// Clone is cheap - all state is shared.
#[derive(Clone)]
pub struct ApiGateway {
    tokens: Arc<TokenManager>,
    http: Arc<SharedHttpClient>,
    busy: Arc<BusyIndicator>,
    base_url: Option<Url>,
}

impl ApiGateway {
    pub fn new(
        tokens: Arc<TokenManager>,
        http: Arc<SharedHttpClient>,
        busy: Arc<BusyIndicator>,
    ) -> Self {
        Self {
            tokens,
            http,
            busy,
            base_url: None,
        }
    }

    /// Resolve relative request paths against `base_url`
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Fetch and decode `url`, returning `T::default()` on any failure.
    ///
    /// Never fails: authentication, network, status and decode errors are
    /// logged and replaced by the default value.
    pub async fn fetch_typed<T>(&self, url: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.fetch(url).await.into_data_or_default()
    }

    /// Fetch and decode `url`, reporting failure as `FetchOutcome::Empty`
    pub async fn fetch<T: DeserializeOwned>(&self, url: &str) -> FetchOutcome<T> {
        let outcome = FetchOutcome::from(self.try_fetch(url).await);
        if let Some(e) = outcome.error() {
            warn!(url = url, error = %e, "Fetch failed, returning no data");
        }
        outcome
    }

    /// Fetch and decode `url`, returning any error to the caller.
    ///
    /// A 401 from the API re-authenticates once and retries the request.
    pub async fn try_fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let url = self.resolve(url)?;
        let token = self.tokens.get_valid_token().await?;

        match self.get_json(&url, &token).await {
            Err(FetchError::Unauthorized) => {
                warn!(url = %url, "Token rejected by API, re-authenticating");
                let token = self.tokens.refresh_rejected(&token).await?;
                self.get_json(&url, &token).await
            }
            result => result,
        }
    }

    fn resolve(&self, url: &str) -> Result<Url, FetchError> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| FetchError::InvalidUrl(format!("{} (no base URL)", url)))?;
        base.join(url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url, token: &Token) -> Result<T, FetchError> {
        let _busy = self.busy.guard();
        let client = self.http.client()?;

        let mut authorization = header::HeaderValue::from_str(&token.authorization_value())?;
        authorization.set_sensitive(true);

        debug!(url = %url, "GET");
        let response = client
            .get(url.clone())
            .header(header::AUTHORIZATION, authorization)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = Self::read_body(response).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = Self::read_error_body(response).await;
            Err(FetchError::from_status(status, &body))
        }
    }

    /// Read just enough of an error body for the message. Reading stops one
    /// byte past `MAX_ERROR_BODY_LENGTH` so truncation is still detected.
    async fn read_error_body(response: reqwest::Response) -> String {
        let cap = MAX_ERROR_BODY_LENGTH + 1;
        let mut body = Vec::with_capacity(cap);
        let mut stream = response.bytes_stream();
        while body.len() < cap {
            match stream.next().await {
                Some(Ok(chunk)) => {
                    let take = chunk.len().min(cap - body.len());
                    body.extend_from_slice(&chunk[..take]);
                }
                Some(Err(e)) => {
                    debug!(error = %e, "Error body read failed");
                    break;
                }
                None => break,
            }
        }
        String::from_utf8_lossy(&body).into_owned()
    }

    async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > MAX_BODY_BYTES {
                return Err(FetchError::BodyTooLarge {
                    limit: MAX_BODY_BYTES,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

impl std::fmt::Debug for ApiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
