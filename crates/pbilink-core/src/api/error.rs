use thiserror::Error;

use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Could not obtain access token: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid authorization header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("BI service denied access to the resource: {0}")]
    AccessDenied(String),

    #[error("BI service rejected the access token")]
    Unauthorized,

    #[error("No such BI resource: {0}")]
    NotFound(String),

    #[error("BI service is throttling requests")]
    RateLimited,

    #[error("BI service failed to answer: {0}")]
    ServerError(String),

    #[error("Request to BI service failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("BI response larger than {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("BI response is not the expected JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected answer from BI service: {0}")]
    InvalidResponse(String),
}

/// Bytes of an error response body kept for the error message. The gateway
/// stops reading the body once it has more than this.
pub(crate) const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    /// Cut an error body down to `MAX_ERROR_BODY_LENGTH` bytes on a char boundary
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated)", &body[..end])
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => FetchError::Unauthorized,
            403 => FetchError::AccessDenied(truncated),
            404 => FetchError::NotFound(truncated),
            429 => FetchError::RateLimited,
            500..=599 => FetchError::ServerError(truncated),
            _ => FetchError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}
