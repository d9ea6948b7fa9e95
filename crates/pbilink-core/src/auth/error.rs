use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed: {0:#}")]
    Authenticator(#[source] anyhow::Error),

    #[error("Authenticator returned incomplete credentials: missing {0}")]
    IncompleteCredentials(&'static str),

    #[error("Failed to persist token: {0:#}")]
    Persist(#[source] anyhow::Error),
}
