use std::sync::OnceLock;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

/// One `reqwest::Client` per session, built on first use.
/// Cloning a `Client` is cheap and shares its connection pool.
#[derive(Debug)]
pub struct SharedHttpClient {
    timeout: Duration,
    client: OnceLock<Client>,
}

impl SharedHttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    pub fn client(&self) -> Result<&Client, reqwest::Error> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let built = Client::builder().timeout(self.timeout).build()?;
        debug!(timeout_secs = self.timeout.as_secs(), "HTTP client created");
        // If another task won the race, its client is kept and ours is dropped
        Ok(self.client.get_or_init(|| built))
    }

    pub fn is_initialized(&self) -> bool {
        self.client.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_is_built_lazily_once() {
        let shared = SharedHttpClient::new(Duration::from_secs(15));
        assert!(!shared.is_initialized());

        let first = shared.client().unwrap() as *const Client;
        let second = shared.client().unwrap() as *const Client;

        assert!(shared.is_initialized());
        assert_eq!(first, second);
    }
}
