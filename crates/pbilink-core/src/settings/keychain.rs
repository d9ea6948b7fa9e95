use anyhow::{Context, Result};
use keyring::Entry;
use tracing::{debug, warn};

use super::SettingsStore;
use crate::config::APP_NAME;

/// Settings kept in the OS keychain, one entry per key.
///
/// Backed by the platform store enabled on the `keyring` dependency (macOS/iOS
/// keychain, Windows credential manager, Linux kernel keyutils). The keychain
/// has no multi-entry transaction, so `set_many` writes entries one after
/// another and restores the earlier ones if a later write fails.
#[derive(Debug, Clone)]
pub struct KeyringSettings {
    service: String,
}

impl KeyringSettings {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Delete the entry for `key`. Deleting a missing entry is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete value from keychain"),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    /// Stored value, `None` if there is no entry
    fn lookup(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve value from keychain"),
        }
    }
}

impl Default for KeyringSettings {
    fn default() -> Self {
        Self::new(APP_NAME)
    }
}

impl SettingsStore for KeyringSettings {
    fn get(&self, key: &str, default: &str) -> String {
        match self.lookup(key) {
            Ok(Some(value)) => value,
            Ok(None) => default.to_string(),
            Err(e) => {
                debug!(key, error = %e, "Keychain read failed, using default");
                default.to_string()
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store value in keychain")?;
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut previous = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            previous.push((*key, self.lookup(key)?));
        }

        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(e) = self.set(key, value) {
                for (key, old) in previous[..written].iter().rev() {
                    let restored = match old {
                        Some(old) => self.set(key, old),
                        None => self.remove(key),
                    };
                    if let Err(restore) = restored {
                        warn!(key, error = %restore, "Failed to restore keychain entry after partial write");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_service(name: &str) -> KeyringSettings {
        KeyringSettings::new(format!("{}-test-{}-{}", APP_NAME, name, std::process::id()))
    }

    #[test]
    fn test_default_service_is_app_name() {
        assert_eq!(KeyringSettings::default().service(), APP_NAME);
    }

    // Needs a real OS keychain; run with `--ignored` on a desktop session
    #[test]
    #[ignore]
    fn test_values_survive_new_instance() {
        let settings = scratch_service("roundtrip");
        settings
            .set_many(&[("TokenKey", "abc"), ("AccessTokenTypeKey", "Bearer")])
            .unwrap();

        let reopened = KeyringSettings::new(settings.service());
        assert_eq!(reopened.get("TokenKey", "<default>"), "abc");
        assert_eq!(reopened.get("AccessTokenTypeKey", "<default>"), "Bearer");

        reopened.remove("TokenKey").unwrap();
        reopened.remove("AccessTokenTypeKey").unwrap();
        assert_eq!(reopened.get("TokenKey", "<default>"), "<default>");
    }

    #[test]
    #[ignore]
    fn test_remove_missing_entry_is_ok() {
        let settings = scratch_service("remove");
        settings.remove("NeverWritten").unwrap();
    }
}
