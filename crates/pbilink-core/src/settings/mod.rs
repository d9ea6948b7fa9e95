//! Durable key-value settings the token is cached in.
//!
//! This module provides:
//! - `SettingsStore`: the string key/value contract
//! - `MemorySettings`: in-process store for tests and ephemeral sessions
//! - `FileSettings`: JSON document under the platform config directory
//! - `KeyringSettings`: OS keychain, one entry per key

pub mod file;
pub mod keychain;
pub mod memory;

use anyhow::Result;
use tracing::warn;

pub use self::file::FileSettings;
pub use self::keychain::KeyringSettings;
pub use self::memory::MemorySettings;

/// String key/value store that survives process restarts.
///
/// Calls are synchronous and expected to be short.
pub trait SettingsStore: Send + Sync {
    /// Value stored under `key`, or `default` if there is none
    fn get(&self, key: &str, default: &str) -> String;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Store several values together.
    ///
    /// Either every entry lands or none does. This default writes entries one
    /// at a time and, if a write fails, puts back the values the earlier keys
    /// had before returning the error. A key that was missing is restored as
    /// an empty string. Backends that can write everything in one operation
    /// override this.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let previous: Vec<(&str, String)> = entries
            .iter()
            .map(|(key, _)| (*key, self.get(key, "")))
            .collect();

        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(e) = self.set(key, value) {
                for (key, old) in previous[..written].iter().rev() {
                    if let Err(restore) = self.set(key, old) {
                        warn!(key, error = %restore, "Failed to restore setting after partial write");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}
