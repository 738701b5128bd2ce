mod defaults;
mod io;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use types::*;
pub use validation::*;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Top-level vaultsync settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub vault: VaultSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub transit: TransitSettings,
}

impl Settings {
    /// Load settings from file and environment, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => find_settings_file(),
        };

        let mut settings = match settings_path {
            Some(path) => {
                info!("Loading settings from {}", path.display());
                decode_file(&path)?
            }
            None => {
                debug!("No settings file found, using defaults");
                Settings::default()
            }
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok());

        Ok(settings)
    }

    /// Apply environment variable overrides, reading values through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let vault = &mut self.vault;

        if let Some(addr) = lookup(ENV_VAULT_ADDR) {
            vault.address = addr;
        }
        if let Some(token) = lookup(ENV_VAULT_TOKEN) {
            vault.token = Some(token);
        }
        if let Some(username) = lookup(ENV_VAULT_USERNAME) {
            vault.username = Some(username);
        }
        if let Some(password) = lookup(ENV_VAULT_PASSWORD) {
            vault.password = Some(password);
        }
        if let Some(credentials) = lookup(ENV_VAULT_CREDENTIALS) {
            vault.credentials = Some(PathBuf::from(credentials));
        }
        if let Some(skip) = lookup(ENV_VAULT_SKIP_VERIFY) {
            vault.skip_tls_verify = matches!(
                skip.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }
    }
}

/// Find the settings file in standard locations.
fn find_settings_file() -> Option<PathBuf> {
    SETTINGS_FILE_NAMES
        .iter()
        .map(|name| PathBuf::from(*name))
        .find(|path| path.exists())
        .or_else(|| {
            let home = dirs::home_dir()?.join(SETTINGS_HOME_DIR).join("config.toml");
            home.exists().then_some(home)
        })
}
