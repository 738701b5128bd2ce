use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Vault connection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaultSettings {
    pub address: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// File holding `username` and `password`; preferred over the inline pair.
    pub credentials: Option<PathBuf>,
    pub timeout_secs: u64,
    pub skip_tls_verify: bool,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_VAULT_ADDR.to_string(),
            token: None,
            username: None,
            password: None,
            credentials: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            skip_tls_verify: false,
        }
    }
}

// ============================================================================
// Synchronization
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncSettings {
    pub config_glob: String,
    pub policy_glob: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            config_glob: DEFAULT_CONFIG_GLOB.to_string(),
            policy_glob: DEFAULT_POLICY_GLOB.to_string(),
        }
    }
}

// ============================================================================
// Transit
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransitSettings {
    pub extension: String,
    pub glob_filter: String,
}

impl Default for TransitSettings {
    fn default() -> Self {
        Self {
            extension: DEFAULT_TRANSIT_EXTENSION.to_string(),
            glob_filter: DEFAULT_TRANSIT_GLOB.to_string(),
        }
    }
}
