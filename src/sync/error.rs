use crate::resources::{ResourceKind, ValidationError};
use crate::vault::VaultError;
use std::path::PathBuf;

/// Why a synchronization step failed.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Contradictory options, raised before anything is sent to Vault.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid {kind}: {item}")]
    Validation {
        kind: ResourceKind,
        item: String,
        #[source]
        source: ValidationError,
    },

    #[error("[{kind}: {item}] unable to {action}")]
    Remote {
        kind: ResourceKind,
        item: String,
        action: &'static str,
        #[source]
        source: VaultError,
    },

    #[error("unable to read the policy file: {}", .path.display())]
    PolicyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub(crate) fn invalid(kind: ResourceKind, item: &str, source: ValidationError) -> Self {
        Self::Validation {
            kind,
            item: item.to_string(),
            source,
        }
    }

    pub(crate) fn remote(
        kind: ResourceKind,
        item: &str,
        action: &'static str,
        source: VaultError,
    ) -> Self {
        Self::Remote {
            kind,
            item: item.to_string(),
            action,
            source,
        }
    }
}
