use reqwest::Method;

/// Failure talking to Vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("invalid vault address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("request to vault failed")]
    Http(#[from] reqwest::Error),

    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        body: String,
    },

    #[error("unable to decode response from {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("response from {path} has no '{field}'")]
    MissingField { path: String, field: &'static str },
}

impl VaultError {
    /// The HTTP status of a rejected request, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
