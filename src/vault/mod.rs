//! The remote side of synchronization.
//!
//! [`VaultApi`] is the only surface the engine uses to read and change
//! remote state; [`VaultClient`] implements it over HTTP.

mod client;
mod error;

pub use client::*;
pub use error::*;

use crate::resources::UserAuth;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub use reqwest::Method;

// ============================================================================
// Remote state types
// ============================================================================

/// Metadata of a mounted auth backend or secret engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MountInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

impl MountInfo {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
        }
    }
}

/// Mounted paths, keyed without surrounding slashes.
pub type Mounts = BTreeMap<String, MountInfo>;

/// Raw outcome of a generic configuration write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    /// Vault answers a configuration write with 204 No Content.
    pub fn is_no_content(&self) -> bool {
        self.status == 204
    }
}

/// Lease settings applied when a secret engine is mounted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountTtl {
    pub default_lease: Duration,
    pub max_lease: Duration,
}

impl MountTtl {
    /// Render a TTL the way the mount API expects; zero defers to the system.
    pub fn render(ttl: Duration) -> String {
        if ttl.is_zero() {
            "system".to_string()
        } else {
            format!("{}s", ttl.as_secs())
        }
    }
}

// ============================================================================
// VaultApi trait
// ============================================================================

/// Operations the synchronizer performs against Vault.
#[async_trait]
pub trait VaultApi: Send + Sync {
    async fn list_auth_mounts(&self) -> Result<Mounts, VaultError>;

    async fn mount_auth(&self, path: &str, kind: &str, description: &str)
        -> Result<(), VaultError>;

    async fn unmount_auth(&self, path: &str) -> Result<(), VaultError>;

    async fn list_secret_mounts(&self) -> Result<Mounts, VaultError>;

    async fn mount_secret(
        &self,
        path: &str,
        kind: &str,
        description: &str,
        ttl: MountTtl,
    ) -> Result<(), VaultError>;

    async fn unmount_secret(&self, path: &str) -> Result<(), VaultError>;

    /// Write `body` to `path`. Any HTTP status is returned to the caller;
    /// only transport failures are errors.
    async fn apply_config(
        &self,
        method: Method,
        path: &str,
        body: &BTreeMap<String, String>,
    ) -> Result<ApiResponse, VaultError>;

    async fn list_policies(&self) -> Result<Vec<String>, VaultError>;

    async fn set_policy(&self, name: &str, content: &str) -> Result<(), VaultError>;

    async fn delete_policy(&self, name: &str) -> Result<(), VaultError>;

    /// Create or update a user under `mount`.
    async fn upsert_user(
        &self,
        mount: &str,
        auth: UserAuth<'_>,
        policies: &[String],
    ) -> Result<(), VaultError>;

    async fn write_secret(
        &self,
        path: &str,
        values: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), VaultError>;
}
