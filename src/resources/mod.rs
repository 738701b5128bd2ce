//! Declared resources: the desired state read from configuration files.
//!
//! A [`ResourceSet`] is the union of every parsed resource file plus the
//! policy files discovered on disk. It is built fresh for each run and only
//! mutated once, when file references in attributes are expanded during
//! validation.

mod loader;
mod validate;

pub use loader::*;
pub use validate::*;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Attribute key naming the sub-path under the mount to configure.
pub const ATTRIBUTE_URI_KEY: &str = "uri";

/// Attribute key marking a setting that is applied only on first mount.
pub const ATTRIBUTE_ONESHOT_KEY: &str = "oneshot";

/// Default mount for username/password users.
pub const DEFAULT_USERPASS_PATH: &str = "userpass";

/// Default mount for token users.
pub const DEFAULT_TOKEN_PATH: &str = "token";

/// Policy list written for users that declare none.
pub const NO_POLICIES: &str = "none";

// ============================================================================
// Resource kinds
// ============================================================================

/// The kinds of resource the engine knows how to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Auth,
    Policy,
    User,
    Backend,
    Secret,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Policy => "policy",
            Self::User => "user",
            Self::Backend => "backend",
            Self::Secret => "secret",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// A configuration write pushed beneath a mount.
///
/// Declared as a flat mapping in resource files; the `uri` and `oneshot`
/// keys are lifted out when the file is decoded so the engine never looks
/// them up by name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "serde_json::Map<String, serde_json::Value>")]
pub struct Attribute {
    /// Sub-path under the mount, e.g. `config/connection`.
    pub target_uri: String,
    /// Apply only when the mount is created by this run.
    pub oneshot: bool,
    /// The body written to the target.
    pub values: BTreeMap<String, String>,
    expanded: bool,
}

impl Attribute {
    pub fn new(target_uri: impl Into<String>) -> Self {
        Self {
            target_uri: target_uri.into(),
            oneshot: false,
            values: BTreeMap::new(),
            expanded: false,
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn into_oneshot(mut self) -> Self {
        self.oneshot = true;
        self
    }

    /// Whether file references have already been expanded.
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub(crate) fn mark_expanded(&mut self) {
        self.expanded = true;
    }

    /// The full path of this attribute beneath `mount`.
    pub fn full_path(&self, mount: &str) -> String {
        format!("{}/{}", mount, self.target_uri.trim_start_matches('/'))
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for Attribute {
    type Error = String;

    fn try_from(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let mut attribute = Attribute::new(String::new());

        for (key, value) in map {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => String::new(),
                other => {
                    return Err(format!(
                        "attribute '{key}' must be a scalar value, found {other}"
                    ))
                }
            };

            match key.as_str() {
                ATTRIBUTE_URI_KEY => attribute.target_uri = value,
                ATTRIBUTE_ONESHOT_KEY => attribute.oneshot = true,
                _ => {
                    attribute.values.insert(key, value);
                }
            }
        }

        Ok(attribute)
    }
}

// ============================================================================
// Auth backends and secret engines
// ============================================================================

/// An authentication backend mount.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Auth {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(alias = "config")]
    pub attributes: Vec<Attribute>,
}

impl Auth {
    /// The mount path without surrounding slashes.
    pub fn mount_path(&self) -> String {
        trim_mount(&self.path)
    }
}

/// A secret engine mount.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Backend {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(with = "humantime_serde")]
    pub default_lease_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub max_lease_ttl: Duration,
    #[serde(alias = "config")]
    pub attributes: Vec<Attribute>,
}

impl Backend {
    /// The mount path without surrounding slashes.
    pub fn mount_path(&self) -> String {
        trim_mount(&self.path)
    }
}

fn trim_mount(path: &str) -> String {
    path.trim_start_matches('/').trim_end_matches('/').to_string()
}

// ============================================================================
// Users
// ============================================================================

/// Username and password credentials, for users and for logging in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

/// A token to issue through the token auth backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TokenSpec {
    pub id: Option<String>,
    pub display_name: String,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    pub max_uses: u32,
}

/// A privileged identity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct User {
    /// Auth mount the user lives under; defaults by authentication method.
    pub path: String,
    pub userpass: Option<UserCredentials>,
    #[serde(alias = "usertoken")]
    pub token: Option<TokenSpec>,
    pub policies: Vec<String>,
}

/// The authentication method a user carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAuth<'a> {
    UserPass(&'a UserCredentials),
    Token(&'a TokenSpec),
}

impl User {
    /// A human-readable identifier for logs and errors.
    pub fn name(&self) -> String {
        match (&self.userpass, &self.token) {
            (Some(creds), _) if !creds.username.is_empty() => creds.username.clone(),
            (_, Some(token)) if !token.display_name.is_empty() => token.display_name.clone(),
            _ if !self.path.is_empty() => self.path.clone(),
            _ => "<unnamed>".to_string(),
        }
    }

    /// The auth mount, falling back to the default for the method.
    pub fn mount_path(&self, auth: &UserAuth<'_>) -> String {
        let path = trim_mount(&self.path);
        if !path.is_empty() {
            return path;
        }
        match auth {
            UserAuth::UserPass(_) => DEFAULT_USERPASS_PATH.to_string(),
            UserAuth::Token(_) => DEFAULT_TOKEN_PATH.to_string(),
        }
    }

    /// Declared policies, or the `none` placeholder.
    pub fn effective_policies(&self) -> Vec<String> {
        if self.policies.is_empty() {
            vec![NO_POLICIES.to_string()]
        } else {
            self.policies.clone()
        }
    }

    /// Comma-joined policy list.
    pub fn policy_list(&self) -> String {
        self.effective_policies().join(",")
    }
}

// ============================================================================
// Secrets and policies
// ============================================================================

/// A static secret written verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Secret {
    pub path: String,
    pub values: serde_json::Map<String, serde_json::Value>,
}

/// A policy discovered on disk. The file name, extension included, is the
/// policy name and the content is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyFile {
    pub name: String,
    pub path: PathBuf,
}

impl PolicyFile {
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let name = path.file_name()?.to_str()?.to_string();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            path: path.to_path_buf(),
        })
    }
}

// ============================================================================
// Resource set
// ============================================================================

/// The schema of one resource file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceFile {
    pub auths: Vec<Auth>,
    pub backends: Vec<Backend>,
    pub users: Vec<User>,
    pub secrets: Vec<Secret>,
}

/// The merged desired state for a run.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    pub auths: Vec<Auth>,
    pub policies: Vec<PolicyFile>,
    pub users: Vec<User>,
    pub backends: Vec<Backend>,
    pub secrets: Vec<Secret>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parsed file. Duplicates are kept; the later write wins at
    /// the remote end.
    pub fn merge(&mut self, file: ResourceFile) {
        self.auths.extend(file.auths);
        self.backends.extend(file.backends);
        self.users.extend(file.users);
        self.secrets.extend(file.secrets);
    }

    pub fn is_empty(&self) -> bool {
        self.auths.is_empty()
            && self.policies.is_empty()
            && self.users.is_empty()
            && self.backends.is_empty()
            && self.secrets.is_empty()
    }
}
