//! The reconciliation engine.
//!
//! [`Synchronizer`] walks the resource kinds in a fixed order (auth
//! backends, policies, users, secret engines, secrets) and hands each kind
//! to its reconciler. Every reconciler re-reads remote state itself; nothing
//! is cached between kinds or between runs.
//!
//! Per-item failures go through [`ReconcilerConfig::tolerate`]: in tolerant
//! mode they are logged and recorded in the [`SyncReport`], otherwise the
//! first one aborts the run.

mod auth;
mod backends;
mod error;
mod policies;
mod prune;
mod secrets;
mod users;

pub use auth::{AuthReconciler, BUILTIN_AUTH_MOUNTS};
pub use backends::{BackendReconciler, BUILTIN_SECRET_MOUNTS};
pub use error::*;
pub use policies::{PolicyReconciler, BUILTIN_POLICIES};
pub use secrets::SecretReconciler;
pub use users::UserReconciler;

use crate::resources::{Attribute, ResourceKind, ResourceSet};
use crate::vault::{Method, VaultApi, VaultError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Kinds in the order they are synchronized. Policies precede the users
/// that reference them; mounts precede their configuration.
pub const SYNC_ORDER: [ResourceKind; 5] = [
    ResourceKind::Auth,
    ResourceKind::Policy,
    ResourceKind::User,
    ResourceKind::Backend,
    ResourceKind::Secret,
];

// ============================================================================
// Configuration
// ============================================================================

/// Options fixed for the duration of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub skip_auths: bool,
    pub skip_policies: bool,
    pub skip_users: bool,
    pub skip_backends: bool,
    pub skip_secrets: bool,
    /// Report remote resources that are no longer declared.
    pub full_sync: bool,
    /// Remove undeclared resources. Only honoured together with `full_sync`.
    pub delete: bool,
    /// Log and skip failing items instead of aborting.
    pub ignore_errors: bool,
}

impl ReconcilerConfig {
    /// Reject option combinations that leave nothing to do.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.skip_auths && self.skip_backends && self.skip_policies && self.skip_users {
            return Err(SyncError::Config(
                "you are skipping all the resources, what exactly are we syncing".to_string(),
            ));
        }
        if self.delete && !self.full_sync {
            warn!("deletion requested without full sync, nothing will be removed");
        }
        Ok(())
    }

    pub fn deletes_allowed(&self) -> bool {
        self.full_sync && self.delete
    }

    pub fn skips(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Auth => self.skip_auths,
            ResourceKind::Policy => self.skip_policies,
            ResourceKind::User => self.skip_users,
            ResourceKind::Backend => self.skip_backends,
            ResourceKind::Secret => self.skip_secrets,
        }
    }

    /// Either surface a failed step or, in tolerant mode, record it and
    /// let the caller move on. `Ok(None)` means the step was skipped.
    pub(crate) fn tolerate<T>(
        &self,
        report: &mut KindReport,
        item: &str,
        result: Result<T, SyncError>,
    ) -> Result<Option<T>, SyncError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.ignore_errors => {
                let error = format!("{:#}", anyhow::Error::new(e));
                warn!(kind = %report.kind, item, %error, "skipping after failure");
                report.failures.push(ItemFailure {
                    item: item.to_string(),
                    error,
                });
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// A failure that was logged and skipped in tolerant mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub item: String,
    pub error: String,
}

/// Outcome of one reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindReport {
    pub kind: ResourceKind,
    pub skipped: bool,
    /// Successful remote writes.
    pub applied: usize,
    /// Remote resources found without a declaration.
    pub drifted: Vec<String>,
    pub removed: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl KindReport {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            skipped: false,
            applied: 0,
            drifted: Vec::new(),
            removed: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub kinds: Vec<KindReport>,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn kind(&self, kind: ResourceKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.kinds.iter().flat_map(|k| k.failures.iter())
    }

    pub fn applied(&self) -> usize {
        self.kinds.iter().map(|k| k.applied).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

// ============================================================================
// Synchronizer
// ============================================================================

/// Runs every reconciler against one Vault.
pub struct Synchronizer {
    client: Arc<dyn VaultApi>,
    config: ReconcilerConfig,
}

impl Synchronizer {
    /// Fails with [`SyncError::Config`] before any remote call when the
    /// options are contradictory.
    pub fn new(client: Arc<dyn VaultApi>, config: ReconcilerConfig) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Converge Vault towards `resources`.
    ///
    /// File references in `resources` are expanded in place along the way.
    pub async fn run(&self, resources: &mut ResourceSet) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let client = &*self.client;
        let config = &self.config;
        let mut report = SyncReport::default();

        for kind in SYNC_ORDER {
            let mut kind_report = KindReport::new(kind);
            if config.skips(kind) {
                info!("skipping the synchronization of {kind}s");
                kind_report.skipped = true;
                report.kinds.push(kind_report);
                continue;
            }

            match kind {
                ResourceKind::Auth => {
                    AuthReconciler::new(client, config)
                        .reconcile(&mut resources.auths, &mut kind_report)
                        .await?
                }
                ResourceKind::Policy => {
                    PolicyReconciler::new(client, config)
                        .reconcile(&resources.policies, &mut kind_report)
                        .await?
                }
                ResourceKind::User => {
                    UserReconciler::new(client, config)
                        .reconcile(&mut resources.users, &mut kind_report)
                        .await?
                }
                ResourceKind::Backend => {
                    BackendReconciler::new(client, config)
                        .reconcile(&mut resources.backends, &mut kind_report)
                        .await?
                }
                ResourceKind::Secret => {
                    SecretReconciler::new(client, config)
                        .reconcile(&mut resources.secrets, &mut kind_report)
                        .await?
                }
            }

            report.kinds.push(kind_report);
        }

        report.elapsed = started.elapsed();
        info!(
            elapsed = ?report.elapsed,
            applied = report.applied(),
            failures = report.failures().count(),
            "synchronization complete"
        );
        Ok(report)
    }
}

/// Push one attribute to `full_path`. Anything but 204 is a failure
/// carrying the response body.
pub(crate) async fn push_attribute(
    client: &dyn VaultApi,
    kind: ResourceKind,
    full_path: &str,
    attribute: &Attribute,
) -> Result<(), SyncError> {
    const ACTION: &str = "apply configuration";

    let response = client
        .apply_config(Method::PUT, full_path, &attribute.values)
        .await
        .map_err(|e| SyncError::remote(kind, full_path, ACTION, e))?;

    if !response.is_no_content() {
        return Err(SyncError::remote(
            kind,
            full_path,
            ACTION,
            VaultError::Status {
                method: Method::PUT,
                path: full_path.to_string(),
                status: response.status,
                body: response.body,
            },
        ));
    }
    Ok(())
}
