use super::prune::{prune, undeclared};
use super::{push_attribute, KindReport, ReconcilerConfig, SyncError};
use crate::resources::{Backend, ResourceKind, Validate};
use crate::vault::{MountTtl, VaultApi};
use std::collections::HashSet;
use tracing::{info, warn};

const KIND: ResourceKind = ResourceKind::Backend;

/// Secret engine mounts that are never pruned.
pub const BUILTIN_SECRET_MOUNTS: &[&str] = &["secret", "cubbyhole", "sys", "identity"];

/// Converges mounted secret engines and their configuration.
///
/// Attributes marked oneshot are only written when this run created the
/// mount.
pub struct BackendReconciler<'a> {
    client: &'a dyn VaultApi,
    config: &'a ReconcilerConfig,
}

impl<'a> BackendReconciler<'a> {
    pub fn new(client: &'a dyn VaultApi, config: &'a ReconcilerConfig) -> Self {
        Self { client, config }
    }

    pub async fn reconcile(
        &self,
        backends: &mut [Backend],
        report: &mut KindReport,
    ) -> Result<(), SyncError> {
        info!("-> synchronizing the backends, backend: {}", backends.len());

        let declared: HashSet<String> = backends.iter().map(Backend::mount_path).collect();

        for backend in backends.iter_mut() {
            let item = backend.path.clone();
            let outcome = self.apply(backend, report).await;
            self.config.tolerate(report, &item, outcome)?;
        }

        if self.config.full_sync {
            let remote = self.client.list_secret_mounts().await;
            let remote = remote.map_err(|e| SyncError::remote(KIND, "*", "list mounts", e));
            let Some(mounts) = self.config.tolerate(report, "*", remote)? else {
                return Ok(());
            };

            let client = self.client;
            let candidates = undeclared(mounts.keys(), &declared, BUILTIN_SECRET_MOUNTS);
            prune(self.config, report, candidates, move |path| async move {
                client
                    .unmount_secret(&path)
                    .await
                    .map_err(|e| SyncError::remote(KIND, &path, "unmount", e))
            })
            .await?;
        }

        Ok(())
    }

    async fn apply(&self, backend: &mut Backend, report: &mut KindReport) -> Result<(), SyncError> {
        backend
            .validate()
            .map_err(|e| SyncError::invalid(KIND, &backend.path, e))?;

        let path = backend.mount_path();
        let mounts = self
            .client
            .list_secret_mounts()
            .await
            .map_err(|e| SyncError::remote(KIND, &path, "list mounts", e))?;

        let existing = mounts.get(&path);
        match existing {
            Some(mount) if mount.kind != backend.kind => {
                warn!(
                    "[backend: {path}] mounted as type: {}, declared as: {}, leaving the mount as is",
                    mount.kind, backend.kind
                );
            }
            Some(_) => info!("[backend: {path}] already exist, moving to configuration"),
            None => {
                info!("[backend: {path}] creating backend");
                let ttl = MountTtl {
                    default_lease: backend.default_lease_ttl,
                    max_lease: backend.max_lease_ttl,
                };
                self.client
                    .mount_secret(&path, &backend.kind, &backend.description, ttl)
                    .await
                    .map_err(|e| SyncError::remote(KIND, &path, "mount", e))?;
                report.applied += 1;
            }
        }

        let was_mounted = existing.is_some();
        for attribute in &backend.attributes {
            let uri = attribute.full_path(&path);
            if was_mounted && attribute.oneshot {
                info!("[backend: {uri}] skipping the config, as it's a oneshot setting");
                continue;
            }

            info!("[backend->config: {uri}] applying configuration for backend");
            let outcome = push_attribute(self.client, KIND, &uri, attribute).await;
            if self.config.tolerate(report, &uri, outcome)?.is_some() {
                report.applied += 1;
            }
        }

        Ok(())
    }
}
