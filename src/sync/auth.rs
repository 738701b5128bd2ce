use super::prune::{prune, undeclared};
use super::{push_attribute, KindReport, ReconcilerConfig, SyncError};
use crate::resources::{Auth, ResourceKind, Validate};
use crate::vault::VaultApi;
use std::collections::HashSet;
use tracing::info;

const KIND: ResourceKind = ResourceKind::Auth;

/// Auth mounts that are never pruned.
pub const BUILTIN_AUTH_MOUNTS: &[&str] = &["token"];

/// Converges mounted auth backends and their configuration.
pub struct AuthReconciler<'a> {
    client: &'a dyn VaultApi,
    config: &'a ReconcilerConfig,
}

impl<'a> AuthReconciler<'a> {
    pub fn new(client: &'a dyn VaultApi, config: &'a ReconcilerConfig) -> Self {
        Self { client, config }
    }

    pub async fn reconcile(&self, auths: &mut [Auth], report: &mut KindReport) -> Result<(), SyncError> {
        info!("-> synchronizing the auth backends, {} backends", auths.len());

        let declared: HashSet<String> = auths.iter().map(Auth::mount_path).collect();

        for auth in auths.iter_mut() {
            let item = auth.path.clone();
            let outcome = self.apply(auth, report).await;
            self.config.tolerate(report, &item, outcome)?;
        }

        if self.config.full_sync {
            let remote = self.client.list_auth_mounts().await;
            let remote = remote.map_err(|e| SyncError::remote(KIND, "*", "list auth mounts", e));
            let Some(mounts) = self.config.tolerate(report, "*", remote)? else {
                return Ok(());
            };

            let client = self.client;
            let candidates = undeclared(mounts.keys(), &declared, BUILTIN_AUTH_MOUNTS);
            prune(self.config, report, candidates, move |path| async move {
                client
                    .unmount_auth(&path)
                    .await
                    .map_err(|e| SyncError::remote(KIND, &path, "unmount", e))
            })
            .await?;
        }

        Ok(())
    }

    async fn apply(&self, auth: &mut Auth, report: &mut KindReport) -> Result<(), SyncError> {
        auth.validate()
            .map_err(|e| SyncError::invalid(KIND, &auth.path, e))?;

        let path = auth.mount_path();
        let mounts = self
            .client
            .list_auth_mounts()
            .await
            .map_err(|e| SyncError::remote(KIND, &path, "list auth mounts", e))?;

        if mounts.contains_key(&path) {
            info!("[auth: {path}] already mounted, skipping to configuration");
        } else {
            info!("[auth: {path}] type: {} is not mounted, attempting to mount now", auth.kind);
            self.client
                .mount_auth(&path, &auth.kind, &auth.description)
                .await
                .map_err(|e| SyncError::remote(KIND, &path, "mount", e))?;
            report.applied += 1;
        }

        for attribute in &auth.attributes {
            let uri = format!("auth/{}", attribute.full_path(&path));
            info!("[auth->config: {uri}] applying configuration to auth");
            let outcome = push_attribute(self.client, KIND, &uri, attribute).await;
            if self.config.tolerate(report, &uri, outcome)?.is_some() {
                report.applied += 1;
            }
        }

        Ok(())
    }
}
