use super::{KindReport, ReconcilerConfig, SyncError};
use crate::resources::{ResourceKind, User, Validate};
use crate::vault::VaultApi;
use tracing::info;

const KIND: ResourceKind = ResourceKind::User;

/// Creates or updates users. Users are never pruned.
pub struct UserReconciler<'a> {
    client: &'a dyn VaultApi,
    config: &'a ReconcilerConfig,
}

impl<'a> UserReconciler<'a> {
    pub fn new(client: &'a dyn VaultApi, config: &'a ReconcilerConfig) -> Self {
        Self { client, config }
    }

    pub async fn reconcile(&self, users: &mut [User], report: &mut KindReport) -> Result<(), SyncError> {
        info!("-> synchronizing the vault users, users: {}", users.len());

        for user in users.iter_mut() {
            let item = user.name();
            let outcome = self.apply(user).await;
            if self.config.tolerate(report, &item, outcome)?.is_some() {
                report.applied += 1;
            }
        }

        Ok(())
    }

    async fn apply(&self, user: &mut User) -> Result<(), SyncError> {
        user.validate()
            .map_err(|e| SyncError::invalid(KIND, &user.name(), e))?;

        let auth = user
            .auth()
            .map_err(|e| SyncError::invalid(KIND, &user.name(), e))?;
        let mount = user.mount_path(&auth);
        let policies = user.effective_policies();
        let item = format!("{mount}/{}", user.name());

        info!("[user: {item}] ensuring user, policies: {}", policies.join(","));
        self.client
            .upsert_user(&mount, auth, &policies)
            .await
            .map_err(|e| SyncError::remote(KIND, &item, "upsert user", e))
    }
}
