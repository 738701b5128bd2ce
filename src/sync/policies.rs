use super::prune::{prune, undeclared};
use super::{KindReport, ReconcilerConfig, SyncError};
use crate::resources::{PolicyFile, ResourceKind};
use crate::vault::VaultApi;
use std::collections::HashSet;
use tracing::info;

const KIND: ResourceKind = ResourceKind::Policy;

/// Policies that are never pruned.
pub const BUILTIN_POLICIES: &[&str] = &["default", "root"];

/// Writes every policy file, overwriting whatever Vault holds.
pub struct PolicyReconciler<'a> {
    client: &'a dyn VaultApi,
    config: &'a ReconcilerConfig,
}

impl<'a> PolicyReconciler<'a> {
    pub fn new(client: &'a dyn VaultApi, config: &'a ReconcilerConfig) -> Self {
        Self { client, config }
    }

    pub async fn reconcile(
        &self,
        policies: &[PolicyFile],
        report: &mut KindReport,
    ) -> Result<(), SyncError> {
        info!("-> synchronizing the vault policies, {} files", policies.len());

        for policy in policies {
            let outcome = self.apply(policy).await;
            if self.config.tolerate(report, &policy.name, outcome)?.is_some() {
                info!(
                    "[policy: {}] successfully applied the policy, filename: {}",
                    policy.name,
                    policy.path.display()
                );
                report.applied += 1;
            }
        }

        if self.config.full_sync {
            let declared: HashSet<String> = policies.iter().map(|p| p.name.clone()).collect();
            let remote = self.client.list_policies().await;
            let remote = remote.map_err(|e| SyncError::remote(KIND, "*", "list policies", e));
            let Some(names) = self.config.tolerate(report, "*", remote)? else {
                return Ok(());
            };

            let client = self.client;
            let candidates = undeclared(&names, &declared, BUILTIN_POLICIES);
            prune(self.config, report, candidates, move |name| async move {
                client
                    .delete_policy(&name)
                    .await
                    .map_err(|e| SyncError::remote(KIND, &name, "delete", e))
            })
            .await?;
        }

        Ok(())
    }

    async fn apply(&self, policy: &PolicyFile) -> Result<(), SyncError> {
        let content = tokio::fs::read_to_string(&policy.path)
            .await
            .map_err(|source| SyncError::PolicyFile {
                path: policy.path.clone(),
                source,
            })?;

        self.client
            .set_policy(&policy.name, &content)
            .await
            .map_err(|e| SyncError::remote(KIND, &policy.name, "apply policy", e))
    }
}
