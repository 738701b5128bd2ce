use super::{KindReport, ReconcilerConfig, SyncError};
use crate::resources::{ResourceKind, Secret, Validate};
use crate::vault::VaultApi;
use tracing::info;

const KIND: ResourceKind = ResourceKind::Secret;

/// Writes static secrets as declared. Secrets are never read back or pruned.
pub struct SecretReconciler<'a> {
    client: &'a dyn VaultApi,
    config: &'a ReconcilerConfig,
}

impl<'a> SecretReconciler<'a> {
    pub fn new(client: &'a dyn VaultApi, config: &'a ReconcilerConfig) -> Self {
        Self { client, config }
    }

    pub async fn reconcile(
        &self,
        secrets: &mut [Secret],
        report: &mut KindReport,
    ) -> Result<(), SyncError> {
        info!("-> synchronizing the secrets with vault, secrets: {}", secrets.len());

        for secret in secrets.iter_mut() {
            let item = secret.path.clone();
            let outcome = self.apply(secret).await;
            if self.config.tolerate(report, &item, outcome)?.is_some() {
                report.applied += 1;
            }
        }

        Ok(())
    }

    async fn apply(&self, secret: &mut Secret) -> Result<(), SyncError> {
        secret
            .validate()
            .map_err(|e| SyncError::invalid(KIND, &secret.path, e))?;

        info!("[secret: {}] adding the secret", secret.path);
        self.client
            .write_secret(&secret.path, &secret.values)
            .await
            .map_err(|e| SyncError::remote(KIND, &secret.path, "write secret", e))
    }
}
