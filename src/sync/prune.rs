//! Drift detection shared by the reconcilers that support full sync.

use super::{KindReport, ReconcilerConfig, SyncError};
use std::collections::HashSet;
use std::future::Future;
use tracing::{info, warn};

/// Remote names that are neither declared nor built in, in remote order.
pub(crate) fn undeclared<'a, I>(remote: I, declared: &HashSet<String>, builtins: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    remote
        .into_iter()
        .filter(|name| !builtins.contains(&name.as_str()) && !declared.contains(*name))
        .cloned()
        .collect()
}

/// Report every candidate as drift and, only when both full sync and
/// delete are set, remove it with `remove`.
pub(crate) async fn prune<F, Fut>(
    config: &ReconcilerConfig,
    report: &mut KindReport,
    candidates: Vec<String>,
    remove: F,
) -> Result<(), SyncError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<(), SyncError>>,
{
    let delete = config.deletes_allowed();

    for name in candidates {
        warn!("[{}: {}] no longer referenced, delete: {}", report.kind, name, delete);
        report.drifted.push(name.clone());

        if !delete {
            continue;
        }

        let outcome = remove(name.clone()).await;
        if config.tolerate(report, &name, outcome)?.is_some() {
            info!("[{}: {}] removed", report.kind, name);
            report.removed.push(name);
        }
    }

    Ok(())
}
