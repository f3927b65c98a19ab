use crate::crds::{ClusterScan, ClusterScanStatus};
use crate::health::Readiness;
use crate::store::KubeScanStore;
use futures::StreamExt;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Instrument};

pub mod config;
pub mod mode;
pub mod naming;
pub mod one_shot;
pub mod ownership;
pub mod recurring;
pub mod status;
pub mod types;

// Re-export commonly used items
pub use config::ControllerConfig;
pub use mode::ScanMode;
pub use one_shot::reconcile_one_shot;
pub use recurring::reconcile_recurring;
pub use types::{Context, Error, Result};

/// Reconcile entry point invoked by the controller runtime.
///
/// The object handed in by the runtime is only used for its key; the scan is
/// re-read from the store so status is written against its latest version.
#[instrument(skip(scan, ctx), fields(scan = %scan.name_any(), namespace = ?scan.namespace()))]
pub async fn reconcile_scan(scan: Arc<ClusterScan>, ctx: Arc<Context>) -> Result<Action> {
    let name = scan.name_any();
    let namespace = scan.namespace().ok_or(Error::MissingObjectKey)?;
    let timeout = ctx.config.reconcile_timeout();

    let status = tokio::time::timeout(timeout, converge(&namespace, &name, &ctx))
        .await
        .map_err(|_| Error::Timeout(timeout))??;

    if let Some(status) = status {
        debug!(
            completion = ?status.completion_status,
            "ClusterScan reconciled"
        );
    }

    Ok(ctx
        .config
        .resync()
        .map_or_else(Action::await_change, Action::requeue))
}

/// Fetch the scan, pick its mode and run the matching convergence routine.
///
/// Returns `None` when the scan no longer exists; its child is left to the
/// garbage collector.
pub async fn converge(
    namespace: &str,
    name: &str,
    ctx: &Context,
) -> Result<Option<ClusterScanStatus>> {
    let scan = match ctx.store.get_scan(namespace, name).await {
        Ok(scan) => scan,
        Err(e) if e.is_not_found() => {
            debug!(scan = %name, namespace = %namespace, "ClusterScan is gone, nothing to do");
            return Ok(None);
        }
        Err(e) => {
            error!(scan = %name, namespace = %namespace, error = %e, "Unable to fetch ClusterScan");
            return Err(e.into());
        }
    };

    let mode = ScanMode::select(&scan);
    debug!(scan = %name, mode = mode.as_str(), "Selected reconcile mode");

    let status = match mode {
        ScanMode::Recurring { schedule } => reconcile_recurring(&scan, schedule, ctx).await?,
        ScanMode::OneShot => reconcile_one_shot(&scan, ctx).await?,
    };

    Ok(Some(status))
}

/// Failed reconciles are retried by the runtime after the configured delay
pub fn error_policy(scan: Arc<ClusterScan>, err: &Error, ctx: Arc<Context>) -> Action {
    let delay = ctx.config.error_requeue();
    warn!(
        scan = %scan.name_any(),
        namespace = ?scan.namespace(),
        error = %err,
        retry_in = ?delay,
        "ClusterScan reconciliation failed"
    );
    Action::requeue(delay)
}

/// Run the ClusterScan controller until SIGINT or SIGTERM.
///
/// Watches `ClusterScan` plus the `Job`s and `CronJob`s it owns, so a change
/// to either child re-triggers the owning scan.
#[instrument(skip(client, config, readiness), fields(namespace = ?config.namespace))]
pub async fn run_scan_controller(
    client: Client,
    config: Arc<ControllerConfig>,
    readiness: Readiness,
) -> Result<()> {
    if let Err(validation_error) = config.validate() {
        error!("Configuration validation failed: {}", validation_error);
        return Err(Error::ConfigError(validation_error.to_string()));
    }

    let (scans, jobs, cron_jobs): (Api<ClusterScan>, Api<Job>, Api<CronJob>) =
        match config.namespace.as_deref() {
            Some(namespace) => (
                Api::namespaced(client.clone(), namespace),
                Api::namespaced(client.clone(), namespace),
                Api::namespaced(client.clone(), namespace),
            ),
            None => (
                Api::all(client.clone()),
                Api::all(client.clone()),
                Api::all(client.clone()),
            ),
        };

    let context = Arc::new(Context::new(
        Arc::new(KubeScanStore::new(client)),
        config.clone(),
    ));
    let watcher_config = Config::default().any_semantic();

    info!("Starting ClusterScan controller");
    readiness.mark_ready();

    Controller::new(scans, watcher_config.clone())
        .owns(jobs, watcher_config.clone())
        .owns(cron_jobs, watcher_config)
        .shutdown_on_signal()
        .run(reconcile_scan, error_policy, context)
        .for_each(|reconciliation_result| {
            let span = tracing::info_span!("scan_reconciliation_result");
            async move {
                match reconciliation_result {
                    Ok((object_ref, _action)) => {
                        debug!(resource = %object_ref, "ClusterScan reconciliation successful");
                    }
                    Err(reconciliation_err) => {
                        error!(
                            error = ?reconciliation_err,
                            "ClusterScan reconciliation error"
                        );
                    }
                }
            }
            .instrument(span)
        })
        .await;

    readiness.mark_not_ready();
    info!("ClusterScan controller shutting down");
    Ok(())
}
