//! Status derivation shared by both convergence routines.
//!
//! `status` is always recomputed from the child observed in this reconcile
//! and the current time. The previously persisted status is only read to
//! log completion transitions.

use crate::controller::types::{Context, Result};
use crate::crds::{ClusterScan, ClusterScanStatus, CompletionStatus};
use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use tracing::{debug, error, info};

/// `Active` when the `CronJob` lists at least one running Job
#[must_use]
pub fn recurring_completion(found: Option<&CronJob>) -> CompletionStatus {
    let active = found
        .and_then(|cron_job| cron_job.status.as_ref())
        .and_then(|status| status.active.as_ref())
        .map_or(0, Vec::len);

    if active > 0 {
        CompletionStatus::Active
    } else {
        CompletionStatus::NotActive
    }
}

/// Success wins over failure; neither means still running
#[must_use]
pub fn one_shot_completion(found: Option<&Job>) -> CompletionStatus {
    let status = found.and_then(|job| job.status.as_ref());
    let succeeded = status.and_then(|s| s.succeeded).unwrap_or(0);
    let failed = status.and_then(|s| s.failed).unwrap_or(0);

    if succeeded > 0 {
        CompletionStatus::Completed
    } else if failed > 0 {
        CompletionStatus::Failed
    } else {
        CompletionStatus::Running
    }
}

/// Build the status for this reconcile from the derived completion, the
/// schedule time reported by the child (if any) and the reconcile time.
#[must_use]
pub fn observed_status(
    completion: CompletionStatus,
    last_schedule_time: Option<Time>,
    now: DateTime<Utc>,
) -> ClusterScanStatus {
    ClusterScanStatus {
        completion_status: Some(completion.to_string()),
        last_schedule_time,
        last_run_time: Some(Time(now)),
    }
}

/// Derive and persist the status for `scan`, returning what was written.
pub async fn persist_status(
    scan: &ClusterScan,
    completion: CompletionStatus,
    last_schedule_time: Option<Time>,
    ctx: &Context,
) -> Result<ClusterScanStatus> {
    let previous = scan.status.as_ref();
    let status = observed_status(completion, last_schedule_time, Utc::now());

    let previous_completion = previous.and_then(|s| s.completion_status.as_deref());
    if previous_completion != status.completion_status.as_deref() {
        info!(
            scan = %scan.name_any(),
            from = previous_completion.unwrap_or("<unset>"),
            to = %completion,
            "ClusterScan completion status changed"
        );
    } else {
        debug!(scan = %scan.name_any(), status = %completion, "Refreshing ClusterScan status");
    }

    if let Err(e) = ctx.store.update_scan_status(scan, &status).await {
        error!(scan = %scan.name_any(), error = %e, "Failed to update ClusterScan status");
        return Err(e.into());
    }

    Ok(status)
}
