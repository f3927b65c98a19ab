//! `ClusterScan` Custom Resource Definition

use k8s_openapi::api::batch::v1::JobTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(group = "scans.platform", version = "v1", kind = "ClusterScan")]
#[kube(namespaced)]
#[kube(status = "ClusterScanStatus")]
#[kube(shortname = "cscan")]
#[kube(printcolumn = r#"{"name":"Schedule","type":"string","jsonPath":".spec.schedule"}"#)]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.completionStatus"}"#)]
#[kube(printcolumn = r#"{"name":"Last Run","type":"date","jsonPath":".status.lastRunTime"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ClusterScanSpec {
    /// Cron expression for recurring scans. Empty means the scan runs once.
    #[serde(default)]
    pub schedule: String,

    /// Template for the workload. Copied verbatim into the child `CronJob`;
    /// a one-shot `Job` only reuses its pod template.
    pub job_template: JobTemplateSpec,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterScanStatus {
    /// Summary of the child workload, see [`CompletionStatus`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_status: Option<String>,

    /// Last time the child `CronJob` reported firing its schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_schedule_time: Option<Time>,

    /// Last time a reconcile produced or observed the child workload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_time: Option<Time>,
}

/// Observed state of the child workload as written to `status.completionStatus`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Recurring: the `CronJob` has at least one active Job
    Active,
    /// Recurring: no active Jobs
    NotActive,
    /// One-shot: neither succeeded nor failed yet
    Running,
    /// One-shot: at least one pod succeeded
    Completed,
    /// One-shot: no success and at least one failed pod
    Failed,
}

impl CompletionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::NotActive => "Not Active",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
