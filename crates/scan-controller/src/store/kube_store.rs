use super::{ScanStore, StoreError, StoreResult};
use crate::crds::{ClusterScan, ClusterScanStatus};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// [`ScanStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeScanStore {
    client: Client,
}

impl KubeScanStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn scans(&self, namespace: &str) -> Api<ClusterScan> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn cron_jobs(&self, namespace: &str) -> Api<CronJob> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Merge patch replacing every status field.
///
/// Unset fields are sent as explicit `null`; a merge patch leaves omitted keys
/// untouched. Carrying the observed resourceVersion turns the patch into a
/// conditional write, so a concurrent status writer surfaces as 409.
fn status_patch(scan: &ClusterScan, status: &ClusterScanStatus) -> serde_json::Value {
    let mut patch = json!({
        "status": {
            "completionStatus": status.completion_status,
            "lastScheduleTime": status.last_schedule_time,
            "lastRunTime": status.last_run_time,
        }
    });
    if let Some(resource_version) = scan.resource_version() {
        patch["metadata"] = json!({ "resourceVersion": resource_version });
    }
    patch
}

#[async_trait]
impl ScanStore for KubeScanStore {
    async fn get_scan(&self, namespace: &str, name: &str) -> StoreResult<ClusterScan> {
        self.scans(namespace)
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube("ClusterScan", namespace, name, e))
    }

    async fn update_scan_status(
        &self,
        scan: &ClusterScan,
        status: &ClusterScanStatus,
    ) -> StoreResult<ClusterScan> {
        let namespace = scan.namespace().unwrap_or_default();
        let name = scan.name_any();

        let status_patch = status_patch(scan, status);

        debug!(
            scan = %name,
            namespace = %namespace,
            "Patching ClusterScan status"
        );

        self.scans(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await
            .map_err(|e| StoreError::from_kube("ClusterScan", &namespace, &name, e))
    }

    async fn get_cron_job(&self, namespace: &str, name: &str) -> StoreResult<CronJob> {
        self.cron_jobs(namespace)
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube("CronJob", namespace, name, e))
    }

    async fn create_cron_job(&self, namespace: &str, cron_job: &CronJob) -> StoreResult<CronJob> {
        let name = cron_job.name_any();
        self.cron_jobs(namespace)
            .create(&PostParams::default(), cron_job)
            .await
            .map_err(|e| StoreError::from_kube("CronJob", namespace, &name, e))
    }

    async fn get_job(&self, namespace: &str, name: &str) -> StoreResult<Job> {
        self.jobs(namespace)
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube("Job", namespace, name, e))
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> StoreResult<Job> {
        let name = job.name_any();
        self.jobs(namespace)
            .create(&PostParams::default(), job)
            .await
            .map_err(|e| StoreError::from_kube("Job", namespace, &name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::ClusterScanSpec;
    use chrono::Utc;
    use k8s_openapi::api::batch::v1::JobTemplateSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn scan_with_version(resource_version: Option<&str>) -> ClusterScan {
        let mut scan = ClusterScan::new(
            "nightly",
            ClusterScanSpec {
                schedule: String::new(),
                job_template: JobTemplateSpec::default(),
            },
        );
        scan.metadata.resource_version = resource_version.map(str::to_string);
        scan
    }

    #[test]
    fn status_patch_clears_unset_schedule_time() {
        let status = ClusterScanStatus {
            completion_status: Some("Running".to_string()),
            last_schedule_time: None,
            last_run_time: Some(Time(Utc::now())),
        };

        let patch = status_patch(&scan_with_version(Some("42")), &status);
        let body = patch["status"].as_object().unwrap();

        assert!(body.contains_key("lastScheduleTime"));
        assert!(body["lastScheduleTime"].is_null());
        assert_eq!(body["completionStatus"], "Running");
        assert!(body["lastRunTime"].is_string());
        assert_eq!(patch["metadata"]["resourceVersion"], "42");
    }

    #[test]
    fn status_patch_without_version_is_unconditional() {
        let patch = status_patch(&scan_with_version(None), &ClusterScanStatus::default());
        assert!(patch.get("metadata").is_none());
        assert!(patch["status"]["completionStatus"].is_null());
    }
}
