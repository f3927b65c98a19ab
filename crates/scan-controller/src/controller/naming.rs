use crate::crds::ClusterScan;
use kube::ResourceExt;

const CRON_JOB_SUFFIX: &str = "-cronjob";
const JOB_SUFFIX: &str = "-job";

/// Deterministic names for the child workloads of a `ClusterScan`.
/// Children always live in the scan's namespace.
pub struct ChildNaming;

impl ChildNaming {
    /// `<scan-name>-cronjob`
    pub fn cron_job_name(scan: &ClusterScan) -> String {
        format!("{}{CRON_JOB_SUFFIX}", scan.name_any())
    }

    /// `<scan-name>-job`
    pub fn job_name(scan: &ClusterScan) -> String {
        format!("{}{JOB_SUFFIX}", scan.name_any())
    }
}
