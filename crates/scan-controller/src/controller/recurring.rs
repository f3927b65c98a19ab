//! Recurring mode: the scan owns a single `CronJob` that carries its schedule.

use crate::controller::naming::ChildNaming;
use crate::controller::ownership::link_owner;
use crate::controller::status::{persist_status, recurring_completion};
use crate::controller::types::{Context, Error, Result};
use crate::crds::{ClusterScan, ClusterScanStatus};
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument};

/// Ensure the `<name>-cronjob` child exists and reflect its activity into status.
///
/// An existing `CronJob` is never updated, even if the scan's schedule or
/// template changed since it was created.
#[instrument(skip(scan, ctx), fields(scan = %scan.name_any(), namespace = ?scan.namespace()))]
pub async fn reconcile_recurring(
    scan: &ClusterScan,
    schedule: &str,
    ctx: &Context,
) -> Result<ClusterScanStatus> {
    let namespace = scan.namespace().ok_or(Error::MissingObjectKey)?;
    let mut cron_job = build_cron_job(scan, schedule, &namespace);
    link_owner(scan, &mut cron_job.metadata)?;

    let found = ensure_cron_job(&cron_job, &namespace, ctx).await?;

    // Only the pre-create lookup counts; a CronJob created just now has no
    // active Jobs yet.
    let completion = recurring_completion(found.as_ref());
    let last_schedule_time = found
        .as_ref()
        .and_then(|cj| cj.status.as_ref())
        .and_then(|s| s.last_schedule_time.clone());

    persist_status(scan, completion, last_schedule_time, ctx).await
}

/// Desired `CronJob` for a scan: its schedule and job template, verbatim
#[must_use]
pub fn build_cron_job(scan: &ClusterScan, schedule: &str, namespace: &str) -> CronJob {
    CronJob {
        metadata: ObjectMeta {
            name: Some(ChildNaming::cron_job_name(scan)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(CronJobSpec {
            schedule: schedule.to_string(),
            job_template: scan.spec.job_template.clone(),
            ..Default::default()
        }),
        status: None,
    }
}

/// Look up the child by name and create it when missing.
///
/// Returns the child found by the lookup, or `None` when it had to be created.
async fn ensure_cron_job(
    cron_job: &CronJob,
    namespace: &str,
    ctx: &Context,
) -> Result<Option<CronJob>> {
    let name = cron_job.name_any();

    match ctx.store.get_cron_job(namespace, &name).await {
        Ok(existing) => {
            debug!(cron_job = %name, "CronJob already exists, leaving it unchanged");
            Ok(Some(existing))
        }
        Err(e) if e.is_not_found() => {
            match ctx.store.create_cron_job(namespace, cron_job).await {
                Ok(_) => info!(cron_job = %name, "Created CronJob"),
                Err(e) if e.is_already_exists() => {
                    debug!(cron_job = %name, "CronJob was created concurrently");
                }
                Err(e) => {
                    error!(cron_job = %name, error = %e, "Unable to create CronJob");
                    return Err(e.into());
                }
            }
            Ok(None)
        }
        Err(e) => {
            error!(cron_job = %name, error = %e, "Unable to look up CronJob");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::ClusterScanSpec;
    use k8s_openapi::api::batch::v1::{JobSpec, JobTemplateSpec};
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
    use std::collections::BTreeMap;

    fn template() -> JobTemplateSpec {
        JobTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(BTreeMap::from([("app".to_string(), "scanner".to_string())])),
                ..Default::default()
            }),
            spec: Some(JobSpec {
                backoff_limit: Some(2),
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "scanner".to_string(),
                            image: Some("scanner:1.0".to_string()),
                            ..Default::default()
                        }],
                        restart_policy: Some("Never".to_string()),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
        }
    }

    #[test]
    fn cron_job_copies_schedule_and_template_verbatim() {
        let mut scan = ClusterScan::new(
            "nightly",
            ClusterScanSpec {
                schedule: "0 2 * * *".to_string(),
                job_template: template(),
            },
        );
        scan.metadata.namespace = Some("ns1".to_string());

        let cron_job = build_cron_job(&scan, "0 2 * * *", "ns1");
        assert_eq!(cron_job.metadata.name.as_deref(), Some("nightly-cronjob"));
        assert_eq!(cron_job.metadata.namespace.as_deref(), Some("ns1"));

        let spec = cron_job.spec.unwrap();
        assert_eq!(spec.schedule, "0 2 * * *");
        assert_eq!(spec.job_template, template());
        assert!(spec.suspend.is_none());
    }
}
