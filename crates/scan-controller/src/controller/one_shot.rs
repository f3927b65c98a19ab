//! One-shot mode: the scan owns a single `Job` that runs to completion once.

use crate::controller::naming::ChildNaming;
use crate::controller::ownership::link_owner;
use crate::controller::status::{one_shot_completion, persist_status};
use crate::controller::types::{Context, Error, Result};
use crate::crds::{ClusterScan, ClusterScanStatus};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument};

/// Ensure the `<name>-job` child exists and reflect its outcome into status.
///
/// Uses the same error policy as the recurring routine: a concurrent create
/// is success, and any lookup failure other than not-found is returned.
#[instrument(skip(scan, ctx), fields(scan = %scan.name_any(), namespace = ?scan.namespace()))]
pub async fn reconcile_one_shot(scan: &ClusterScan, ctx: &Context) -> Result<ClusterScanStatus> {
    let namespace = scan.namespace().ok_or(Error::MissingObjectKey)?;
    let mut job = build_job(scan, &namespace);
    link_owner(scan, &mut job.metadata)?;

    let found = ensure_job(&job, &namespace, ctx).await?;
    let completion = one_shot_completion(found.as_ref());

    persist_status(scan, completion, None, ctx).await
}

/// Desired `Job` for a scan. Only the pod template is reused; the template's
/// own metadata and Job-level settings are dropped.
#[must_use]
pub fn build_job(scan: &ClusterScan, namespace: &str) -> Job {
    let template = scan
        .spec
        .job_template
        .spec
        .as_ref()
        .map(|spec| spec.template.clone())
        .unwrap_or_default();

    Job {
        metadata: ObjectMeta {
            name: Some(ChildNaming::job_name(scan)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            template,
            ..Default::default()
        }),
        status: None,
    }
}

async fn ensure_job(job: &Job, namespace: &str, ctx: &Context) -> Result<Option<Job>> {
    let name = job.name_any();

    match ctx.store.get_job(namespace, &name).await {
        Ok(existing) => {
            debug!(job = %name, "Job already exists, leaving it unchanged");
            Ok(Some(existing))
        }
        Err(e) if e.is_not_found() => {
            match ctx.store.create_job(namespace, job).await {
                Ok(_) => info!(job = %name, "Created Job"),
                Err(e) if e.is_already_exists() => {
                    debug!(job = %name, "Job was created concurrently");
                }
                Err(e) => {
                    error!(job = %name, error = %e, "Unable to create Job");
                    return Err(e.into());
                }
            }
            Ok(None)
        }
        Err(e) => {
            error!(job = %name, error = %e, "Unable to look up Job");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::ClusterScanSpec;
    use k8s_openapi::api::batch::v1::JobTemplateSpec;
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
    use std::collections::BTreeMap;

    fn pod_template() -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(BTreeMap::from([("app".to_string(), "scanner".to_string())])),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "scanner".to_string(),
                    image: Some("scanner:1.0".to_string()),
                    ..Default::default()
                }],
                restart_policy: Some("Never".to_string()),
                ..Default::default()
            }),
        }
    }

    fn scan_with(job_template: JobTemplateSpec) -> ClusterScan {
        let mut scan = ClusterScan::new(
            "oneoff",
            ClusterScanSpec {
                schedule: String::new(),
                job_template,
            },
        );
        scan.metadata.namespace = Some("ns1".to_string());
        scan
    }

    #[test]
    fn job_keeps_only_the_pod_template() {
        let scan = scan_with(JobTemplateSpec {
            metadata: Some(ObjectMeta {
                annotations: Some(BTreeMap::from([(
                    "dropped".to_string(),
                    "true".to_string(),
                )])),
                ..Default::default()
            }),
            spec: Some(JobSpec {
                backoff_limit: Some(4),
                parallelism: Some(2),
                template: pod_template(),
                ..Default::default()
            }),
        });

        let job = build_job(&scan, "ns1");
        assert_eq!(job.metadata.name.as_deref(), Some("oneoff-job"));
        assert_eq!(job.metadata.namespace.as_deref(), Some("ns1"));
        assert!(job.metadata.annotations.is_none());

        let spec = job.spec.unwrap();
        assert_eq!(spec.template, pod_template());
        assert!(spec.backoff_limit.is_none());
        assert!(spec.parallelism.is_none());
    }

    #[test]
    fn missing_job_spec_yields_empty_pod_template() {
        let scan = scan_with(JobTemplateSpec::default());
        let job = build_job(&scan, "ns1");
        assert_eq!(job.spec.unwrap().template, PodTemplateSpec::default());
    }
}
