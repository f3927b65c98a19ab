//! Controller owner references from a `ClusterScan` to its child workload.
//!
//! The reference gives the garbage collector a parent to cascade deletion
//! from and lets `Controller::owns` map child events back to the scan.

use crate::controller::types::{Error, Result};
use crate::crds::ClusterScan;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};

/// Stamp `child` with a controller reference to `parent`.
///
/// Fails when the parent has no name or uid yet, or when the child is
/// already controlled by a different object.
pub fn link_owner(parent: &ClusterScan, child: &mut ObjectMeta) -> Result<()> {
    let child_name = child.name.clone().unwrap_or_default();
    let mut owner = parent.controller_owner_ref(&()).ok_or_else(|| Error::OwnerLink {
        owner: parent.name_any(),
        child: child_name.clone(),
        reason: "owner has no name or uid".to_string(),
    })?;
    owner.block_owner_deletion = Some(true);

    let owners = child.owner_references.get_or_insert_with(Vec::new);
    if let Some(existing) = owners.iter().find(|o| o.controller == Some(true)) {
        if existing.uid == owner.uid {
            return Ok(());
        }
        return Err(Error::OwnerLink {
            owner: parent.name_any(),
            child: child_name,
            reason: format!(
                "already controlled by {} {}",
                existing.kind, existing.name
            ),
        });
    }

    owners.push(owner);
    Ok(())
}

/// Whether `child` carries a controller reference to `parent`
#[must_use]
pub fn owned_by(parent: &ClusterScan, child: &ObjectMeta) -> bool {
    let Some(uid) = parent.meta().uid.as_deref() else {
        return false;
    };
    child.owner_references.as_ref().is_some_and(|owners| {
        owners
            .iter()
            .any(|o| o.controller == Some(true) && o.uid == uid)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::ClusterScanSpec;
    use k8s_openapi::api::batch::v1::JobTemplateSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    fn scan(name: &str, uid: Option<&str>) -> ClusterScan {
        let mut scan = ClusterScan::new(
            name,
            ClusterScanSpec {
                schedule: String::new(),
                job_template: JobTemplateSpec::default(),
            },
        );
        scan.metadata.namespace = Some("ns1".to_string());
        scan.metadata.uid = uid.map(str::to_string);
        scan
    }

    fn child_meta() -> ObjectMeta {
        ObjectMeta {
            name: Some("scan-a-job".to_string()),
            namespace: Some("ns1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn link_sets_controller_reference() {
        let parent = scan("scan-a", Some("uid-a"));
        let mut meta = child_meta();
        link_owner(&parent, &mut meta).unwrap();

        let owners = meta.owner_references.as_ref().unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].api_version, "scans.platform/v1");
        assert_eq!(owners[0].kind, "ClusterScan");
        assert_eq!(owners[0].name, "scan-a");
        assert_eq!(owners[0].uid, "uid-a");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(owners[0].block_owner_deletion, Some(true));
        assert!(owned_by(&parent, &meta));
    }

    #[test]
    fn link_is_idempotent_for_same_owner() {
        let parent = scan("scan-a", Some("uid-a"));
        let mut meta = child_meta();
        link_owner(&parent, &mut meta).unwrap();
        link_owner(&parent, &mut meta).unwrap();
        assert_eq!(meta.owner_references.unwrap().len(), 1);
    }

    #[test]
    fn link_fails_without_uid() {
        let parent = scan("scan-a", None);
        let mut meta = child_meta();
        let err = link_owner(&parent, &mut meta).unwrap_err();
        assert!(matches!(err, Error::OwnerLink { .. }));
        assert!(meta.owner_references.is_none());
    }

    #[test]
    fn link_fails_when_controlled_by_another_object() {
        let parent = scan("scan-a", Some("uid-a"));
        let mut meta = child_meta();
        meta.owner_references = Some(vec![OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "other".to_string(),
            uid: "uid-other".to_string(),
            controller: Some(true),
            block_owner_deletion: None,
        }]);

        let err = link_owner(&parent, &mut meta).unwrap_err();
        assert!(err.to_string().contains("already controlled by Deployment other"));
        assert!(!owned_by(&parent, &meta));
    }
}
