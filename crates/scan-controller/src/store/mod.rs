//! Object store boundary used by the reconcile routines.
//!
//! The routines never talk to the API server directly. They go through
//! [`ScanStore`], which has a production implementation over `kube::Api`
//! ([`KubeScanStore`]) and an in-memory one for tests (`MemoryScanStore`,
//! behind the `testing` feature).

use crate::crds::{ClusterScan, ClusterScanStatus};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use thiserror::Error;

mod kube_store;
#[cfg(any(test, feature = "testing"))]
mod memory;

pub use kube_store::KubeScanStore;
#[cfg(any(test, feature = "testing"))]
pub use memory::{FailureKind, MemoryScanStore, StoreOp};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a [`ScanStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// Optimistic concurrency failure (stale resourceVersion)
    #[error("conflicting write to {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
        message: String,
    },

    #[error("store request failed: {0}")]
    Backend(#[source] kube::Error),
}

impl StoreError {
    /// Classify a `kube` client error for the object `kind namespace/name`.
    #[must_use]
    pub fn from_kube(kind: &'static str, namespace: &str, name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 404 => Self::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(response)
                if response.code == 409 && response.reason == "AlreadyExists" =>
            {
                Self::AlreadyExists {
                    kind,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }
            }
            kube::Error::Api(response) if response.code == 409 => Self::Conflict {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: response.message,
            },
            other => Self::Backend(other),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Typed access to `ClusterScan` objects and their child workloads.
///
/// Every call names its namespace explicitly; implementations hold no
/// per-reconcile state.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Fetch a `ClusterScan` by namespaced name
    async fn get_scan(&self, namespace: &str, name: &str) -> StoreResult<ClusterScan>;

    /// Write the status sub-resource. Fails with [`StoreError::Conflict`] when
    /// `scan` carries a stale resourceVersion.
    async fn update_scan_status(
        &self,
        scan: &ClusterScan,
        status: &ClusterScanStatus,
    ) -> StoreResult<ClusterScan>;

    async fn get_cron_job(&self, namespace: &str, name: &str) -> StoreResult<CronJob>;

    async fn create_cron_job(&self, namespace: &str, cron_job: &CronJob) -> StoreResult<CronJob>;

    async fn get_job(&self, namespace: &str, name: &str) -> StoreResult<Job>;

    async fn create_job(&self, namespace: &str, job: &Job) -> StoreResult<Job>;
}
