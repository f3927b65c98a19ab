//! In-memory [`ScanStore`] used by tests.
//!
//! Behaves like the API server where the reconcile routines can observe it:
//! names are unique per namespace on create, status writes are conditional on
//! resourceVersion, and deleting a scan removes the children it controls the
//! way the garbage collector would. Failures can be queued per operation.

use super::{ScanStore, StoreError, StoreResult};
use crate::controller::ownership::owned_by;
use crate::crds::{ClusterScan, ClusterScanStatus};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{CronJob, CronJobStatus, Job, JobStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ErrorResponse;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Operations that can be counted or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetScan,
    UpdateScanStatus,
    GetCronJob,
    CreateCronJob,
    GetJob,
    CreateJob,
}

/// Failure to return from the next call of a [`StoreOp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    AlreadyExists,
    Conflict,
    Unavailable,
}

type Key = (String, String);

#[derive(Default)]
struct State {
    scans: BTreeMap<Key, ClusterScan>,
    cron_jobs: BTreeMap<Key, CronJob>,
    jobs: BTreeMap<Key, Job>,
    failures: HashMap<StoreOp, VecDeque<FailureKind>>,
    calls: HashMap<StoreOp, usize>,
    next_version: u64,
}

impl State {
    fn begin(&mut self, op: StoreOp) -> Option<FailureKind> {
        *self.calls.entry(op).or_default() += 1;
        self.failures.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn stamp(&mut self, meta: &mut ObjectMeta, namespace: &str) {
        self.next_version += 1;
        meta.namespace = Some(namespace.to_string());
        meta.resource_version = Some(self.next_version.to_string());
        if meta.uid.is_none() {
            meta.uid = Some(format!("00000000-0000-0000-0000-{:012}", self.next_version));
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryScanStore {
    state: Arc<Mutex<State>>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn injected(kind: FailureKind, object_kind: &'static str, namespace: &str, name: &str) -> StoreError {
    match kind {
        FailureKind::NotFound => StoreError::NotFound {
            kind: object_kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        FailureKind::AlreadyExists => StoreError::AlreadyExists {
            kind: object_kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        FailureKind::Conflict => StoreError::Conflict {
            kind: object_kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            message: "the object has been modified".to_string(),
        },
        FailureKind::Unavailable => StoreError::Backend(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "store unavailable".to_string(),
            reason: "ServiceUnavailable".to_string(),
            code: 503,
        })),
    }
}

fn not_found(object_kind: &'static str, namespace: &str, name: &str) -> StoreError {
    injected(FailureKind::NotFound, object_kind, namespace, name)
}

impl MemoryScanStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a scan as if applied by a user. Assigns uid and resourceVersion.
    pub async fn insert_scan(&self, mut scan: ClusterScan) -> ClusterScan {
        let mut state = self.state.lock().await;
        let namespace = scan
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let name = scan.metadata.name.clone().unwrap_or_default();
        state.stamp(&mut scan.metadata, &namespace);
        state.scans.insert(key(&namespace, &name), scan.clone());
        scan
    }

    /// Store a `CronJob` directly, bypassing the controller
    pub async fn insert_cron_job(&self, namespace: &str, mut cron_job: CronJob) -> CronJob {
        let mut state = self.state.lock().await;
        let name = cron_job.metadata.name.clone().unwrap_or_default();
        state.stamp(&mut cron_job.metadata, namespace);
        state.cron_jobs.insert(key(namespace, &name), cron_job.clone());
        cron_job
    }

    /// Store a `Job` directly, bypassing the controller
    pub async fn insert_job(&self, namespace: &str, mut job: Job) -> Job {
        let mut state = self.state.lock().await;
        let name = job.metadata.name.clone().unwrap_or_default();
        state.stamp(&mut job.metadata, namespace);
        state.jobs.insert(key(namespace, &name), job.clone());
        job
    }

    /// Delete a scan and cascade to the children it controls.
    /// Returns `false` when the scan did not exist.
    pub async fn delete_scan(&self, namespace: &str, name: &str) -> bool {
        let mut state = self.state.lock().await;
        let Some(scan) = state.scans.remove(&key(namespace, name)) else {
            return false;
        };
        state.cron_jobs.retain(|_, cj| !owned_by(&scan, &cj.metadata));
        state.jobs.retain(|_, job| !owned_by(&scan, &job.metadata));
        true
    }

    pub async fn scan(&self, namespace: &str, name: &str) -> Option<ClusterScan> {
        self.state.lock().await.scans.get(&key(namespace, name)).cloned()
    }

    pub async fn cron_job(&self, namespace: &str, name: &str) -> Option<CronJob> {
        self.state
            .lock()
            .await
            .cron_jobs
            .get(&key(namespace, name))
            .cloned()
    }

    pub async fn job(&self, namespace: &str, name: &str) -> Option<Job> {
        self.state.lock().await.jobs.get(&key(namespace, name)).cloned()
    }

    pub async fn cron_job_count(&self) -> usize {
        self.state.lock().await.cron_jobs.len()
    }

    pub async fn job_count(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    /// Simulate the `CronJob` controller reporting on a child
    pub async fn set_cron_job_status(&self, namespace: &str, name: &str, status: CronJobStatus) -> bool {
        let mut state = self.state.lock().await;
        match state.cron_jobs.get_mut(&key(namespace, name)) {
            Some(cron_job) => {
                cron_job.status = Some(status);
                true
            }
            None => false,
        }
    }

    /// Simulate the Job controller reporting on a child
    pub async fn set_job_status(&self, namespace: &str, name: &str, status: JobStatus) -> bool {
        let mut state = self.state.lock().await;
        match state.jobs.get_mut(&key(namespace, name)) {
            Some(job) => {
                job.status = Some(status);
                true
            }
            None => false,
        }
    }

    /// Make the next call of `op` fail with `kind`. Calls queue in order.
    pub async fn fail_next(&self, op: StoreOp, kind: FailureKind) {
        self.state
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(kind);
    }

    /// Number of times `op` has been called, including failed calls
    pub async fn calls(&self, op: StoreOp) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ScanStore for MemoryScanStore {
    async fn get_scan(&self, namespace: &str, name: &str) -> StoreResult<ClusterScan> {
        let mut state = self.state.lock().await;
        if let Some(kind) = state.begin(StoreOp::GetScan) {
            return Err(injected(kind, "ClusterScan", namespace, name));
        }
        state
            .scans
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("ClusterScan", namespace, name))
    }

    async fn update_scan_status(
        &self,
        scan: &ClusterScan,
        status: &ClusterScanStatus,
    ) -> StoreResult<ClusterScan> {
        let namespace = scan.metadata.namespace.clone().unwrap_or_default();
        let name = scan.metadata.name.clone().unwrap_or_default();

        let mut state = self.state.lock().await;
        if let Some(kind) = state.begin(StoreOp::UpdateScanStatus) {
            return Err(injected(kind, "ClusterScan", &namespace, &name));
        }

        state.next_version += 1;
        let next_version = state.next_version.to_string();
        let stored = state
            .scans
            .get_mut(&key(&namespace, &name))
            .ok_or_else(|| not_found("ClusterScan", &namespace, &name))?;

        if scan.metadata.resource_version.is_some()
            && scan.metadata.resource_version != stored.metadata.resource_version
        {
            return Err(injected(FailureKind::Conflict, "ClusterScan", &namespace, &name));
        }

        stored.status = Some(status.clone());
        stored.metadata.resource_version = Some(next_version);
        Ok(stored.clone())
    }

    async fn get_cron_job(&self, namespace: &str, name: &str) -> StoreResult<CronJob> {
        let mut state = self.state.lock().await;
        if let Some(kind) = state.begin(StoreOp::GetCronJob) {
            return Err(injected(kind, "CronJob", namespace, name));
        }
        state
            .cron_jobs
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("CronJob", namespace, name))
    }

    async fn create_cron_job(&self, namespace: &str, cron_job: &CronJob) -> StoreResult<CronJob> {
        let name = cron_job.metadata.name.clone().unwrap_or_default();
        let mut state = self.state.lock().await;
        if let Some(kind) = state.begin(StoreOp::CreateCronJob) {
            return Err(injected(kind, "CronJob", namespace, &name));
        }
        if state.cron_jobs.contains_key(&key(namespace, &name)) {
            return Err(injected(FailureKind::AlreadyExists, "CronJob", namespace, &name));
        }

        let mut created = cron_job.clone();
        state.stamp(&mut created.metadata, namespace);
        state.cron_jobs.insert(key(namespace, &name), created.clone());
        Ok(created)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> StoreResult<Job> {
        let mut state = self.state.lock().await;
        if let Some(kind) = state.begin(StoreOp::GetJob) {
            return Err(injected(kind, "Job", namespace, name));
        }
        state
            .jobs
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("Job", namespace, name))
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> StoreResult<Job> {
        let name = job.metadata.name.clone().unwrap_or_default();
        let mut state = self.state.lock().await;
        if let Some(kind) = state.begin(StoreOp::CreateJob) {
            return Err(injected(kind, "Job", namespace, &name));
        }
        if state.jobs.contains_key(&key(namespace, &name)) {
            return Err(injected(FailureKind::AlreadyExists, "Job", namespace, &name));
        }

        let mut created = job.clone();
        state.stamp(&mut created.metadata, namespace);
        state.jobs.insert(key(namespace, &name), created.clone());
        Ok(created)
    }
}
