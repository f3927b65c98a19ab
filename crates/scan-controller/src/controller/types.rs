use crate::controller::config::ControllerConfig;
use crate::store::{ScanStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to link {child} to owning ClusterScan {owner}: {reason}")]
    OwnerLink {
        owner: String,
        child: String,
        reason: String,
    },

    #[error("ClusterScan is missing a name or namespace")]
    MissingObjectKey,

    #[error("Reconcile did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Shared state handed to every reconcile
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn ScanStore>,
    pub config: Arc<ControllerConfig>,
}

impl Context {
    #[must_use]
    pub fn new(store: Arc<dyn ScanStore>, config: Arc<ControllerConfig>) -> Self {
        Self { store, config }
    }
}
