/*
 * 5D Labs Scan Controller - Kubernetes Operator for ClusterScan resources
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::doc_markdown)]

//! Scan controller core library
//!
//! Reconciles `ClusterScan` resources into exactly one child workload: a
//! `CronJob` when a schedule is set, a `Job` otherwise. The child is owned by
//! the scan and its live state is summarised back into the scan's status.

pub mod controller;
pub mod crds;
pub mod health;
pub mod store;

// Re-export commonly used types
pub use controller::config::ControllerConfig;
pub use controller::types::{Context, Error, Result};
pub use crds::{ClusterScan, ClusterScanSpec, ClusterScanStatus, CompletionStatus};
pub use store::{KubeScanStore, ScanStore, StoreError};
#[cfg(any(test, feature = "testing"))]
pub use store::MemoryScanStore;
