//! ALFA Media Share - Batch Reports
//!
//! Per-version outcomes for bulk operations. A failed unit never aborts its
//! siblings; it is recorded with enough identity to retry just that unit.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{error, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::asset::AssetVersionName;
use crate::error::{ShareError, ShareResult};

/// Identity of one asset version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitId {
    pub asset_id: Uuid,
    pub version_name: AssetVersionName,
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset_id, self.version_name)
    }
}

/// A unit that failed, with its error
#[derive(Debug)]
pub struct UnitFailure {
    pub unit: UnitId,
    pub error: ShareError,
}

/// Batch outcome
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<UnitFailure>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// True when every unit succeeded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Units worth resubmitting
    pub fn retry_units(&self) -> Vec<UnitId> {
        self.failed.iter().map(|f| f.unit).collect()
    }

    pub(crate) fn push_failure(&mut self, unit: UnitId, error: ShareError) {
        warn!("Unit {} failed: {}", unit, error);
        self.failed.push(UnitFailure { unit, error });
    }

    /// Report units whose worker never returned
    pub(crate) fn push_lost<I: IntoIterator<Item = UnitId>>(&mut self, units: I) {
        for unit in units {
            self.push_failure(unit, ShareError::TaskFailed("worker lost".into()));
        }
    }
}

/// Run blocking crypto jobs on the blocking pool, at most `max_concurrency` at once
pub(crate) async fn run_bounded<T, F>(jobs: Vec<(UnitId, F)>, max_concurrency: usize) -> BatchReport<T>
where
    T: Send + 'static,
    F: FnOnce() -> ShareResult<T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut set = JoinSet::new();
    let mut pending = HashMap::with_capacity(jobs.len());

    for (slot, (unit, job)) in jobs.into_iter().enumerate() {
        pending.insert(slot, unit);
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => tokio::task::spawn_blocking(job)
                    .await
                    .map_err(ShareError::from)
                    .and_then(|r| r),
                Err(_) => Err(ShareError::Cancelled),
            };
            (slot, result)
        });
    }

    let mut report = BatchReport::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((slot, result)) => {
                let Some(unit) = pending.remove(&slot) else { continue };
                match result {
                    Ok(value) => report.succeeded.push(value),
                    Err(e) => report.push_failure(unit, e),
                }
            }
            Err(e) => error!("Batch worker lost: {}", e),
        }
    }

    report.push_lost(pending.into_values());
    report
}
