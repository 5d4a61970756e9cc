//! Thin dispatcher between a request boundary and the job queue.

use std::sync::Arc;

use agents::ReportBundle;
use model::{ScanRequest, ScanType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::EngineError;
use crate::queue::{JobQueue, JobStatusSnapshot};

/// Seconds a PR scan is expected to take.
const PR_SCAN_ESTIMATE_SECS: u64 = 90;

/// Seconds a project scan is expected to take.
const PROJECT_SCAN_ESTIMATE_SECS: u64 = 300;

/// Response to a scan initiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateResponse {
    pub scan_id: String,
    pub job_id: String,
    pub estimated_duration_secs: u64,
}

/// Request validation and dispatch into the queue; status and report
/// retrieval by either id kind.
pub struct ReviewService {
    queue: Arc<JobQueue>,
}

impl ReviewService {
    #[must_use]
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self { queue }
    }

    /// Validate and submit a scan request.
    ///
    /// # Errors
    /// Returns `EngineError::Validation` on a malformed request.
    pub async fn initiate(&self, request: ScanRequest) -> Result<InitiateResponse, EngineError> {
        request
            .validate()
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let estimated_duration_secs = match request.scan_type {
            ScanType::Pr => PR_SCAN_ESTIMATE_SECS,
            ScanType::Project => PROJECT_SCAN_ESTIMATE_SECS,
        };
        let (scan_id, job_id) = self.queue.submit(request, None).await;
        info!(scan_id = %scan_id, job_id = %job_id, "scan dispatched");

        Ok(InitiateResponse {
            scan_id,
            job_id,
            estimated_duration_secs,
        })
    }

    /// The report for a scan. Error scans also carry a (minimal) report;
    /// cancelled or still-running scans do not.
    ///
    /// # Errors
    /// Returns `EngineError::NotFound` when no report exists for the id.
    pub async fn report(&self, scan_id: &str) -> Result<ReportBundle, EngineError> {
        let job_id = self
            .queue
            .job_id_for_scan(scan_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("scan {scan_id}")))?;
        let state = self
            .queue
            .result(&job_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("report for scan {scan_id}")))?;
        state
            .report
            .ok_or_else(|| EngineError::NotFound(format!("report for scan {scan_id}")))
    }

    /// Status by job id or scan id.
    pub async fn status(&self, id: &str) -> Option<JobStatusSnapshot> {
        if let Some(snapshot) = self.queue.status(id).await {
            return Some(snapshot);
        }
        self.queue.status_by_scan(id).await
    }

    /// Cancel by job id or scan id. Returns whether a running job was
    /// signalled.
    pub async fn cancel(&self, id: &str) -> bool {
        if self.queue.cancel(id).await {
            return true;
        }
        if let Some(job_id) = self.queue.job_id_for_scan(id).await {
            return self.queue.cancel(&job_id).await;
        }
        false
    }
}
