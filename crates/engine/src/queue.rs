//! Asynchronous job queue hosting scan executions.
//!
//! Jobs move PENDING -> RUNNING -> {COMPLETED, FAILED, CANCELLED}; progress
//! is monotonically non-decreasing and reaches 100 before COMPLETED.
//! Cancellation is cooperative: the flag is observed between stages, and
//! in-flight I/O inside a stage is never interrupted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use config::QueueConfig;
use futures::future::BoxFuture;
use model::{ScanRequest, ScanType};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::orchestrator::{Orchestrator, RunOptions};
use crate::state::{GraphState, Stage};

/// Caller-supplied replacement for the default orchestrator run.
pub type OrchestratorCallback = Arc<
    dyn Fn(ScanRequest) -> BoxFuture<'static, Result<GraphState, EngineError>> + Send + Sync,
>;

/// Lifecycle status of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether the job can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// The runtime record of one scan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub scan_id: String,
    pub request: ScanRequest,
    pub status: JobStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Terminal graph state; absent for cancelled jobs
    pub result: Option<GraphState>,
}

/// Status snapshot returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusSnapshot {
    pub job_id: String,
    pub scan_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
    pub repository: String,
    pub scan_type: ScanType,
}

struct RunningJob {
    cancel: CancellationToken,
    progress: Arc<AtomicU8>,
}

/// Tracks and executes scan jobs.
pub struct JobQueue {
    orchestrator: Arc<Orchestrator>,
    jobs: RwLock<HashMap<String, Job>>,
    running: RwLock<HashMap<String, RunningJob>>,
    permits: Arc<Semaphore>,
}

impl JobQueue {
    #[must_use]
    pub fn new(config: &QueueConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            jobs: RwLock::new(HashMap::new()),
            running: RwLock::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
        }
    }

    /// Create a job and start executing it in the background. Returns
    /// `(scan_id, job_id)` immediately.
    pub async fn submit(
        self: &Arc<Self>,
        request: ScanRequest,
        callback: Option<OrchestratorCallback>,
    ) -> (String, String) {
        let scan_id = format!("{}_{}", request.scan_type, short_id());
        let job_id = format!("job_{}", short_id());
        info!(scan_id = %scan_id, job_id = %job_id, repo = %request.repo_url, "initiating scan");

        let job = Job {
            job_id: job_id.clone(),
            scan_id: scan_id.clone(),
            request: request.clone(),
            status: JobStatus::Pending,
            progress: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
        };
        self.jobs.write().await.insert(job_id.clone(), job);

        let cancel = CancellationToken::new();
        let progress = Arc::new(AtomicU8::new(0));
        self.running.write().await.insert(
            job_id.clone(),
            RunningJob {
                cancel: cancel.clone(),
                progress: progress.clone(),
            },
        );

        let queue = Arc::clone(self);
        let spawned_job_id = job_id.clone();
        let spawned_scan_id = scan_id.clone();
        tokio::spawn(async move {
            queue
                .execute(spawned_job_id, spawned_scan_id, request, callback, cancel, progress)
                .await;
        });

        (scan_id, job_id)
    }

    async fn execute(
        self: Arc<Self>,
        job_id: String,
        scan_id: String,
        request: ScanRequest,
        callback: Option<OrchestratorCallback>,
        cancel: CancellationToken,
        progress: Arc<AtomicU8>,
    ) {
        let Ok(_permit) = self.permits.clone().acquire_owned().await else {
            // the semaphore is never closed while the queue is alive
            return;
        };

        if cancel.is_cancelled() {
            self.finish(&job_id, JobStatus::Cancelled, None, None, &progress)
                .await;
            return;
        }

        self.update_job(&job_id, |job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        })
        .await;

        let outcome = match callback {
            Some(callback) => callback(request).await,
            None => {
                let observer_progress = progress.clone();
                self.orchestrator
                    .run_with(
                        request,
                        RunOptions {
                            scan_id: Some(scan_id),
                            cancel: cancel.clone(),
                            observer: Some(Box::new(move |stage, _| {
                                observer_progress
                                    .fetch_max(stage_progress(stage), Ordering::SeqCst);
                            })),
                        },
                    )
                    .await
            }
        };

        match outcome {
            Ok(state) if state.error.is_none() => {
                progress.store(100, Ordering::SeqCst);
                self.finish(&job_id, JobStatus::Completed, None, Some(state), &progress)
                    .await;
                info!(job = %job_id, "job completed");
            }
            Ok(state) => {
                let message = state
                    .error
                    .clone()
                    .unwrap_or_else(|| "scan failed".to_string());
                self.finish(
                    &job_id,
                    JobStatus::Failed,
                    Some(message.clone()),
                    Some(state),
                    &progress,
                )
                .await;
                warn!(job = %job_id, error = %message, "job failed");
            }
            Err(EngineError::Cancelled) => {
                self.finish(&job_id, JobStatus::Cancelled, None, None, &progress)
                    .await;
                info!(job = %job_id, "job cancelled");
            }
            Err(e) => {
                self.finish(
                    &job_id,
                    JobStatus::Failed,
                    Some(e.to_string()),
                    None,
                    &progress,
                )
                .await;
                warn!(job = %job_id, error = %e, "job failed");
            }
        }
    }

    async fn finish(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<String>,
        result: Option<GraphState>,
        progress: &AtomicU8,
    ) {
        let progress_value = progress.load(Ordering::SeqCst);
        self.update_job(job_id, |job| {
            job.status = status;
            job.completed_at = Some(Utc::now());
            job.error = error;
            job.result = result;
            job.progress = job.progress.max(progress_value);
        })
        .await;
        self.running.write().await.remove(job_id);
    }

    async fn update_job<F: FnOnce(&mut Job)>(&self, job_id: &str, mutate: F) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            mutate(job);
        }
    }

    /// Status snapshot by job id.
    pub async fn status(&self, job_id: &str) -> Option<JobStatusSnapshot> {
        let job = self.jobs.read().await.get(job_id).cloned()?;
        let progress = match self.running.read().await.get(job_id) {
            Some(running) => job.progress.max(running.progress.load(Ordering::SeqCst)),
            None => job.progress,
        };

        let duration_seconds = job.started_at.map(|started| {
            let end = job.completed_at.unwrap_or_else(Utc::now);
            (end - started).num_milliseconds() as f64 / 1000.0
        });

        Some(JobStatusSnapshot {
            job_id: job.job_id,
            scan_id: job.scan_id,
            status: job.status,
            progress,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            duration_seconds,
            error_message: job.error,
            repository: job.request.repo_url,
            scan_type: job.request.scan_type,
        })
    }

    /// Status snapshot by scan id.
    pub async fn status_by_scan(&self, scan_id: &str) -> Option<JobStatusSnapshot> {
        let job_id = self.job_id_for_scan(scan_id).await?;
        self.status(&job_id).await
    }

    /// The job id owning a scan id.
    pub async fn job_id_for_scan(&self, scan_id: &str) -> Option<String> {
        self.jobs
            .read()
            .await
            .values()
            .find(|job| job.scan_id == scan_id)
            .map(|job| job.job_id.clone())
    }

    /// Terminal graph state of a job, when one was produced.
    pub async fn result(&self, job_id: &str) -> Option<GraphState> {
        self.jobs.read().await.get(job_id)?.result.clone()
    }

    /// Signal cancellation. Returns false when the job is not running.
    pub async fn cancel(&self, job_id: &str) -> bool {
        let running = self.running.read().await;
        if let Some(job) = running.get(job_id) {
            job.cancel.cancel();
            info!(job = %job_id, "cancellation requested");
            return true;
        }
        false
    }

    /// Delete terminal jobs older than `max_age`. Returns the count.
    pub async fn sweep_old(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !(job.status.is_terminal() && job.created_at < cutoff));
        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, "swept old jobs");
        }
        removed
    }

    /// Number of tracked jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether the queue tracks no jobs.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Progress checkpoint reached after a stage completes.
fn stage_progress(stage: Stage) -> u8 {
    match stage {
        Stage::StartScan => 10,
        Stage::FetchCode => 30,
        Stage::ParseCode => 45,
        Stage::StaticAnalysis => 60,
        Stage::ImpactAnalysis | Stage::ProjectScanning => 75,
        Stage::LlmAnalysis => 85,
        _ => 95,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progress_is_monotone_along_pr_trajectory() {
        let trajectory = [
            Stage::StartScan,
            Stage::FetchCode,
            Stage::ParseCode,
            Stage::StaticAnalysis,
            Stage::ImpactAnalysis,
            Stage::LlmAnalysis,
            Stage::Reporting,
        ];
        let mut last = 0;
        for stage in trajectory {
            let progress = stage_progress(stage);
            assert!(progress >= last, "{stage} regressed progress");
            last = progress;
        }
        assert!(last < 100, "100 is reserved for terminal completion");
    }

    #[test]
    fn test_short_ids_are_eight_chars() {
        let id = short_id();
        assert_eq!(id.len(), 8);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }
}
