//! Periodic maintenance over the cache and vault.
//!
//! Each task is individually callable and returns a structured summary; a
//! scheduler drives the default cadences. One task failing never prevents
//! the others from running.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use config::MaintenanceConfig;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cache::RepoCache;
use crate::project::ProjectStore;
use crate::vault::TokenVault;

const CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(6 * 60 * 60);
const SYNC_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);
const HEALTH_INTERVAL: StdDuration = StdDuration::from_secs(4 * 60 * 60);

/// Outcome of one maintenance task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// Structured summary of one maintenance task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub timestamp: DateTime<Utc>,
    pub status: TaskStatus,
    /// Per-task counters (cleaned caches, synced repos, ...)
    pub counts: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

impl TaskReport {
    fn completed(counts: BTreeMap<String, i64>) -> Self {
        Self {
            timestamp: Utc::now(),
            status: TaskStatus::Completed,
            counts,
            error: None,
            recommendations: Vec::new(),
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status: TaskStatus::Failed,
            counts: BTreeMap::new(),
            error: Some(error.into()),
            recommendations: Vec::new(),
        }
    }
}

/// Combined summary of a full maintenance cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub cleanup: TaskReport,
    pub sync: TaskReport,
    pub health: TaskReport,
    pub status: TaskStatus,
}

/// Periodic maintenance jobs for the repository cache and token vault.
pub struct Maintenance {
    store: Arc<ProjectStore>,
    vault: Arc<TokenVault>,
    cache: Arc<RepoCache>,
    config: MaintenanceConfig,
    quota_mb: u64,
}

impl Maintenance {
    #[must_use]
    pub fn new(
        store: Arc<ProjectStore>,
        vault: Arc<TokenVault>,
        cache: Arc<RepoCache>,
        config: MaintenanceConfig,
        quota_mb: u64,
    ) -> Self {
        Self {
            store,
            vault,
            cache,
            config,
            quota_mb,
        }
    }

    /// Expired-cache sweep, expired-token sweep and quota enforcement.
    pub async fn cleanup_job(&self) -> TaskReport {
        info!("starting cache cleanup job");

        let cleaned_caches = self.cache.sweep_expired(&self.store).await;
        let cleaned_tokens = self.vault.sweep_expired(&self.store).await;
        let quota_evictions = self.cache.enforce_quota(&self.store).await;

        let mut counts = BTreeMap::new();
        counts.insert("cleaned_caches".to_string(), cleaned_caches as i64);
        counts.insert("cleaned_tokens".to_string(), cleaned_tokens as i64);
        counts.insert("quota_evictions".to_string(), quota_evictions as i64);

        info!(
            cleaned_caches,
            cleaned_tokens, quota_evictions, "cleanup job completed"
        );
        TaskReport::completed(counts)
    }

    /// Re-sync repositories with auto-sync enabled that have not synced
    /// within the configured age, in bounded batches with pacing.
    pub async fn auto_sync_job(&self) -> TaskReport {
        info!(batch = self.config.sync_batch_size, "starting auto-sync job");

        let cutoff = Utc::now() - Duration::hours(self.config.auto_sync_min_age_hours);
        let mut candidates: Vec<_> = self
            .store
            .all()
            .await
            .into_iter()
            .filter(|p| {
                p.auto_sync_enabled
                    && p.cached_path.is_some()
                    && p.last_synced_at.is_some_and(|at| at < cutoff)
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.last_synced_at
                .cmp(&b.last_synced_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(self.config.sync_batch_size);

        let total = candidates.len();
        let mut synced: i64 = 0;
        let mut failed: i64 = 0;
        for project in candidates {
            match self.cache.acquire(&self.store, project.id).await {
                Ok(_) => {
                    synced += 1;
                }
                Err(e) => {
                    error!(project = %project.name, error = %e, "auto-sync failed");
                    failed += 1;
                }
            }
            // pacing between syncs so remote hosts are not hammered
            tokio::time::sleep(StdDuration::from_millis(self.config.sync_delay_ms)).await;
        }

        let mut counts = BTreeMap::new();
        counts.insert("candidates".to_string(), total as i64);
        counts.insert("synced".to_string(), synced);
        counts.insert("failed".to_string(), failed);

        if total > 0 && synced == 0 {
            warn!(failed, "auto-sync job failed for every candidate");
            let mut report = TaskReport::failed("all candidate syncs failed");
            report.counts = counts;
            return report;
        }

        info!(synced, failed, "auto-sync job completed");
        TaskReport::completed(counts)
    }

    /// Snapshot cache/token health counters and emit recommendations when
    /// thresholds are exceeded.
    pub async fn health_check_job(&self) -> TaskReport {
        info!("starting cache health check");

        let now = Utc::now();
        let projects = self.store.all().await;

        let total_projects = projects.len() as i64;
        let cached_projects = projects.iter().filter(|p| p.cached_path.is_some()).count() as i64;
        let total_cache_mb: i64 = projects
            .iter()
            .filter(|p| p.cached_path.is_some())
            .map(|p| p.cache_size_mb as i64)
            .sum();
        let projects_with_tokens =
            projects.iter().filter(|p| p.encrypted_token.is_some()).count() as i64;
        let expired_caches = projects
            .iter()
            .filter(|p| {
                p.cached_path.is_some() && p.cache_expires_at.is_some_and(|at| at < now)
            })
            .count() as i64;
        let expired_tokens = projects
            .iter()
            .filter(|p| {
                p.encrypted_token.is_some() && p.token_expires_at.is_some_and(|at| at < now)
            })
            .count() as i64;
        let cache_efficiency = if total_projects > 0 {
            cached_projects * 100 / total_projects
        } else {
            0
        };

        let mut counts = BTreeMap::new();
        counts.insert("total_projects".to_string(), total_projects);
        counts.insert("cached_projects".to_string(), cached_projects);
        counts.insert("cache_efficiency_percent".to_string(), cache_efficiency);
        counts.insert("total_cache_size_mb".to_string(), total_cache_mb);
        counts.insert("projects_with_tokens".to_string(), projects_with_tokens);
        counts.insert("expired_caches".to_string(), expired_caches);
        counts.insert("expired_tokens".to_string(), expired_tokens);

        let mut report = TaskReport::completed(counts);
        if expired_caches > 0 {
            report.recommendations.push(format!(
                "Run cleanup job - {expired_caches} expired caches found"
            ));
        }
        if expired_tokens > 0 {
            report.recommendations.push(format!(
                "Token cleanup needed - {expired_tokens} expired tokens found"
            ));
        }
        if total_cache_mb > self.quota_mb as i64 {
            report
                .recommendations
                .push("Cache size over limit - consider quota management".to_string());
        }
        if total_projects > 0 && cache_efficiency < 50 {
            report
                .recommendations
                .push("Low cache efficiency - consider increasing TTL".to_string());
        }

        info!(
            efficiency = cache_efficiency,
            cached_mb = total_cache_mb,
            "health check completed"
        );
        report
    }

    /// All three maintenance tasks back-to-back; intended for daily runs.
    pub async fn run_cycle(&self) -> CycleReport {
        info!("starting full maintenance cycle");
        let started = std::time::Instant::now();

        let cleanup = self.cleanup_job().await;
        let sync = self.auto_sync_job().await;
        let health = self.health_check_job().await;

        let status = if cleanup.status == TaskStatus::Failed
            && sync.status == TaskStatus::Failed
            && health.status == TaskStatus::Failed
        {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };

        let duration = started.elapsed().as_secs_f64();
        info!(duration_seconds = duration, "maintenance cycle completed");
        CycleReport {
            timestamp: Utc::now(),
            duration_seconds: duration,
            cleanup,
            sync,
            health,
            status,
        }
    }

    /// Drive the default cadences until cancelled: cleanup every 6 h,
    /// auto-sync hourly, health check every 4 h.
    pub async fn run_scheduler(&self, cancel: CancellationToken) {
        let mut cleanup = tokio::time::interval(CLEANUP_INTERVAL);
        let mut sync = tokio::time::interval(SYNC_INTERVAL);
        let mut health = tokio::time::interval(HEALTH_INTERVAL);
        // skip the immediate first tick of each interval
        cleanup.tick().await;
        sync.tick().await;
        health.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("maintenance scheduler stopping");
                    return;
                }
                _ = cleanup.tick() => {
                    let report = self.cleanup_job().await;
                    if report.status == TaskStatus::Failed {
                        warn!(error = report.error.as_deref().unwrap_or("unknown"), "cleanup task failed");
                    }
                }
                _ = sync.tick() => {
                    let report = self.auto_sync_job().await;
                    if report.status == TaskStatus::Failed {
                        warn!(error = report.error.as_deref().unwrap_or("unknown"), "auto-sync task failed");
                    }
                }
                _ = health.tick() => {
                    let report = self.health_check_job().await;
                    if report.status == TaskStatus::Failed {
                        warn!(error = report.error.as_deref().unwrap_or("unknown"), "health task failed");
                    }
                }
            }
        }
    }
}
