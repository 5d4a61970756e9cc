//! The persistent per-repository record and its in-memory registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::error::StoreError;

/// Identifier of a registered project.
pub type ProjectId = u64;

/// Per-repository record: display metadata, cache state and token state.
///
/// Rows are mutated only through [`ProjectStore::update`], so readers always
/// observe complete snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Display name, used in cache paths and logs
    pub name: String,
    /// Repository URL (https)
    pub url: String,
    /// Branch probed and cloned by default
    pub default_branch: String,
    pub created_at: DateTime<Utc>,

    // Cache state
    pub cached_path: Option<PathBuf>,
    pub last_commit_hash: Option<String>,
    pub cache_expires_at: Option<DateTime<Utc>>,
    pub cache_size_mb: u64,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub auto_sync_enabled: bool,

    // Token state
    pub encrypted_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub token_last_used_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Fresh record with no cache and no token.
    #[must_use]
    pub fn new(id: ProjectId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            default_branch: "main".to_string(),
            created_at: Utc::now(),
            cached_path: None,
            last_commit_hash: None,
            cache_expires_at: None,
            cache_size_mb: 0,
            last_synced_at: None,
            auto_sync_enabled: false,
            encrypted_token: None,
            token_expires_at: None,
            token_last_used_at: None,
        }
    }

    /// Whether the cache record is present and unexpired.
    #[must_use]
    pub fn is_cache_valid(&self) -> bool {
        self.cached_path.is_some()
            && self
                .cache_expires_at
                .is_some_and(|expires| expires > Utc::now())
    }

    /// Clear all cache bookkeeping fields.
    pub fn clear_cache_fields(&mut self) {
        self.cached_path = None;
        self.cache_expires_at = None;
        self.cache_size_mb = 0;
    }
}

/// In-memory registry of projects.
///
/// Mutation goes through [`update`](Self::update) under the write lock;
/// [`get`](Self::get) and [`all`](Self::all) return cloned snapshots, so a
/// reader never observes a torn row. A per-project mutex map serializes
/// clone/sync work per project while distinct projects proceed in parallel.
#[derive(Debug)]
pub struct ProjectStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
    locks: Mutex<HashMap<ProjectId, Arc<Mutex<()>>>>,
    next_id: AtomicU64,
}

impl ProjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a repository and return its snapshot.
    pub async fn register(&self, name: impl Into<String>, url: impl Into<String>) -> Project {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let project = Project::new(id, name, url);
        self.projects.write().await.insert(id, project.clone());
        project
    }

    /// Snapshot of one project.
    pub async fn get(&self, id: ProjectId) -> Option<Project> {
        self.projects.read().await.get(&id).cloned()
    }

    /// Snapshots of all projects, ordered by id.
    pub async fn all(&self) -> Vec<Project> {
        let mut projects: Vec<Project> = self.projects.read().await.values().cloned().collect();
        projects.sort_by_key(|p| p.id);
        projects
    }

    /// Apply a mutation under the write lock and return the updated snapshot.
    ///
    /// # Errors
    /// Returns `StoreError::UnknownProject` when the id is not registered.
    pub async fn update<F>(&self, id: ProjectId, mutate: F) -> Result<Project, StoreError>
    where
        F: FnOnce(&mut Project),
    {
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(&id)
            .ok_or(StoreError::UnknownProject(id))?;
        mutate(project);
        Ok(project.clone())
    }

    /// Remove a project row. The caller is responsible for deleting the
    /// cache directory first; destruction order is row-first.
    pub async fn remove(&self, id: ProjectId) -> Option<Project> {
        self.locks.lock().await.remove(&id);
        self.projects.write().await.remove(&id)
    }

    /// The serialization lock for one project's clone/sync work.
    pub async fn project_lock(&self, id: ProjectId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id).or_default().clone()
    }

    /// Number of registered projects.
    pub async fn len(&self) -> usize {
        self.projects.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.projects.read().await.is_empty()
    }
}
