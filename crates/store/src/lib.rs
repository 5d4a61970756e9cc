//! Project registry, token vault, repository cache and maintenance jobs.
//!
//! The registry hands out atomic snapshots of `Project` rows; the vault
//! encrypts per-repository access tokens at rest; the cache manages local
//! working trees with commit-hash freshness, TTL expiry and quota eviction;
//! the maintenance loop sweeps all of them on a cadence.

mod cache;
mod error;
mod maintenance;
mod project;
mod vault;

pub use cache::RepoCache;
pub use error::StoreError;
pub use maintenance::{CycleReport, Maintenance, TaskReport, TaskStatus};
pub use project::{Project, ProjectId, ProjectStore};
pub use vault::{TokenVault, ENCRYPTION_KEY_ENV};
