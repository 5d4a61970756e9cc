//! Cache-backed code fetcher.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use store::{ProjectStore, RepoCache, TokenVault};
use tracing::{debug, info};

use crate::error::AgentError;
use crate::traits::CodeFetcher;

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Extensions read when walking a working tree.
const TEXT_EXTENSIONS: &[&str] = &[
    "py", "rs", "js", "ts", "java", "kt", "kts", "go", "md", "toml", "yaml", "yml", "json", "txt",
    "cfg", "ini", "sh",
];

/// Files larger than this are not loaded.
const MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Fetches code through the repository cache; PR diffs come from the hosting
/// platform's diff endpoint.
pub struct CachedCodeFetcher {
    store: Arc<ProjectStore>,
    vault: Arc<TokenVault>,
    cache: Arc<RepoCache>,
    http: reqwest::Client,
    github_api_base: String,
    diff_timeout: Duration,
}

impl CachedCodeFetcher {
    #[must_use]
    pub fn new(store: Arc<ProjectStore>, vault: Arc<TokenVault>, cache: Arc<RepoCache>) -> Self {
        Self {
            store,
            vault,
            cache,
            http: reqwest::Client::new(),
            github_api_base: GITHUB_API_BASE.to_string(),
            diff_timeout: Duration::from_secs(30),
        }
    }

    /// Override the hosting-platform API base URL.
    #[must_use]
    pub fn with_github_api_base(mut self, base: impl Into<String>) -> Self {
        self.github_api_base = base.into();
        self
    }

    /// Find the project registered for a URL, registering it on first use.
    async fn project_for(&self, repo_url: &str) -> store::Project {
        for project in self.store.all().await {
            if project.url == repo_url {
                return project;
            }
        }
        let name = repo_url
            .trim_end_matches(".git")
            .rsplit('/')
            .next()
            .unwrap_or("repository")
            .to_string();
        info!(repo = %repo_url, name = %name, "registering project on first fetch");
        self.store.register(name, repo_url).await
    }
}

#[async_trait]
impl CodeFetcher for CachedCodeFetcher {
    async fn get_pr_diff(
        &self,
        repo_url: &str,
        pr_id: u64,
        _target_branch: Option<&str>,
        _source_branch: Option<&str>,
    ) -> Result<String, AgentError> {
        let Some((owner, repo)) = github_owner_repo(repo_url) else {
            return Err(AgentError::Fetch(format!(
                "PR diff is only available for recognized hosting platforms: {repo_url}"
            )));
        };

        let project = self.project_for(repo_url).await;
        let url = format!("{}/repos/{owner}/{repo}/pulls/{pr_id}", self.github_api_base);
        let mut request = self
            .http
            .get(&url)
            .header("User-Agent", "review-platform")
            .header("Accept", "application/vnd.github.v3.diff")
            .timeout(self.diff_timeout);
        if let Some(token) = self.vault.get(&self.store, project.id).await {
            request = request.header("Authorization", format!("token {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::Fetch(format!("diff request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(AgentError::Fetch(format!(
                "diff endpoint returned {} for PR {pr_id}",
                response.status()
            )));
        }
        let diff = response
            .text()
            .await
            .map_err(|e| AgentError::Fetch(format!("diff body unreadable: {e}")))?;
        if diff.trim().is_empty() {
            return Err(AgentError::Fetch(format!("PR {pr_id} produced an empty diff")));
        }
        debug!(pr = pr_id, bytes = diff.len(), "fetched PR diff");
        Ok(diff)
    }

    async fn get_project_files(
        &self,
        repo_url: &str,
        branch: Option<&str>,
    ) -> Result<BTreeMap<String, String>, AgentError> {
        let project = self.project_for(repo_url).await;
        if let Some(branch) = branch {
            if branch != project.default_branch {
                self.store
                    .update(project.id, |p| p.default_branch = branch.to_string())
                    .await
                    .map_err(AgentError::from)?;
            }
        }

        let path = self.cache.acquire(&self.store, project.id).await?;
        let files = read_working_tree(&path);
        if files.is_empty() {
            return Err(AgentError::Fetch(format!(
                "repository {repo_url} contains no readable source files"
            )));
        }
        info!(repo = %repo_url, files = files.len(), "loaded project files");
        Ok(files)
    }
}

/// Read all text files of a working tree, keyed by relative path.
fn read_working_tree(root: &Path) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_dir() {
                stack.push(path);
                continue;
            }
            if metadata.len() > MAX_FILE_BYTES {
                continue;
            }
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            if !TEXT_EXTENSIONS.contains(&extension.as_str()) {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            files.insert(
                relative.to_string_lossy().replace('\\', "/"),
                content,
            );
        }
    }
    files
}

fn github_owner_repo(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("https://github.com/")?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let mut parts = rest.split('/');
    let owner = parts.next()?.to_string();
    let repo = parts.next()?.to_string();
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner, repo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::CacheConfig;
    use wiremock::matchers::{header, method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture(root: &Path, api_base: &str) -> CachedCodeFetcher {
        let store = Arc::new(ProjectStore::new());
        let vault = Arc::new(TokenVault::with_key(&[2u8; 32]));
        let cache = Arc::new(RepoCache::new(
            CacheConfig {
                cache_root: root.to_path_buf(),
                ..CacheConfig::default()
            },
            vault.clone(),
        ));
        CachedCodeFetcher::new(store, vault, cache).with_github_api_base(api_base)
    }

    #[tokio::test]
    async fn test_pr_diff_from_hosting_api() {
        let server = MockServer::start().await;
        let diff = "diff --git a/src/m.py b/src/m.py\n+print(1)\n";
        Mock::given(method("GET"))
            .and(url_path("/repos/octo/repo/pulls/42"))
            .and(header("Accept", "application/vnd.github.v3.diff"))
            .respond_with(ResponseTemplate::new(200).set_body_string(diff))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fixture(dir.path(), &server.uri());
        let fetched = fetcher
            .get_pr_diff("https://github.com/octo/repo", 42, None, None)
            .await
            .unwrap();
        assert_eq!(fetched, diff);
    }

    #[tokio::test]
    async fn test_pr_diff_not_found_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/repos/octo/repo/pulls/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fixture(dir.path(), &server.uri());
        let err = fetcher
            .get_pr_diff("https://github.com/octo/repo", 404, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_pr_diff_requires_recognizable_host() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fixture(dir.path(), "http://unused.invalid");
        let err = fetcher
            .get_pr_diff("https://example.com/o/r", 1, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Fetch(_)));
    }

    #[test]
    fn test_read_working_tree_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("src/main.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join(".git/config"), "[core]\n").unwrap();
        std::fs::write(dir.path().join("binary.bin"), [0u8, 1, 2]).unwrap();

        let files = read_working_tree(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("src/main.py"));
    }
}
