//! Deterministic mock agents for tests and offline runs.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::traits::CodeFetcher;

/// A unified diff touching one Python file with a print and a pdb call.
#[must_use]
pub fn sample_diff() -> String {
    "\
diff --git a/src/m.py b/src/m.py
index 1111111..2222222 100644
--- a/src/m.py
+++ b/src/m.py
@@ -1,3 +1,6 @@
 import os
+print(\"debug output\")
+pdb.set_trace()
 def main():
     return 0
"
    .to_string()
}

/// A small Python project with the same debug statements.
#[must_use]
pub fn sample_files() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "src/main.py".to_string(),
        "import os\n\nprint(\"starting\")\npdb.set_trace()\n\ndef main():\n    return 0\n"
            .to_string(),
    )])
}

/// Canned code fetcher.
///
/// `diff = None` makes `get_pr_diff` fail, which exercises the orchestrator's
/// PR-to-project fallback; `files` empty makes `get_project_files` fail.
#[derive(Debug, Clone, Default)]
pub struct MockCodeFetcher {
    pub diff: Option<String>,
    pub files: BTreeMap<String, String>,
}

impl MockCodeFetcher {
    /// Fetcher serving the sample diff and sample files.
    #[must_use]
    pub fn sample() -> Self {
        Self {
            diff: Some(sample_diff()),
            files: sample_files(),
        }
    }

    /// Fetcher serving only a diff.
    #[must_use]
    pub fn with_diff(diff: impl Into<String>) -> Self {
        Self {
            diff: Some(diff.into()),
            files: BTreeMap::new(),
        }
    }

    /// Fetcher serving only project files; PR diff requests fail.
    #[must_use]
    pub fn with_files(files: BTreeMap<String, String>) -> Self {
        Self { diff: None, files }
    }
}

#[async_trait]
impl CodeFetcher for MockCodeFetcher {
    async fn get_pr_diff(
        &self,
        _repo_url: &str,
        pr_id: u64,
        _target_branch: Option<&str>,
        _source_branch: Option<&str>,
    ) -> Result<String, AgentError> {
        self.diff
            .clone()
            .ok_or_else(|| AgentError::Fetch(format!("no diff available for PR {pr_id}")))
    }

    async fn get_project_files(
        &self,
        repo_url: &str,
        _branch: Option<&str>,
    ) -> Result<BTreeMap<String, String>, AgentError> {
        if self.files.is_empty() {
            return Err(AgentError::Fetch(format!(
                "no files available for {repo_url}"
            )));
        }
        Ok(self.files.clone())
    }
}
