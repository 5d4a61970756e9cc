//! LLM review clients.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use model::Finding;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::traits::LlmClient;

/// How many findings are summarized into a prompt before truncation.
const MAX_PROMPT_FINDINGS: usize = 50;

/// How much diff/code text goes into a prompt.
const MAX_PROMPT_BYTES: usize = 30_000;

/// Chat-style request payload accepted by the configured endpoint.
#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<CompletionMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct CompletionMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionContent {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: Vec<CompletionContent>,
}

/// HTTP client for a messages-style LLM endpoint.
pub struct HttpLlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpLlmClient {
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(120),
        }
    }

    async fn complete(&self, prompt: String) -> Result<String, AgentError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![CompletionMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            max_tokens: 4096,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "llm endpoint returned an error");
            return Err(AgentError::Llm(format!("endpoint returned {status}: {body}")));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Llm(format!("unparseable response: {e}")))?;
        let text = parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        debug!(bytes = text.len(), "llm analysis complete");
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn analyze_pr_diff(
        &self,
        diff: &str,
        findings: &[Finding],
    ) -> Result<String, AgentError> {
        self.complete(build_diff_prompt(diff, findings)).await
    }

    async fn analyze_code(
        &self,
        files: &BTreeMap<String, String>,
        findings: &[Finding],
    ) -> Result<String, AgentError> {
        self.complete(build_code_prompt(files, findings)).await
    }
}

fn push_findings(prompt: &mut String, findings: &[Finding]) {
    if findings.is_empty() {
        prompt.push_str("No static analysis findings were reported.\n");
        return;
    }
    prompt.push_str("## Static Analysis Findings\n\n");
    for finding in findings.iter().take(MAX_PROMPT_FINDINGS) {
        prompt.push_str(&format!(
            "- [{}] {} at {}:{}: {}\n",
            finding.severity, finding.rule_id, finding.file, finding.line, finding.message
        ));
    }
    if findings.len() > MAX_PROMPT_FINDINGS {
        prompt.push_str(&format!(
            "... and {} more findings\n",
            findings.len() - MAX_PROMPT_FINDINGS
        ));
    }
    prompt.push('\n');
}

/// Longest prefix of `text` up to `max` bytes, cut at a char boundary.
fn truncated(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn build_diff_prompt(diff: &str, findings: &[Finding]) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are a senior code reviewer. Review the following pull request diff.\n\n");
    push_findings(&mut prompt, findings);
    prompt.push_str("## Diff\n\n```diff\n");
    if diff.len() > MAX_PROMPT_BYTES {
        prompt.push_str(truncated(diff, MAX_PROMPT_BYTES));
        prompt.push_str("\n... (truncated)\n");
    } else {
        prompt.push_str(diff);
    }
    prompt.push_str("```\n\n");
    prompt.push_str(
        "Cover code quality, security, performance and best practices. Answer in markdown.\n",
    );
    prompt
}

fn build_code_prompt(files: &BTreeMap<String, String>, findings: &[Finding]) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are a senior code reviewer. Review the following project files.\n\n");
    push_findings(&mut prompt, findings);
    prompt.push_str("## Files\n\n");
    let mut used = 0;
    for (path, content) in files {
        if used >= MAX_PROMPT_BYTES {
            prompt.push_str("... (remaining files omitted)\n");
            break;
        }
        let budget = MAX_PROMPT_BYTES - used;
        let snippet = truncated(content, budget);
        prompt.push_str(&format!("### {path}\n\n```\n{snippet}\n```\n\n"));
        used += snippet.len();
    }
    prompt.push_str(
        "Cover code quality, architecture, security and maintainability. Answer in markdown.\n",
    );
    prompt
}

/// Deterministic stand-in client returning canned insight text.
#[derive(Debug, Clone)]
pub struct MockLlmClient {
    insight: String,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self {
            insight: "\
## Code Quality Assessment

The change set is small and focused. Naming is consistent and the control \
flow is easy to follow.

## Security Considerations

Debugging statements were detected; remove them before deploying to \
production.

## Recommendations

1. Replace print() calls with structured logging.
2. Remove pdb.set_trace() breakpoints.
"
            .to_string(),
        }
    }
}

impl MockLlmClient {
    /// Client returning the given text verbatim.
    #[must_use]
    pub fn with_insight(insight: impl Into<String>) -> Self {
        Self {
            insight: insight.into(),
        }
    }

    /// Client returning empty text, i.e. "no LLM analysis".
    #[must_use]
    pub fn empty() -> Self {
        Self {
            insight: String::new(),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn analyze_pr_diff(
        &self,
        _diff: &str,
        _findings: &[Finding],
    ) -> Result<String, AgentError> {
        Ok(self.insight.clone())
    }

    async fn analyze_code(
        &self,
        _files: &BTreeMap<String, String>,
        _findings: &[Finding],
    ) -> Result<String, AgentError> {
        Ok(self.insight.clone())
    }
}
