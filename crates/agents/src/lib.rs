//! Analysis agent contracts and built-in implementations.
//!
//! The orchestrator depends only on the traits in [`traits`]; the bundled
//! implementations here are deterministic and swappable (mock and real
//! variants share the same contracts).

mod analyzer;
pub mod diff;
mod error;
mod fetcher;
mod impact;
mod llm;
pub mod mock;
mod parser;
mod reporter;
mod scanner;
mod traits;

use std::collections::BTreeMap;
use std::sync::Arc;

use store::{ProjectStore, RepoCache, TokenVault};

pub use analyzer::RuleBasedAnalyzer;
pub use error::AgentError;
pub use fetcher::CachedCodeFetcher;
pub use impact::GraphImpactAnalyzer;
pub use llm::{HttpLlmClient, MockLlmClient};
pub use parser::OutlineParser;
pub use reporter::MarkdownReporter;
pub use scanner::MetricsProjectScanner;
pub use traits::{
    AstParser, CodeFetcher, DependencyGraph, ImpactAnalyzer, ImpactLevel, ImpactedEntity,
    LlmClient, ParseKind, ParsedFile, ProjectScanResult, ProjectScanner, ReportBundle, Reporter,
    ScanDetails, StaticAnalyzer, StructuralSummary, DIFF_SUMMARY_KEY,
};

/// One implementation of each agent contract, plus their versions for
/// report metadata.
#[derive(Clone)]
pub struct AgentBundle {
    pub fetcher: Arc<dyn CodeFetcher>,
    pub parser: Arc<dyn AstParser>,
    pub analyzer: Arc<dyn StaticAnalyzer>,
    pub llm: Arc<dyn LlmClient>,
    pub scanner: Arc<dyn ProjectScanner>,
    pub impact: Arc<dyn ImpactAnalyzer>,
    pub reporter: Arc<dyn Reporter>,
    pub versions: BTreeMap<String, String>,
}

impl AgentBundle {
    /// Built-in agents backed by the repository cache; the LLM client is
    /// supplied by the caller (HTTP or mock).
    #[must_use]
    pub fn builtin(
        store: Arc<ProjectStore>,
        vault: Arc<TokenVault>,
        cache: Arc<RepoCache>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            fetcher: Arc::new(CachedCodeFetcher::new(store, vault, cache)),
            parser: Arc::new(OutlineParser::new()),
            analyzer: Arc::new(RuleBasedAnalyzer::new()),
            llm,
            scanner: Arc::new(MetricsProjectScanner::new()),
            impact: Arc::new(GraphImpactAnalyzer::new()),
            reporter: Arc::new(MarkdownReporter::new()),
            versions: default_versions(),
        }
    }

    /// Fully offline bundle: canned fetcher and LLM, built-in analysis.
    #[must_use]
    pub fn mock() -> Self {
        Self::with_mocks(mock::MockCodeFetcher::sample(), MockLlmClient::default())
    }

    /// Offline bundle with caller-controlled fetcher and LLM doubles.
    #[must_use]
    pub fn with_mocks(
        fetcher: impl CodeFetcher + 'static,
        llm: impl LlmClient + 'static,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            parser: Arc::new(OutlineParser::new()),
            analyzer: Arc::new(RuleBasedAnalyzer::new()),
            llm: Arc::new(llm),
            scanner: Arc::new(MetricsProjectScanner::new()),
            impact: Arc::new(GraphImpactAnalyzer::new()),
            reporter: Arc::new(MarkdownReporter::new()),
            versions: default_versions(),
        }
    }
}

fn default_versions() -> BTreeMap<String, String> {
    let version = env!("CARGO_PKG_VERSION").to_string();
    [
        "code_fetcher",
        "ast_parser",
        "static_analyzer",
        "llm_client",
        "project_scanner",
        "impact_analyzer",
        "reporter",
    ]
    .into_iter()
    .map(|agent| (agent.to_string(), version.clone()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_records_agent_versions() {
        let bundle = AgentBundle::mock();
        assert_eq!(bundle.versions.len(), 7);
        assert!(bundle.versions.contains_key("static_analyzer"));
    }
}
