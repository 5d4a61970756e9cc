//! The workflow orchestrator: a directed graph of stages over `GraphState`.
//!
//! Each stage mutates the state and sets `current_step`; a pure routing
//! function maps the step tag to the next stage. A stage that fails has its
//! message stored in `state.error` and the graph routes to `handle_error`,
//! which always produces a minimal error report. Cancellation is checked at
//! stage boundaries only.

use std::collections::BTreeMap;

use agents::{diff, AgentBundle, DependencyGraph, ParsedFile, ScanDetails, DIFF_SUMMARY_KEY};
use chrono::Utc;
use model::{ScanRequest, ScanStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::state::{GraphState, Stage};

/// Upper bound on routing steps; the graph has no cycles, so hitting this
/// means a routing bug rather than a long scan.
const MAX_STEPS: usize = 16;

/// Observer invoked after every executed stage.
pub type StageObserver = Box<dyn FnMut(Stage, &GraphState) + Send>;

/// Per-run options: external scan id, cancellation, progress observation.
#[derive(Default)]
pub struct RunOptions {
    /// Scan id to stamp into metadata and the report; generated when absent
    pub scan_id: Option<String>,
    /// Cancellation flag checked between stages
    pub cancel: CancellationToken,
    /// Called after each executed stage
    pub observer: Option<StageObserver>,
}

/// Drives one scan through the stage graph.
pub struct Orchestrator {
    agents: AgentBundle,
}

impl Orchestrator {
    #[must_use]
    pub fn new(agents: AgentBundle) -> Self {
        Self { agents }
    }

    /// Run a scan to termination with default options.
    ///
    /// # Errors
    /// Returns `EngineError::Cancelled` when cancelled between stages and
    /// `EngineError::Internal` on a routing bug; every other failure
    /// terminates normally in `ErrorHandled` with an error report.
    pub async fn run(&self, request: ScanRequest) -> Result<GraphState, EngineError> {
        self.run_with(request, RunOptions::default()).await
    }

    /// Run a scan to termination.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub async fn run_with(
        &self,
        request: ScanRequest,
        mut options: RunOptions,
    ) -> Result<GraphState, EngineError> {
        let mut state = GraphState::new(request);
        if let Some(scan_id) = options.scan_id.take() {
            state.set_meta("scan_id", scan_id);
        }

        for _ in 0..MAX_STEPS {
            if options.cancel.is_cancelled() {
                info!("scan cancelled between stages");
                return Err(EngineError::Cancelled);
            }

            let stage = match next_stage(&state) {
                Route::Terminal => return Ok(state),
                Route::Run(stage) => stage,
            };

            debug!(stage = %stage, "executing stage");
            if let Err(e) = self.execute(stage, &mut state).await {
                warn!(stage = %stage, error = %e, "stage failed");
                state.error = Some(e.to_string());
                state.current_step = Stage::Error;
            }
            if let Some(observer) = options.observer.as_mut() {
                observer(stage, &state);
            }
        }

        Err(EngineError::Internal(
            "stage routing exceeded the step budget".to_string(),
        ))
    }

    async fn execute(&self, stage: Stage, state: &mut GraphState) -> Result<(), EngineError> {
        match stage {
            Stage::StartScan => self.start_scan(state),
            Stage::FetchCode => self.fetch_code(state).await,
            Stage::ParseCode => self.parse_code(state).await,
            Stage::StaticAnalysis => self.static_analysis(state).await,
            Stage::ImpactAnalysis => self.impact_analysis(state).await,
            Stage::ProjectScanning => self.project_scanning(state).await,
            Stage::LlmAnalysis => self.llm_analysis(state).await,
            Stage::Reporting => self.reporting(state).await,
            Stage::HandleError => self.handle_error(state).await,
            Stage::Completed | Stage::Error | Stage::ErrorHandled => Ok(()),
        }
    }

    /// Stage 1: validate the request and initialize metadata.
    fn start_scan(&self, state: &mut GraphState) -> Result<(), EngineError> {
        if let Err(e) = state.request.validate() {
            state.error = Some(e.to_string());
            state.current_step = Stage::Error;
            return Ok(());
        }

        state.repo_url = state.request.repo_url.clone();
        state.pr_id = state.request.pr_id;
        if state.meta_str("scan_id").is_none() {
            let scan_id = format!(
                "{}_{}",
                state.request.scan_type,
                &Uuid::new_v4().simple().to_string()[..8]
            );
            state.set_meta("scan_id", scan_id);
        }
        state.set_meta("scan_type", state.request.scan_type.as_str());
        state.set_meta("started_at", Utc::now().to_rfc3339());
        if !state.request.options.is_empty() {
            state.set_meta(
                "options",
                serde_json::Value::Object(state.request.options.clone()),
            );
        }

        info!(repo = %state.repo_url, scan_type = %state.request.scan_type, "scan started");
        state.current_step = Stage::FetchCode;
        Ok(())
    }

    /// Stage 2: fetch a PR diff, falling back to project files.
    async fn fetch_code(&self, state: &mut GraphState) -> Result<(), EngineError> {
        let mut fallback = false;

        if let Some(pr_id) = state.pr_id {
            let diff_result = self
                .agents
                .fetcher
                .get_pr_diff(
                    &state.repo_url,
                    pr_id,
                    state.request.target_branch.as_deref(),
                    state.request.source_branch.as_deref(),
                )
                .await;
            match diff_result {
                Ok(diff) if !diff.trim().is_empty() => {
                    let changed = self.agents.fetcher.get_changed_files_from_diff(&diff);
                    state.set_meta("changed_files", serde_json::json!(changed));
                    state.pr_diff = Some(diff);
                    state.current_step = Stage::ParseCode;
                    return Ok(());
                }
                Ok(_) => {
                    warn!(pr = pr_id, "PR diff was empty, falling back to project files");
                    fallback = true;
                }
                Err(e) => {
                    warn!(pr = pr_id, error = %e, "PR diff fetch failed, falling back to project files");
                    state.set_meta("pr_diff_error", e.to_string());
                    fallback = true;
                }
            }
        }

        // project scans land here directly; PR scans only as a fallback
        let branch = state
            .request
            .branch
            .clone()
            .or_else(|| {
                if fallback {
                    state.request.source_branch.clone()
                } else {
                    None
                }
            });
        let files = self
            .agents
            .fetcher
            .get_project_files(&state.repo_url, branch.as_deref())
            .await
            .map_err(|e| match e {
                agents::AgentError::Auth(message) => EngineError::Auth(message),
                agents::AgentError::Cache(message) => EngineError::Cache(message),
                other => EngineError::Fetch(other.to_string()),
            })?;
        if files.is_empty() {
            return Err(EngineError::Fetch(format!(
                "repository {} returned no files",
                state.repo_url
            )));
        }

        state.project_code = files;
        if fallback {
            state.set_meta("fallback_mode", true);
        }
        state.current_step = Stage::ParseCode;
        Ok(())
    }

    /// Stage 3: parse whichever input is present.
    async fn parse_code(&self, state: &mut GraphState) -> Result<(), EngineError> {
        if !state.project_code.is_empty() {
            state.parsed_asts = self
                .agents
                .parser
                .parse(&state.project_code)
                .await
                .map_err(|e| EngineError::Parse(e.to_string()))?;
        } else if let Some(diff_text) = state.pr_diff.clone() {
            let extracted = diff::added_contents_from_diff(&diff_text);
            let parsed = if extracted.is_empty() {
                BTreeMap::new()
            } else {
                self.agents
                    .parser
                    .parse(&extracted)
                    .await
                    .map_err(|e| EngineError::Parse(e.to_string()))?
            };
            state.parsed_asts = if parsed.is_empty() {
                // files could not be cleanly extracted; a synthetic entry
                // keeps the pipeline going
                BTreeMap::from([(
                    DIFF_SUMMARY_KEY.to_string(),
                    ParsedFile::diff_summary(&diff_text),
                )])
            } else {
                parsed
            };
        } else {
            return Err(EngineError::Parse(
                "no code or diff available to parse".to_string(),
            ));
        }

        if state.parsed_asts.is_empty() {
            return Err(EngineError::Parse(
                "no files could be parsed".to_string(),
            ));
        }
        state.set_meta("successful_parses", state.parsed_asts.len());
        state.current_step = Stage::StaticAnalysis;
        Ok(())
    }

    /// Stage 4: run the static analyzer over the full parsed map.
    async fn static_analysis(&self, state: &mut GraphState) -> Result<(), EngineError> {
        if state.parsed_asts.is_empty() {
            return Err(EngineError::Parse(
                "static analysis requires parsed input".to_string(),
            ));
        }
        state.static_findings = self
            .agents
            .analyzer
            .analyze(&state.parsed_asts)
            .await
            .map_err(|e| EngineError::analysis("static_analysis", &e))?;
        state.set_meta("findings_count", state.static_findings.len());

        state.current_step = if state.pr_id.is_some() {
            Stage::ImpactAnalysis
        } else if !state.project_code.is_empty() {
            Stage::ProjectScanning
        } else {
            Stage::LlmAnalysis
        };
        Ok(())
    }

    /// Stage 6: impact analysis; failures are recorded but non-fatal.
    async fn impact_analysis(&self, state: &mut GraphState) -> Result<(), EngineError> {
        // a PR scan that degraded to project files has no diff to analyze
        let Some(diff_text) = state.pr_diff.clone() else {
            debug!("no diff present, skipping impact analysis");
            state.current_step = Stage::LlmAnalysis;
            return Ok(());
        };
        let changed: Vec<String> = state
            .metadata
            .get("changed_files")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let graph = DependencyGraph::from_summaries(&state.parsed_asts);

        match self
            .agents
            .impact
            .analyze(&diff_text, &graph, &changed)
            .await
        {
            Ok(entities) => {
                state.set_meta("impacted_entities", entities.len());
                state.impact_result = Some(entities);
            }
            Err(e) => {
                warn!(error = %e, "impact analysis failed, continuing without it");
                state.set_meta("impact_analysis_error", e.to_string());
            }
        }
        state.current_step = Stage::LlmAnalysis;
        Ok(())
    }

    /// Stage 7: project-wide scan; bypasses the LLM stage afterwards.
    async fn project_scanning(&self, state: &mut GraphState) -> Result<(), EngineError> {
        let result = self
            .agents
            .scanner
            .scan_entire_project(&state.project_code, &state.static_findings)
            .await
            .map_err(|e| EngineError::analysis("project_scanning", &e))?;

        state.set_meta("risk_level", result.risk_assessment.risk_level.to_string());
        state.set_meta("recommendations_count", result.recommendations.len());
        state.set_meta("project_scan_completed", true);
        state.project_scan_result = Some(result);
        state.current_step = Stage::Reporting;
        Ok(())
    }

    /// Stage 8: LLM analysis of whichever input exists.
    async fn llm_analysis(&self, state: &mut GraphState) -> Result<(), EngineError> {
        let insights = if let Some(diff_text) = &state.pr_diff {
            self.agents
                .llm
                .analyze_pr_diff(diff_text, &state.static_findings)
                .await
        } else {
            self.agents
                .llm
                .analyze_code(&state.project_code, &state.static_findings)
                .await
        }
        .map_err(|e| EngineError::analysis("llm_analysis", &e))?;

        state.llm_insights = insights;
        state.set_meta("has_llm_analysis", !state.llm_insights.trim().is_empty());

        state.current_step = if state.meta_flag("project_scan_completed") || state.pr_id.is_some() {
            Stage::Reporting
        } else {
            Stage::ProjectScanning
        };
        Ok(())
    }

    /// Stage 9: assemble the final report.
    async fn reporting(&self, state: &mut GraphState) -> Result<(), EngineError> {
        let details = self.scan_details(state, ScanStatus::Completed, None);
        let bundle = self
            .agents
            .reporter
            .generate(&state.static_findings, &state.llm_insights, &details)
            .await
            .map_err(|e| EngineError::analysis("reporting", &e))?;

        state.report = Some(bundle);
        state.set_meta("completed_at", Utc::now().to_rfc3339());
        state.current_step = Stage::Completed;
        info!(
            findings = state.static_findings.len(),
            "scan completed"
        );
        Ok(())
    }

    /// Stage 10: write a minimal error report. Never fails.
    async fn handle_error(&self, state: &mut GraphState) -> Result<(), EngineError> {
        let message = state
            .error
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        let details = self.scan_details(state, ScanStatus::Error, Some(message.clone()));

        match self.agents.reporter.generate(&[], "", &details).await {
            Ok(bundle) => state.report = Some(bundle),
            Err(e) => {
                // reporters are total on empty input; this is a last resort
                warn!(error = %e, "error reporter failed, storing bare report");
                state.report = None;
            }
        }
        state.set_meta("failed_at", Utc::now().to_rfc3339());
        state.current_step = Stage::ErrorHandled;
        info!(error = %message, "scan terminated with error report");
        Ok(())
    }

    fn scan_details(
        &self,
        state: &GraphState,
        status: ScanStatus,
        error_message: Option<String>,
    ) -> ScanDetails {
        let structural_summaries = state
            .parsed_asts
            .iter()
            .map(|(path, entry)| (path.clone(), entry.summary.clone()))
            .collect();
        let total_files_analyzed = if state.project_code.is_empty() {
            state.parsed_asts.len()
        } else {
            state.project_code.len()
        };

        ScanDetails {
            scan_id: state.meta_str("scan_id").unwrap_or_default().to_string(),
            repository: state.repo_url.clone(),
            pr_id: state.pr_id,
            branch: state
                .request
                .branch
                .clone()
                .or_else(|| state.request.source_branch.clone()),
            scan_type: state.request.scan_type,
            scan_status: status,
            error_message,
            agent_versions: self.agents.versions.clone(),
            total_files_analyzed,
            successful_parses: state.parsed_asts.len(),
            structural_summaries,
            generated_at: Utc::now(),
        }
    }
}

/// Where the graph goes next, read off the state's step tag.
enum Route {
    Run(Stage),
    Terminal,
}

/// Pure edge-routing function.
fn next_stage(state: &GraphState) -> Route {
    match state.current_step {
        Stage::Completed | Stage::ErrorHandled => Route::Terminal,
        Stage::Error => Route::Run(Stage::HandleError),
        other => Route::Run(other),
    }
}
