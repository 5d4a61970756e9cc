//! End-to-end scan scenarios over the mock agent bundle.

use std::collections::BTreeMap;

use agents::mock::{sample_diff, sample_files, MockCodeFetcher};
use agents::{AgentBundle, MockLlmClient};
use engine::{Orchestrator, Stage};
use model::{ScanRequest, ScanStatus, ScanType};

fn rule_ids(state: &engine::GraphState) -> Vec<&str> {
    state
        .static_findings
        .iter()
        .map(|f| f.rule_id.as_str())
        .collect()
}

#[tokio::test]
async fn pr_scan_happy_path() {
    let orchestrator = Orchestrator::new(AgentBundle::mock());
    let state = orchestrator
        .run(ScanRequest::pr("https://github.com/a/b", 42))
        .await
        .unwrap();

    assert_eq!(state.current_step, Stage::Completed);
    let ids = rule_ids(&state);
    assert!(ids.contains(&"PRINT_STATEMENT_FOUND"));
    assert!(ids.contains(&"PDB_TRACE_FOUND"));

    let bundle = state.report.as_ref().expect("report must be present");
    assert_eq!(bundle.report.summary.total_findings, 2);
    assert_eq!(bundle.report.summary.scan_status, ScanStatus::Completed);
    assert!(bundle.report.llm_review.has_content);
    assert!(bundle.markdown.contains("Code Review Report"));

    // breakdowns always sum to the findings count
    assert_eq!(
        bundle.report.summary.severity_breakdown.values().sum::<usize>(),
        bundle.report.summary.total_findings
    );
    assert_eq!(
        bundle.report.summary.category_breakdown.values().sum::<usize>(),
        bundle.report.summary.total_findings
    );
}

#[tokio::test]
async fn pr_scan_falls_back_to_project_files() {
    // the fetcher has no diff, so the PR fetch fails and the scan degrades
    // to project files
    let bundle = AgentBundle::with_mocks(
        MockCodeFetcher::with_files(sample_files()),
        MockLlmClient::default(),
    );
    let orchestrator = Orchestrator::new(bundle);
    let state = orchestrator
        .run(ScanRequest::pr("https://github.com/a/b", 42))
        .await
        .unwrap();

    assert_eq!(state.current_step, Stage::Completed);
    assert!(state.meta_flag("fallback_mode"));
    // fallback exclusivity: project code present, pr id was present
    assert!(!state.project_code.is_empty());
    assert_eq!(state.pr_id, Some(42));

    let ids = rule_ids(&state);
    assert!(ids.contains(&"PRINT_STATEMENT_FOUND"));
    assert!(ids.contains(&"PDB_TRACE_FOUND"));
}

#[tokio::test]
async fn project_scan_populates_scan_result_and_bypasses_llm() {
    let mut files = BTreeMap::new();
    files.insert("src/a.py".to_string(), "def a():\n    return 1\n".to_string());
    files.insert("src/b.py".to_string(), "def b():\n    return 2\n".to_string());
    files.insert("src/c.py".to_string(), "x = 3\n".to_string());

    let bundle = AgentBundle::with_mocks(
        MockCodeFetcher::with_files(files),
        MockLlmClient::default(),
    );
    let orchestrator = Orchestrator::new(bundle);
    let state = orchestrator
        .run(ScanRequest::project("https://github.com/a/b"))
        .await
        .unwrap();

    assert_eq!(state.current_step, Stage::Completed);
    assert!(state.project_scan_result.is_some());
    assert!(state.meta_flag("project_scan_completed"));
    assert!(state.llm_insights.is_empty(), "llm stage must be bypassed");

    let bundle = state.report.as_ref().unwrap();
    assert_eq!(bundle.report.scan_info.scan_type, ScanType::Project);
    assert_eq!(bundle.report.metadata.total_files_analyzed, 3);
}

#[tokio::test]
async fn empty_repo_url_yields_error_report() {
    let orchestrator = Orchestrator::new(AgentBundle::mock());
    let state = orchestrator
        .run(ScanRequest::project(""))
        .await
        .unwrap();

    assert_eq!(state.current_step, Stage::ErrorHandled);
    assert!(state.error.is_some());

    let bundle = state.report.as_ref().expect("error reports are reports too");
    assert_eq!(bundle.report.summary.scan_status, ScanStatus::Error);
    assert!(bundle
        .report
        .summary
        .error_message
        .as_deref()
        .unwrap()
        .contains("Repository URL"));
}

#[tokio::test]
async fn unfetchable_repository_yields_error_report() {
    // neither a diff nor project files are available
    let bundle = AgentBundle::with_mocks(
        MockCodeFetcher::default(),
        MockLlmClient::default(),
    );
    let orchestrator = Orchestrator::new(bundle);
    let state = orchestrator
        .run(ScanRequest::pr("https://github.com/a/private", 7))
        .await
        .unwrap();

    assert_eq!(state.current_step, Stage::ErrorHandled);
    let report = &state.report.as_ref().unwrap().report;
    assert_eq!(report.summary.scan_status, ScanStatus::Error);
    assert!(report.summary.error_message.is_some());
}

#[tokio::test]
async fn unextractable_diff_parses_as_diff_summary() {
    // no "diff --git" sections, so files cannot be cleanly extracted
    let raw_diff = "--- a/src/m.py\n+++ b/src/m.py\n@@ -1 +1,2 @@\n import os\n+print(\"late\")\n";
    let bundle = AgentBundle::with_mocks(
        MockCodeFetcher::with_diff(raw_diff),
        MockLlmClient::default(),
    );
    let orchestrator = Orchestrator::new(bundle);
    let state = orchestrator
        .run(ScanRequest::pr("https://github.com/a/b", 5))
        .await
        .unwrap();

    assert_eq!(state.current_step, Stage::Completed);
    assert_eq!(state.parsed_asts.len(), 1);
    assert!(state.parsed_asts.contains_key(agents::DIFF_SUMMARY_KEY));
    // the static analysis stage still ran over the synthetic entry
    assert!(state
        .static_findings
        .iter()
        .any(|f| f.rule_id == "PRINT_STATEMENT_FOUND"));
}

#[tokio::test]
async fn terminal_state_always_has_a_report() {
    // a mix of passing and failing requests; every terminal state must
    // carry report data
    let requests = vec![
        ScanRequest::pr("https://github.com/a/b", 42),
        ScanRequest::project("https://github.com/a/b"),
        ScanRequest::project(""),
    ];
    for request in requests {
        let orchestrator = Orchestrator::new(AgentBundle::mock());
        let state = orchestrator.run(request).await.unwrap();
        assert!(state.is_terminal());
        assert!(
            state.report.is_some(),
            "terminal step {} must carry a report",
            state.current_step
        );
    }
}

#[tokio::test]
async fn impact_result_present_only_with_a_diff() {
    let orchestrator = Orchestrator::new(AgentBundle::mock());
    let pr_state = orchestrator
        .run(ScanRequest::pr("https://github.com/a/b", 42))
        .await
        .unwrap();
    assert!(pr_state.impact_result.is_some());

    let bundle = AgentBundle::with_mocks(
        MockCodeFetcher::with_files(sample_files()),
        MockLlmClient::default(),
    );
    let project_state = Orchestrator::new(bundle)
        .run(ScanRequest::project("https://github.com/a/b"))
        .await
        .unwrap();
    assert!(project_state.impact_result.is_none());
}

#[tokio::test]
async fn changed_files_are_recorded_in_metadata() {
    let orchestrator = Orchestrator::new(AgentBundle::mock());
    let state = orchestrator
        .run(ScanRequest::pr("https://github.com/a/b", 42))
        .await
        .unwrap();

    let changed: Vec<String> =
        serde_json::from_value(state.metadata.get("changed_files").unwrap().clone()).unwrap();
    assert_eq!(changed, ["src/m.py"]);
    assert_eq!(sample_diff().matches("diff --git").count(), 1);
}

#[tokio::test]
async fn empty_llm_insight_reports_no_llm_analysis() {
    let bundle = AgentBundle::with_mocks(MockCodeFetcher::sample(), MockLlmClient::empty());
    let orchestrator = Orchestrator::new(bundle);
    let state = orchestrator
        .run(ScanRequest::pr("https://github.com/a/b", 42))
        .await
        .unwrap();

    assert_eq!(state.current_step, Stage::Completed);
    let report = &state.report.as_ref().unwrap().report;
    assert!(!report.llm_review.has_content);
    assert!(!report.summary.has_llm_analysis);
}
