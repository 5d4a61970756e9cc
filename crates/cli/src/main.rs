//! Operator CLI for the review platform.
//!
//! Runs a single scan in-process and prints the report, or runs one of the
//! maintenance tasks and prints its summary. Exit code 0 on success, 1 when
//! a scan terminates in an error report.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use config::ServiceConfig;
use engine::{Orchestrator, Stage};
use model::{ScanRequest, ScanType};
use store::{Maintenance, ProjectStore, RepoCache, TokenVault};
use tracing::debug;

#[derive(Parser)]
#[command(name = "review")]
#[command(about = "Multi-agent code review scans and cache maintenance")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan and print the report
    Scan {
        /// Repository URL
        repo_url: String,

        /// Kind of scan to run
        #[arg(long, value_enum, default_value_t = ScanKind::Project)]
        scan_type: ScanKind,

        /// Pull request number (PR scans)
        #[arg(long)]
        pr_id: Option<u64>,

        /// Branch to scan (project scans)
        #[arg(long)]
        branch: Option<String>,

        /// Source branch of the pull request
        #[arg(long)]
        source_branch: Option<String>,

        /// Target branch of the pull request
        #[arg(long)]
        target_branch: Option<String>,

        /// Use canned offline agents instead of cloning the repository
        #[arg(long)]
        mock: bool,

        /// Print the JSON report instead of markdown
        #[arg(long)]
        json: bool,
    },

    /// Run a maintenance task and print its summary
    Maintain {
        /// Which task to run
        #[arg(long, value_enum, default_value_t = MaintenanceTask::Cycle)]
        task: MaintenanceTask,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScanKind {
    Pr,
    Project,
}

#[derive(Clone, Copy, ValueEnum)]
enum MaintenanceTask {
    Cleanup,
    Sync,
    Health,
    Cycle,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("review=debug,engine=debug,store=debug,agents=debug")
            .init();
    }

    let config = ServiceConfig::load().context("failed to load configuration")?;

    match cli.command {
        Commands::Scan {
            repo_url,
            scan_type,
            pr_id,
            branch,
            source_branch,
            target_branch,
            mock,
            json,
        } => {
            let request = ScanRequest {
                repo_url,
                scan_type: match scan_type {
                    ScanKind::Pr => ScanType::Pr,
                    ScanKind::Project => ScanType::Project,
                },
                pr_id,
                source_branch,
                target_branch,
                branch,
                options: serde_json::Map::new(),
            };
            run_scan(&config, request, mock, json).await
        }
        Commands::Maintain { task } => run_maintenance(&config, task).await,
    }
}

async fn run_scan(
    config: &ServiceConfig,
    request: ScanRequest,
    mock: bool,
    json: bool,
) -> Result<()> {
    let agents = if mock {
        agents::AgentBundle::mock()
    } else {
        let (store, vault, cache) = build_store(config)?;
        let llm = build_llm_client();
        agents::AgentBundle::builtin(store, vault, cache, llm)
    };

    let orchestrator = Orchestrator::new(agents);
    let state = orchestrator
        .run(request)
        .await
        .context("scan did not terminate")?;

    let bundle = state
        .report
        .as_ref()
        .context("terminal state carried no report")?;
    if json {
        println!("{}", bundle.json);
    } else {
        println!("{}", bundle.markdown);
    }

    if state.current_step == Stage::ErrorHandled {
        let message = state.error.as_deref().unwrap_or("unknown error");
        eprintln!("{} {}", "scan failed:".red().bold(), message);
        std::process::exit(1);
    }
    eprintln!(
        "{} {} findings",
        "scan completed:".green().bold(),
        state.static_findings.len()
    );
    Ok(())
}

async fn run_maintenance(config: &ServiceConfig, task: MaintenanceTask) -> Result<()> {
    let (store, vault, cache) = build_store(config)?;
    let maintenance = Maintenance::new(
        store,
        vault,
        cache,
        config.maintenance.clone(),
        config.cache.max_cache_size_mb(),
    );

    let summary = match task {
        MaintenanceTask::Cleanup => serde_json::to_value(maintenance.cleanup_job().await)?,
        MaintenanceTask::Sync => serde_json::to_value(maintenance.auto_sync_job().await)?,
        MaintenanceTask::Health => serde_json::to_value(maintenance.health_check_job().await)?,
        MaintenanceTask::Cycle => serde_json::to_value(maintenance.run_cycle().await)?,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn build_store(
    config: &ServiceConfig,
) -> Result<(Arc<ProjectStore>, Arc<TokenVault>, Arc<RepoCache>)> {
    let store = Arc::new(ProjectStore::new());
    let vault = Arc::new(
        TokenVault::from_env(config.production).context("failed to initialize token vault")?,
    );
    let cache = Arc::new(RepoCache::new(config.cache.clone(), vault.clone()));
    Ok((store, vault, cache))
}

fn build_llm_client() -> Arc<dyn agents::LlmClient> {
    let endpoint = std::env::var("REVIEW_LLM_ENDPOINT").ok();
    let api_key = std::env::var("REVIEW_LLM_API_KEY").ok();
    match (endpoint, api_key) {
        (Some(endpoint), Some(api_key)) => {
            let model = std::env::var("REVIEW_LLM_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
            debug!(endpoint = %endpoint, model = %model, "using HTTP LLM client");
            Arc::new(agents::HttpLlmClient::new(endpoint, api_key, model))
        }
        _ => {
            debug!("no LLM endpoint configured, using mock client");
            Arc::new(agents::MockLlmClient::default())
        }
    }
}
