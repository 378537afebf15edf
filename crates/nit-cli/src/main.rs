//! The `nit` command line interface.
//!
//! Exit codes: 0 success, 1 generation/verification failure, 2 bad
//! configuration, 130 cancelled.

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nit_agents::{Orchestrator, RunContext};
use nit_config::{load_config, validate_config};
use nit_core::TaskOutput;
use nit_llm::create_engine;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "nit",
    version,
    about = "Automated test generation and quality assurance"
)]
struct Cli {
    /// Project directory (defaults to the current directory).
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Override language detection.
    #[arg(long, global = true)]
    language: Option<String>,

    /// Pin the test framework adapter by name.
    #[arg(long, global = true)]
    framework: Option<String>,

    /// Per-run time budget in seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Plan without calling the LLM or writing files.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Machine-readable JSON output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect the project's stack, frameworks, dependencies, and infra.
    Detect,
    /// Generate tests for under-tested source files.
    Generate {
        /// Maximum number of source files to target.
        #[arg(long)]
        max_targets: Option<usize>,
    },
    /// Analyze a bug, generate a fix, and verify it transactionally.
    VerifyFix {
        /// File suspected to contain the bug.
        #[arg(long)]
        file: String,
        /// Description of the failure.
        #[arg(long)]
        description: String,
        /// Path to a reproduction test that currently fails.
        #[arg(long, default_value = "")]
        reproduction_test: String,
    },
    /// Monitor LLM-backed endpoints for output drift.
    Drift {
        #[command(subcommand)]
        mode: DriftMode,
    },
    /// Run the security audit.
    Audit,
    /// Bootstrap test infrastructure for a framework.
    Bootstrap {
        /// Framework to set up (vitest, jest, playwright, pytest).
        #[arg(long)]
        framework: String,
        /// Also install dependencies.
        #[arg(long)]
        install: bool,
    },
}

#[derive(Subcommand)]
enum DriftMode {
    /// Capture baselines for every drift test.
    Baseline,
    /// Compare current outputs against stored baselines.
    Test,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn build_orchestrator(cli: &Cli) -> anyhow::Result<Orchestrator> {
    let root = cli
        .project
        .clone()
        .unwrap_or(std::env::current_dir().context("cannot resolve current directory")?);
    let mut config = load_config(&root).context("failed to load .nit.yml")?;
    config.project.root = root.display().to_string();
    if let Some(language) = &cli.language {
        config.project.primary_language = language.clone();
    }
    if let Some(framework) = &cli.framework {
        config.testing.unit_framework = framework.clone();
    }

    let errors = validate_config(&config);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{} {error}", "config error:".red().bold());
        }
        anyhow::bail!("configuration invalid");
    }

    // Commands that never call the LLM still work without one; LLM
    // commands surface the configuration problem at generation time.
    let engine: std::sync::Arc<dyn nit_llm::LlmEngine> =
        match create_engine(&config.llm, &config.platform) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::debug!("LLM engine unavailable: {e}");
                std::sync::Arc::new(nit_llm::UnconfiguredEngine)
            }
        };

    let mut context = RunContext::new(config, engine)?;
    if let Some(timeout) = cli.timeout {
        context = context.with_time_budget(Duration::from_secs(timeout));
    }

    // Ctrl-C flips the run's cancel token; agents stop at their next
    // suspension point.
    let cancel = context.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupted, cancelling run...");
            cancel.cancel();
        }
    });

    Ok(Orchestrator::new(context))
}

fn exit_code_for(output: &TaskOutput) -> u8 {
    if output.errors.iter().any(|e| e == "cancelled") {
        EXIT_CANCELLED
    } else if output.is_completed() {
        0
    } else {
        EXIT_FAILURE
    }
}

async fn run() -> anyhow::Result<u8> {
    let cli = Cli::parse();
    init_tracing();

    let orchestrator = match build_orchestrator(&cli).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            return Ok(EXIT_CONFIG);
        }
    };

    let code = match &cli.command {
        Command::Detect => {
            let result = orchestrator.detect().await;
            output::print_detection(&result, cli.json);
            exit_code_for(&result)
        }
        Command::Generate { max_targets } => {
            if cli.dry_run {
                let result = orchestrator.detect().await;
                output::print_detection(&result, cli.json);
                info!("dry run: no tests generated");
                exit_code_for(&result)
            } else {
                let (summary, result) = orchestrator.generate(*max_targets).await;
                output::print_summary(&summary, cli.json);
                if summary.failed > 0 && result.is_completed() {
                    EXIT_FAILURE
                } else {
                    exit_code_for(&result)
                }
            }
        }
        Command::VerifyFix {
            file,
            description,
            reproduction_test,
        } => {
            let bug = nit_agents::debuggers::BugReport {
                id: uuid_like(),
                title: description.clone(),
                failing_test: reproduction_test.clone(),
                failure_message: description.clone(),
                suspect_file: file.clone(),
                suspect_line: None,
            };
            let result = orchestrator.verify_fix(bug, reproduction_test).await;
            output::print_verification(&result, cli.json);
            if result.is_completed() && result.result["is_verified"] != true {
                EXIT_FAILURE
            } else {
                exit_code_for(&result)
            }
        }
        Command::Drift { mode } => {
            let baseline = matches!(mode, DriftMode::Baseline);
            let result = orchestrator.drift(baseline).await;
            output::print_drift(&result, cli.json);
            if result.is_completed() && result.result["drift_detected"] == true {
                EXIT_FAILURE
            } else {
                exit_code_for(&result)
            }
        }
        Command::Audit => {
            let result = orchestrator.audit().await;
            output::print_audit(&result, cli.json);
            exit_code_for(&result)
        }
        Command::Bootstrap { framework, install } => {
            use nit_core::{Agent, TaskInput};
            let builder = nit_agents::builders::InfraBuilder::new(
                orchestrator.context().registry.clone(),
                orchestrator.context().project_root.clone(),
            );
            let result = builder
                .run(
                    TaskInput::new("bootstrap", ".").with_context(serde_json::json!({
                        "framework": framework,
                        "install_dependencies": install,
                    })),
                )
                .await;
            output::print_json_or(&result, cli.json, |result| {
                if result.result["bootstrapped"] == true {
                    println!("{} {framework} bootstrapped", "ok:".green().bold());
                } else {
                    println!("{framework} already configured");
                }
            });
            exit_code_for(&result)
        }
    };

    Ok(code)
}

fn uuid_like() -> String {
    // Cheap unique id for CLI-initiated bug reports.
    format!("bug-{}", std::process::id())
}

fn main() -> ExitCode {
    let runtime = tokio::runtime::Runtime::new().expect("failed to start async runtime");
    match runtime.block_on(run()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nit_core::TaskStatus;

    #[test]
    fn exit_codes_follow_outcomes() {
        let ok = TaskOutput::completed(serde_json::Value::Null);
        assert_eq!(exit_code_for(&ok), 0);

        let failed = TaskOutput::failed_with("boom");
        assert_eq!(exit_code_for(&failed), EXIT_FAILURE);

        let cancelled = TaskOutput::failed_with("cancelled");
        assert_eq!(exit_code_for(&cancelled), EXIT_CANCELLED);
    }

    #[test]
    fn cli_parses_common_flags() {
        use clap::Parser;
        let cli = Cli::try_parse_from([
            "nit",
            "--project",
            "/tmp/app",
            "--json",
            "generate",
            "--max-targets",
            "3",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.project.as_deref(), Some(std::path::Path::new("/tmp/app")));
        match cli.command {
            Command::Generate { max_targets } => assert_eq!(max_targets, Some(3)),
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn drift_subcommands_parse() {
        use clap::Parser;
        let cli = Cli::try_parse_from(["nit", "drift", "baseline"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Drift {
                mode: DriftMode::Baseline
            }
        ));
    }

    #[test]
    fn failed_status_round_trips() {
        let failed = TaskOutput::failed_with("x");
        assert_eq!(failed.status, TaskStatus::Failed);
    }
}
