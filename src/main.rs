use anyhow::{Context, Result};
use stage_runner::cli::commands::{RunCommand, ValidateCommand};
use stage_runner::cli::output::*;
use stage_runner::cli::{Cli, Command};
use stage_runner::core::config::PipelineConfig;
use stage_runner::{AgentPool, ExecutionEngine, ExecutionEvent, RunnerConfig, ShellExecutor};
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
    }

    Ok(())
}

fn load_runner_config(cli: &Cli) -> Result<RunnerConfig> {
    match &cli.config {
        Some(path) => RunnerConfig::from_file(path)
            .with_context(|| format!("Failed to load runner config {}", path)),
        None => Ok(RunnerConfig::default()),
    }
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let mut config = PipelineConfig::from_file(&cmd.file)
        .with_context(|| format!("Failed to load pipeline {}", cmd.file))?;

    if !cmd.json {
        println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());
    }

    for (key, value) in &cmd.variable {
        config.set_variable(key, value);
        if !cmd.json {
            println!(
                "{} Variable override: {} = {}",
                INFO,
                style(key).cyan(),
                style(value).dim()
            );
        }
    }

    let mut pipeline = config.to_pipeline();
    if let Some(agent) = &cmd.agent {
        debug!("Agent override: {}", agent);
        pipeline.agent = agent.clone();
    }

    let missing = pipeline.undefined_variables();
    if !missing.is_empty() {
        anyhow::bail!("Undefined variables: {}", missing.join(", "));
    }

    let runner_config = load_runner_config(cli)?;
    let pool = AgentPool::from_config(&runner_config);

    let mut engine = ExecutionEngine::new(ShellExecutor::new(), pool);
    if let Some(policy) = cmd.parallel_failure {
        engine = engine.with_parallel_failure(policy.into());
    }

    if !cmd.json {
        let stream = cli.stream;
        engine.add_event_handler(move |event| {
            if is_output_event(&event) {
                if stream {
                    if let ExecutionEvent::StepOutput { path, output } = &event {
                        println!("{} {}:\n{}", INFO, style(path).dim(), format_output(output, 20));
                    }
                }
                return;
            }
            println!("{}", format_execution_event(&event));
        });
    }

    let report = engine.execute(&pipeline).await;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{} Status: {}", INFO, format_status(report.status));
        println!("{}", format_report(&report));
        let duration = report
            .duration()
            .map(|d| format!(" in {}", format_duration(d)))
            .unwrap_or_default();
        if report.is_success() {
            println!(
                "\n{} {} completed {}{}",
                CHECK,
                style(&pipeline.name).bold(),
                style("successfully").green(),
                duration
            );
        } else {
            println!(
                "\n{} {} {}{}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red(),
                duration
            );
        }
    }

    if let Some(err) = &report.error {
        error!("{}", err);
    }
    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let pipeline = config.to_pipeline();
            let missing = pipeline.undefined_variables();

            if cmd.json {
                let data = serde_json::json!({
                    "valid": missing.is_empty(),
                    "name": pipeline.name,
                    "agent": pipeline.agent.to_string(),
                    "stages": pipeline.all_stages().iter().map(|s| serde_json::json!({
                        "id": s.id,
                        "path": s.path,
                        "kind": s.kind(),
                        "always": s.always,
                    })).collect::<Vec<_>>(),
                    "undefined_variables": missing,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                if missing.is_empty() {
                    println!("{} Pipeline configuration is valid!", CHECK);
                } else {
                    println!("{} Pipeline configuration has undefined variables", CROSS);
                }
                println!("  Name: {}", style(&pipeline.name).bold());
                println!("  Agent: {}", style(&pipeline.agent).cyan());
                println!("  Stages: {}", style(pipeline.all_stages().len()).cyan());
                println!("  Steps: {}", style(pipeline.step_count()).cyan());
                println!("  Variables: {}", style(pipeline.variables.len()).cyan());
                println!("{}", format_stage_tree(&pipeline));
                if !missing.is_empty() {
                    println!(
                        "{} Undefined variables: {}",
                        WARN,
                        style(missing.join(", ")).yellow()
                    );
                }
            }

            if !missing.is_empty() {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            if cmd.json {
                let data = serde_json::json!({ "valid": false, "error": format!("{:#}", e) });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(format!("{:#}", e)).red());
            }
            std::process::exit(1);
        }
    }
}
