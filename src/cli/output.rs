//! CLI output formatting

use crate::{
    core::{ExecutionStatus, Pipeline, RunReport, Stage, StageBody, StageStatus},
    execution::ExecutionEvent,
};
use console::Emoji;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Format a stage status for display
pub fn format_stage_status(status: StageStatus) -> String {
    match status {
        StageStatus::Pending => style("PENDING").dim().to_string(),
        StageStatus::Running => style("RUNNING").yellow().to_string(),
        StageStatus::Success => style("SUCCESS").green().to_string(),
        StageStatus::Failed => style("FAILED").red().to_string(),
        StageStatus::Skipped => style("SKIPPED").dim().to_string(),
        StageStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
        } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::AgentAcquired { agent } => {
            format!("{} Running on agent {}", INFO, style(agent).cyan())
        }
        ExecutionEvent::AgentReleased { agent } => {
            format!("{} Released agent {}", INFO, style(agent).dim())
        }
        ExecutionEvent::StageStarted { path } => {
            format!("{} {}", SPINNER, style(path).cyan())
        }
        ExecutionEvent::StepStarted {
            path,
            index,
            total,
            command,
        } => format!(
            "   {} [{}/{}] {}",
            style(path).dim(),
            index + 1,
            total,
            style(command).bold()
        ),
        ExecutionEvent::StepOutput { path, output } => {
            format!("{} Output from {}:\n{}", INFO, style(path).dim(), output)
        }
        ExecutionEvent::StageCompleted { path } => {
            format!("{} {}", CHECK, style(path).green())
        }
        ExecutionEvent::StageFailed { path, error } => match error {
            Some(error) => format!("{} {}: {}", CROSS, style(path).red(), style(error).dim()),
            None => format!("{} {}", CROSS, style(path).red()),
        },
        ExecutionEvent::StageSkipped { path, reason } => {
            format!("{} {} ({})", SKIP, style(path).dim(), reason)
        }
        ExecutionEvent::StageCancelled { path } => {
            format!("{} {} cancelled", WARN, style(path).yellow())
        }
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => format!("{} completed", style("successfully").green()),
                ExecutionStatus::Failed => style("failed").red().to_string(),
                _ => format!("{:?}", status),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(&execution_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// Whether an event carries step output (printed only when streaming)
pub fn is_output_event(event: &ExecutionEvent) -> bool {
    matches!(event, ExecutionEvent::StepOutput { .. })
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}.{}s", secs, duration.subsec_millis() / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// One line per stage: status, path, duration
pub fn format_report(report: &RunReport) -> String {
    let mut lines = Vec::new();
    for record in &report.stages {
        let duration = record
            .duration()
            .map(|d| format!(" ({})", format_duration(d)))
            .unwrap_or_default();
        lines.push(format!(
            "  {:<10} {}{}",
            format_stage_status(record.status),
            record.path,
            style(duration).dim()
        ));
    }
    lines.join("\n")
}

/// Render the stage tree of a pipeline
pub fn format_stage_tree(pipeline: &Pipeline) -> String {
    fn walk(stage: &Stage, depth: usize, out: &mut Vec<String>) {
        let indent = "  ".repeat(depth + 1);
        let label = if stage.name.is_empty() {
            style(&stage.path).dim().to_string()
        } else {
            style(&stage.name).bold().to_string()
        };
        let always = if stage.always { " [always]" } else { "" };

        match &stage.body {
            StageBody::Steps(steps) => {
                out.push(format!("{}{}{}", indent, label, always));
                for step in steps {
                    out.push(format!("{}  $ {}", indent, step.display_name()));
                }
            }
            StageBody::Sequential(children) => {
                out.push(format!("{}{}{}", indent, label, always));
                for child in children {
                    walk(child, depth + 1, out);
                }
            }
            StageBody::Parallel(children) => {
                out.push(format!("{}{} {}{}", indent, label, style("(parallel)").cyan(), always));
                for child in children {
                    walk(child, depth + 1, out);
                }
            }
        }
    }

    let mut out = Vec::new();
    if let Some(environment) = &pipeline.environment {
        out.push(format!("  environment {}", style(&environment.name).cyan()));
    }
    for stage in &pipeline.stages {
        walk(stage, 0, &mut out);
    }
    out.join("\n")
}
