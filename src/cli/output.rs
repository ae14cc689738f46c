//! CLI output formatting

use crate::{
    core::ExecutionStatus,
    execution::ExecutionEvent,
    pipeline::DomainAnswer,
    service::Classification,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the pipeline's steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(bar_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            total_steps,
        } => format!(
            "{} Starting triage ({}) with {} steps",
            ROCKET,
            style(&execution_id.to_string()[..8]).dim(),
            style(total_steps).cyan()
        ),
        ExecutionEvent::StepStarted { step_id } => {
            format!("{} {}", SPINNER, style(step_id).cyan())
        }
        ExecutionEvent::StepCompleted { step_id, writes } => {
            let keys: Vec<String> = writes.iter().map(ToString::to_string).collect();
            format!(
                "{} {} {}",
                CHECK,
                style(step_id).green(),
                style(format!("[{}]", keys.join(", "))).dim()
            )
        }
        ExecutionEvent::StepFailed { step_id, error } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        ExecutionEvent::StepSkipped {
            step_id,
            failed_dependency,
        } => format!(
            "{} {} skipped ({} failed)",
            WARN,
            style(step_id).yellow(),
            style(failed_dependency).red()
        ),
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("{} completed", style("successfully").green())
                }
                other => format_status(*other),
            };
            format!(
                "{} Triage ({}) {}",
                INFO,
                style(&execution_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// Format one domain answer under a perspective heading
pub fn format_domain_answer(answer: &DomainAnswer, max_lines: usize) -> String {
    format!(
        "{}\n{}",
        style(format!("{} perspective", answer.perspective)).bold(),
        format_output(&answer.answer, max_lines)
    )
}

/// Format a classifier result
pub fn format_classification(domain: &str, classification: &Classification) -> String {
    let label = if classification.is_fault() {
        style("fault").red().to_string()
    } else {
        style("no fault").green().to_string()
    };
    format!(
        "{} {}: probability {} (label {}, {})",
        INFO,
        style(domain).bold(),
        style(format!("{:.3}", classification.probability)).cyan(),
        classification.label,
        label
    )
}

/// Format long text with truncation
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
