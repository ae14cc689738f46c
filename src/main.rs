use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use triage::cli::commands::{ClassifyCommand, RunCommand, ValidateCommand};
use triage::cli::output::*;
use triage::cli::{Cli, Command};
use triage::core::config::{load_inputs, TriageConfig};
use triage::execution::ExecutionEvent;
use triage::service::{ClassifierService, HttpClassifierClient, HttpCompletionClient};
use triage::TriagePipeline;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; stdout is reserved for results
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_triage(cmd, &load_config(cli.config_path())?).await?,
        Command::Classify(cmd) => classify(cmd, &load_config(cli.config_path())?).await?,
        Command::Validate(cmd) => validate_config(cmd, cli.config_path())?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TriageConfig> {
    TriageConfig::load(path).context("Failed to load triage configuration")
}

async fn run_triage(cmd: &RunCommand, config: &TriageConfig) -> Result<()> {
    let inputs = load_inputs(&cmd.inputs)
        .with_context(|| format!("Failed to load inputs from {}", cmd.inputs))?;

    let completion = HttpCompletionClient::new(config.completion_client_config())
        .context("Failed to create completion client")?;
    let classifier =
        HttpClassifierClient::new(config.classifier_client_config(), config.feature_vector_length)
            .context("Failed to create classifier client")?;

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let mut pipeline = TriagePipeline::new(config, Arc::new(completion), Arc::new(classifier))
        .context("Failed to build triage pipeline")?
        .with_strategy(cmd.strategy())
        .with_event_sender(sender);
    if let Some(secs) = cmd.deadline_secs {
        pipeline = pipeline.with_deadline(Duration::from_secs(secs));
    }

    // Set up event printing
    let progress = (!cmd.json).then(|| create_progress_bar(pipeline.graph().len()));
    let printer_progress = progress.clone();
    let printer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            let Some(progress) = &printer_progress else {
                continue;
            };
            if let ExecutionEvent::StepCompleted { step_id, .. } = &event {
                progress.inc(1);
                progress.set_message(step_id.clone());
            }
            progress.println(format_execution_event(&event));
        }
    });

    let result = pipeline.run(cmd.query.clone(), inputs).await;

    // Dropping the pipeline closes the event channel
    drop(pipeline);
    if let Err(e) = printer.await {
        error!("Event printer stopped: {}", e);
    }
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    match result {
        Ok(outcome) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }

            println!();
            for answer in &outcome.domain_answers {
                println!("{}\n", format_domain_answer(answer, 20));
            }
            println!("{}", style("Final answer").bold().green());
            println!("{}", outcome.final_answer);
            println!(
                "\n{} Triage completed {} (ID: {})",
                CHECK,
                style("successfully").green(),
                style(&outcome.execution_id.to_string()[..8]).dim()
            );
            Ok(())
        }
        Err(e) => {
            if cmd.json {
                let data = serde_json::json!({
                    "error": e.to_string(),
                    "failed_step": e.failed_step(),
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                match e.failed_step() {
                    Some(step_id) => println!(
                        "\n{} Triage {} at {}",
                        CROSS,
                        style("failed").red(),
                        style(step_id).bold()
                    ),
                    None => println!("\n{} Triage {}", CROSS, style("failed").red()),
                }
            }
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn classify(cmd: &ClassifyCommand, config: &TriageConfig) -> Result<()> {
    let domain = config
        .domains
        .iter()
        .find(|d| d.name == cmd.domain)
        .with_context(|| format!("Unknown domain '{}'", cmd.domain))?;

    let inputs = load_inputs(&cmd.inputs)
        .with_context(|| format!("Failed to load inputs from {}", cmd.inputs))?;
    let features = inputs.get(domain.feature_key()).with_context(|| {
        format!(
            "No feature vector under '{}' in {}",
            domain.feature_key(),
            cmd.inputs
        )
    })?;

    let classifier =
        HttpClassifierClient::new(config.classifier_client_config(), config.feature_vector_length)
            .context("Failed to create classifier client")?;
    let classification = classifier
        .classify(&domain.name, features)
        .await
        .with_context(|| format!("Classification failed for domain '{}'", domain.name))?;

    if cmd.json {
        let data = serde_json::json!({
            "domain": domain.name,
            "probability": classification.probability,
            "label": classification.label,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{}", format_classification(&domain.name, &classification));
    }

    Ok(())
}

fn validate_config(cmd: &ValidateCommand, path: Option<&Path>) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    let config = match TriageConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    // Clients are only constructed here; nothing is sent
    let completion = HttpCompletionClient::new(config.completion_client_config())
        .context("Failed to create completion client")?;
    let classifier =
        HttpClassifierClient::new(config.classifier_client_config(), config.feature_vector_length)
            .context("Failed to create classifier client")?;
    let pipeline = TriagePipeline::new(&config, Arc::new(completion), Arc::new(classifier))
        .context("Failed to build triage pipeline")?;
    let stages = pipeline.graph().stages();

    println!("{} Configuration is valid!", CHECK);
    println!("  Completion: {} ({})", style(&config.completion_endpoint).bold(), config.completion_model);
    println!("  Classifier: {}", style(&config.classifier_endpoint).bold());
    println!("  Feature vector length: {}", style(config.feature_vector_length).cyan());
    println!("  Domains: {}", style(config.domains.len()).cyan());
    println!("  Steps: {}", style(pipeline.graph().len()).cyan());
    for (index, stage) in stages.iter().enumerate() {
        println!("    {}. {}", index + 1, stage.join(", "));
    }

    if cmd.json {
        let data = serde_json::json!({
            "config": config,
            "stages": stages,
        });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}
