use anyhow::{bail, Context, Result};
use flowline::cli::commands::{RunCommand, ValidateCommand};
use flowline::cli::output::{self, style, CHECK, WARN};
use flowline::cli::{Cli, Command};
use flowline::{
    DataTokenizer, InMemoryAbilityRegistry, InMemoryTransformRegistry, Pipeline,
    PipelineExecutor, PipelineValidator, ResourceLimits,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let raw = Pipeline::raw_from_file(&cmd.file)?;

    let mut validator = PipelineValidator::new();
    if !validator.validate(&raw) {
        output::print_validation_errors(validator.get_errors());
        bail!("pipeline failed validation");
    }
    let pipeline = Pipeline::from_value(raw)?;

    let mut limits = ResourceLimits::default();
    if let Some(max_steps) = cmd.max_steps {
        limits.max_steps = max_steps;
    }
    if let Some(max_depth) = cmd.max_depth {
        limits.max_depth = max_depth;
    }
    if let Some(timeout) = cmd.timeout {
        limits.timeout_seconds = timeout;
    }

    let executor = PipelineExecutor::new(
        Arc::new(InMemoryAbilityRegistry::new()),
        Arc::new(InMemoryTransformRegistry::with_builtins()),
    )
    .with_limits(limits);

    let mut initial = HashMap::new();
    for (key, value) in &cmd.variable {
        initial.insert(key.clone(), parse_variable(value));
    }

    let (success, result, raw_context, stats) = match executor.execute(&pipeline, initial).await {
        Ok(outcome) => (true, outcome.result, outcome.context, outcome.stats),
        Err(failure) => (false, Value::Null, failure.context, failure.stats),
    };

    let context = if cmd.redact {
        redact_context(&raw_context)?
    } else {
        raw_context
    };

    if cmd.json {
        let report = json!({
            "success": success,
            "result": result,
            "context": context,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_run(success, &result, &context, &stats);
    }

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    let raw = Pipeline::raw_from_file(&cmd.file)?;

    let mut validator = PipelineValidator::new();
    if !validator.validate(&raw) {
        output::print_validation_errors(validator.get_errors());
        std::process::exit(1);
    }

    println!("{}{}", CHECK, style("Pipeline is valid").green().bold());
    if validator.was_structural_only() {
        println!(
            "{}{}",
            WARN,
            style("Ability names were not checked against a registry").dim()
        );
    }
    Ok(())
}

/// Variable values parse as JSON where possible, falling back to strings,
/// so `--variable count=3` binds a number and `--variable who=caller` a
/// string without extra quoting
fn parse_variable(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Replace sensitive values in the final context with opaque tokens
fn redact_context(context: &HashMap<String, Value>) -> Result<HashMap<String, Value>> {
    let mut tokenizer = DataTokenizer::new();
    let redacted = tokenizer.tokenize(&serde_json::to_value(context)?);
    serde_json::from_value(redacted).context("Failed to rebuild redacted context")
}
