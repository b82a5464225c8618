//! CLI command definitions

use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,

    /// Variable overrides (key=value); values parse as JSON, falling back
    /// to plain strings
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Override the step dispatch budget
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Override the nesting depth limit
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Override the run timeout, in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Replace sensitive values in the printed context with opaque tokens
    #[arg(long)]
    pub redact: bool,

    /// Print the outcome as JSON instead of a human-readable summary
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline definition without running it
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,
}

/// Parse a key=value pair
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{}`", s))?;
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("who=caller"),
            Ok(("who".to_string(), "caller".to_string()))
        );
        // only the first `=` splits
        assert_eq!(
            parse_key_value("expr=a=b"),
            Ok(("expr".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_value("bare").is_err());
    }
}
