//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{RunCommand, ValidateCommand};

/// Declarative pipeline execution engine
#[derive(Debug, Parser, Clone)]
#[command(name = "flowline")]
#[command(version = "0.1.0")]
#[command(about = "A declarative pipeline execution engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Validate a pipeline definition without running it
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

use std::ffi::OsString;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_variables() {
        let cli = Cli::try_parse_from([
            "flowline",
            "run",
            "--file",
            "publish.yaml",
            "--variable",
            "who=caller",
            "--variable",
            "count=3",
        ])
        .unwrap();

        match cli.command {
            Command::Run(cmd) => {
                assert_eq!(cmd.file, "publish.yaml");
                assert_eq!(cmd.variable.len(), 2);
                assert_eq!(cmd.variable[0], ("who".to_string(), "caller".to_string()));
            }
            other => panic!("Expected run command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from(["flowline", "validate", "--file", "publish.json"]).unwrap();
        assert!(matches!(cli.command, Command::Validate(_)));
    }

    #[test]
    fn test_bad_variable_rejected() {
        let result = Cli::try_parse_from([
            "flowline",
            "run",
            "--file",
            "p.yaml",
            "--variable",
            "no-equals-sign",
        ]);
        assert!(result.is_err());
    }
}
