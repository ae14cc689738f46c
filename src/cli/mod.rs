//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ClassifyCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::Path;

/// Multi-domain fault triage
#[derive(Debug, Parser, Clone)]
#[command(name = "triage")]
#[command(version = "0.1.0")]
#[command(about = "Fault triage across distributed, mobile and OS perspectives", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to triage configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the triage pipeline for a query
    Run(RunCommand),

    /// Score one domain's feature vector
    Classify(ClassifyCommand),

    /// Validate the configuration and show the step plan
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

    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref().map(Path::new)
    }
}
