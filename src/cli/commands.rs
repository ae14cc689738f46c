//! CLI command definitions

use crate::execution::SchedulingStrategy;
use clap::Args;

/// Run the triage pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// The user's question or fault report
    #[arg(short, long)]
    pub query: String,

    /// Path to a YAML or JSON file mapping feature keys to vectors
    #[arg(short, long)]
    pub inputs: String,

    /// Scheduling strategy for the specialist fan-out
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Concurrent steps allowed with `parallel-limited`
    #[arg(long, default_value_t = 4)]
    pub max_concurrency: usize,

    /// Abort the run after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    pub fn strategy(&self) -> SchedulingStrategy {
        match self.strategy {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => {
                SchedulingStrategy::LimitedParallel(self.max_concurrency)
            }
        }
    }
}

/// Score a single domain's feature vector
#[derive(Debug, Args, Clone)]
pub struct ClassifyCommand {
    /// Configured domain name
    #[arg(short, long)]
    pub domain: String,

    /// Path to a YAML or JSON file mapping feature keys to vectors
    #[arg(short, long)]
    pub inputs: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate the triage configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}
