//! triage - multi-domain fault triage over a classifier and a language model

pub mod cli;
pub mod core;
pub mod execution;
pub mod pipeline;
pub mod service;
pub mod steps;

// Re-export commonly used types
pub use core::{DomainInputs, DomainSpec, ExecutionStatus, Message, PipelineState, Role, Step};
pub use core::config::TriageConfig;
pub use execution::{ExecutionError, ExecutionEvent, GraphExecutor, PipelineGraph, SchedulingStrategy};
pub use pipeline::{PipelineError, PipelineOutcome, TriagePipeline};
pub use service::{ClassifierService, CompletionService, HttpClassifierClient, HttpCompletionClient};
