//! Step contract

use crate::core::state::{PipelineState, StateError, StateKey, StateUpdate};
use crate::service::{ClassifierError, CompletionError};
use async_trait::async_trait;
use thiserror::Error;

/// Why a step could not produce its update
#[derive(Debug, Error)]
pub enum StepError {
    #[error("upstream service error: {0}")]
    Upstream(#[from] CompletionError),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] ClassifierError),

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("update to {0} is outside the step's declared write-set")]
    UndeclaredWrite(StateKey),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StepError {
    /// The completion-service failure behind this error, if any
    pub fn upstream(&self) -> Option<&CompletionError> {
        match self {
            StepError::Upstream(e) => Some(e),
            _ => None,
        }
    }
}

/// A single node of the pipeline graph.
///
/// A step reads a snapshot of the state and returns the updates it wants
/// merged. It never mutates the state itself; the executor is the only
/// writer.
#[async_trait]
pub trait Step: Send + Sync {
    /// Unique step identifier
    fn id(&self) -> &str;

    /// Fields this step may write
    fn writes(&self) -> Vec<StateKey>;

    /// Run the step against a state snapshot
    async fn run(&self, state: &PipelineState) -> Result<Vec<StateUpdate>, StepError>;
}
