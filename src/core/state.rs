//! Pipeline state threaded through every step

use crate::core::{domain::DomainInputs, message::Message};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Terminal status of a pipeline execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline completed successfully
    Completed,
    /// Pipeline failed
    Failed,
}

/// A field of [`PipelineState`] that a step may write
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateKey {
    History,
    DomainAnswer(String),
    FinalAnswer,
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKey::History => f.write_str("history"),
            StateKey::DomainAnswer(domain) => write!(f, "domain_answers[{}]", domain),
            StateKey::FinalAnswer => f.write_str("final_answer"),
        }
    }
}

/// A partial update returned by a step and merged by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    AppendHistory(Message),
    DomainAnswer { domain: String, answer: String },
    FinalAnswer(String),
}

impl StateUpdate {
    /// The field this update writes
    pub fn key(&self) -> StateKey {
        match self {
            StateUpdate::AppendHistory(_) => StateKey::History,
            StateUpdate::DomainAnswer { domain, .. } => StateKey::DomainAnswer(domain.clone()),
            StateUpdate::FinalAnswer(_) => StateKey::FinalAnswer,
        }
    }
}

/// Rejected state mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("{0} has already been written")]
    AlreadyWritten(StateKey),
}

/// The record threaded through the pipeline.
///
/// Fields are only reachable through accessors; the sole mutation path is
/// [`PipelineState::apply`], which appends to `history` and refuses a second
/// write to any domain answer or to the final answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    execution_id: Uuid,
    started_at: DateTime<Utc>,
    history: Vec<Message>,
    domain_inputs: DomainInputs,
    domain_answers: BTreeMap<String, String>,
    final_answer: Option<String>,
}

impl PipelineState {
    /// Start a run from the user's query and the per-domain feature vectors
    pub fn new(query: impl Into<String>, domain_inputs: DomainInputs) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            started_at: Utc::now(),
            history: vec![Message::user(query)],
            domain_inputs,
            domain_answers: BTreeMap::new(),
            final_answer: None,
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// The original user query (always the first history entry)
    pub fn query(&self) -> Option<&Message> {
        self.history.first()
    }

    pub fn latest_message(&self) -> Option<&Message> {
        self.history.last()
    }

    pub fn domain_inputs(&self) -> &DomainInputs {
        &self.domain_inputs
    }

    pub fn domain_input(&self, key: &str) -> Option<&[f64]> {
        self.domain_inputs.get(key).map(Vec::as_slice)
    }

    pub fn domain_answers(&self) -> &BTreeMap<String, String> {
        &self.domain_answers
    }

    pub fn domain_answer(&self, domain: &str) -> Option<&str> {
        self.domain_answers.get(domain).map(String::as_str)
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    /// Merge one update, enforcing append-only / write-once semantics
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), StateError> {
        match update {
            StateUpdate::AppendHistory(message) => {
                self.history.push(message);
            }
            StateUpdate::DomainAnswer { domain, answer } => {
                if self.domain_answers.contains_key(&domain) {
                    return Err(StateError::AlreadyWritten(StateKey::DomainAnswer(domain)));
                }
                self.domain_answers.insert(domain, answer);
            }
            StateUpdate::FinalAnswer(answer) => {
                if self.final_answer.is_some() {
                    return Err(StateError::AlreadyWritten(StateKey::FinalAnswer));
                }
                self.final_answer = Some(answer);
            }
        }
        Ok(())
    }

    /// Merge a batch of updates in order, all or nothing
    ///
    /// The whole batch is checked against the current state, and against
    /// itself, before the first update is applied. A rejected batch leaves
    /// the state untouched.
    pub fn apply_all(
        &mut self,
        updates: impl IntoIterator<Item = StateUpdate>,
    ) -> Result<(), StateError> {
        let updates: Vec<StateUpdate> = updates.into_iter().collect();

        let mut claimed = BTreeSet::new();
        for update in &updates {
            let key = update.key();
            let taken = match &key {
                StateKey::History => continue,
                StateKey::DomainAnswer(domain) => self.domain_answers.contains_key(domain),
                StateKey::FinalAnswer => self.final_answer.is_some(),
            };
            if taken || !claimed.insert(key.clone()) {
                return Err(StateError::AlreadyWritten(key));
            }
        }

        for update in updates {
            self.apply(update)?;
        }
        Ok(())
    }
}
