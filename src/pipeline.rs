//! Triage pipeline - wires the orchestrator and specialists into a graph

use crate::{
    core::{
        config::TriageConfig, validate_inputs, DomainInputs, DomainSpec, ExecutionStatus,
        InputError, Message, PipelineState, Step, StepError,
    },
    execution::{
        ExecutionError, ExecutionEvent, GraphError, GraphExecutor, PipelineGraph,
        SchedulingStrategy,
    },
    service::{ClassifierService, CompletionService},
    steps::{
        specialist_step_id, CombineStep, InitiateStep, SpecialistStep, COMBINE_STEP_ID,
        INITIATE_STEP_ID,
    },
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Why a pipeline run produced no final answer
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("invalid pipeline graph: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("pipeline did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}

impl PipelineError {
    /// Id of the step that failed, when a step failed
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            PipelineError::Execution(e) => Some(e.step_id()),
            _ => None,
        }
    }
}

/// One domain's contribution to the final answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainAnswer {
    pub domain: String,
    pub perspective: String,
    pub answer: String,
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub execution_id: Uuid,
    pub final_answer: String,
    /// In configured domain order
    pub domain_answers: Vec<DomainAnswer>,
    pub history: Vec<Message>,
}

/// The five-step triage pipeline: initiate, one specialist per domain, combine
pub struct TriagePipeline {
    graph: PipelineGraph,
    domains: Vec<DomainSpec>,
    feature_vector_length: usize,
    strategy: SchedulingStrategy,
    deadline: Option<Duration>,
    events: Option<mpsc::UnboundedSender<ExecutionEvent>>,
}

impl TriagePipeline {
    pub fn new(
        config: &TriageConfig,
        completion: Arc<dyn CompletionService>,
        classifier: Arc<dyn ClassifierService>,
    ) -> Result<Self, GraphError> {
        let graph = build_graph(&config.domains, completion, classifier)?;
        Ok(Self {
            graph,
            domains: config.domains.clone(),
            feature_vector_length: config.feature_vector_length,
            strategy: SchedulingStrategy::default(),
            deadline: None,
            events: None,
        })
    }

    pub fn with_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Bound the whole run by a wall-clock deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_event_sender(mut self, sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    pub fn domains(&self) -> &[DomainSpec] {
        &self.domains
    }

    /// Run the pipeline for one query.
    ///
    /// Inputs are checked before any step runs, so malformed vectors never
    /// reach a remote service. Every run that starts ends with a
    /// `PipelineCompleted` event, including one cut off by the deadline.
    pub async fn run(
        &self,
        query: impl Into<String>,
        inputs: DomainInputs,
    ) -> Result<PipelineOutcome, PipelineError> {
        validate_inputs(&self.domains, &inputs, self.feature_vector_length)?;

        let state = PipelineState::new(query, inputs);
        let execution_id = state.execution_id();
        let mut executor = GraphExecutor::new(self.strategy);
        if let Some(sender) = &self.events {
            executor = executor.with_events(sender.clone());
        }

        let finished = match self.deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, executor.execute(&self.graph, state)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!("Pipeline deadline of {:?} exceeded", deadline);
                        if let Some(sender) = &self.events {
                            // A dropped receiver only means nobody is listening.
                            let _ = sender.send(ExecutionEvent::PipelineCompleted {
                                execution_id,
                                status: ExecutionStatus::Failed,
                            });
                        }
                        return Err(PipelineError::DeadlineExceeded(deadline));
                    }
                }
            }
            None => executor.execute(&self.graph, state).await?,
        };

        let outcome = self.outcome(finished)?;
        info!(
            "Triage {} produced a final answer from {} domains",
            outcome.execution_id,
            outcome.domain_answers.len()
        );
        Ok(outcome)
    }

    fn outcome(&self, state: PipelineState) -> Result<PipelineOutcome, PipelineError> {
        // The executor only returns Ok once every step has written its keys.
        let missing = |step_id: String, key: String| {
            PipelineError::Execution(ExecutionError::StepExecution {
                step_id,
                source: StepError::MissingInput(key),
            })
        };

        let mut domain_answers = Vec::with_capacity(self.domains.len());
        for domain in &self.domains {
            let answer = state
                .domain_answer(&domain.name)
                .ok_or_else(|| {
                    missing(
                        specialist_step_id(&domain.name),
                        format!("domain_answers[{}]", domain.name),
                    )
                })?;
            domain_answers.push(DomainAnswer {
                domain: domain.name.clone(),
                perspective: domain.perspective.clone(),
                answer: answer.to_string(),
            });
        }

        let final_answer = state
            .final_answer()
            .ok_or_else(|| missing(COMBINE_STEP_ID.to_string(), "final_answer".to_string()))?
            .to_string();

        Ok(PipelineOutcome {
            execution_id: state.execution_id(),
            final_answer,
            domain_answers,
            history: state.history().to_vec(),
        })
    }
}

/// Build the initiate -> specialists -> combine graph
pub fn build_graph(
    domains: &[DomainSpec],
    completion: Arc<dyn CompletionService>,
    classifier: Arc<dyn ClassifierService>,
) -> Result<PipelineGraph, GraphError> {
    let mut builder = PipelineGraph::builder().add_step(
        Arc::new(InitiateStep::new(completion.clone(), domains.to_vec())),
        Vec::<String>::new(),
    );

    let mut specialist_ids = Vec::with_capacity(domains.len());
    for domain in domains {
        let step = SpecialistStep::new(domain.clone(), classifier.clone(), completion.clone());
        specialist_ids.push(step.id().to_string());
        builder = builder.add_step(Arc::new(step), [INITIATE_STEP_ID]);
    }

    builder
        .add_step(
            Arc::new(CombineStep::new(completion, domains.to_vec())),
            specialist_ids,
        )
        .build()
}
