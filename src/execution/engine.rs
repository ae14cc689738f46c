//! Graph executor - runs the step graph and merges every step's update

use crate::{
    core::{ExecutionStatus, PipelineState, StateKey, StateUpdate, StepError},
    execution::{ExecutionScheduler, PipelineGraph, SchedulingStrategy},
    service::CompletionError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events emitted while the pipeline runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        total_steps: usize,
    },
    StepStarted {
        step_id: String,
    },
    StepCompleted {
        step_id: String,
        writes: Vec<StateKey>,
    },
    StepFailed {
        step_id: String,
        error: String,
    },
    StepSkipped {
        step_id: String,
        failed_dependency: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// A step failed and the run was aborted
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("step '{step_id}' failed: {source}")]
    StepExecution {
        step_id: String,
        #[source]
        source: StepError,
    },
}

impl ExecutionError {
    /// Id of the step that failed
    pub fn step_id(&self) -> &str {
        match self {
            ExecutionError::StepExecution { step_id, .. } => step_id,
        }
    }

    pub fn step_error(&self) -> &StepError {
        match self {
            ExecutionError::StepExecution { source, .. } => source,
        }
    }

    /// The completion-service failure behind the abort, if any
    pub fn upstream(&self) -> Option<&CompletionError> {
        self.step_error().upstream()
    }
}

type StepOutcome = Result<Vec<StateUpdate>, StepError>;

fn emit_to(events: &Option<mpsc::UnboundedSender<ExecutionEvent>>, event: ExecutionEvent) {
    if let Some(sender) = events {
        // A dropped receiver only means nobody is listening.
        let _ = sender.send(event);
    }
}

/// Runs a [`PipelineGraph`] stage by stage.
///
/// The executor is the only writer of [`PipelineState`]: steps receive a
/// snapshot and return updates, which are merged after each step
/// (sequential) or after the stage's join barrier (concurrent), in
/// declaration order.
///
/// A failed step does not cancel its siblings. The run aborts once a later
/// stage has finished its runnable steps and still holds a step that depends
/// on the failed one, or at the end of the graph if nothing does. A step's
/// updates are merged as a batch; a rejected batch leaves the state as it was.
pub struct GraphExecutor {
    scheduler: ExecutionScheduler,
    events: Option<mpsc::UnboundedSender<ExecutionEvent>>,
}

impl GraphExecutor {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(strategy),
            events: None,
        }
    }

    /// Send execution events to an existing channel
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Open an event channel and return its receiving end
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.events = Some(sender);
        receiver
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.scheduler.strategy()
    }

    fn emit(&self, event: ExecutionEvent) {
        emit_to(&self.events, event);
    }

    /// Execute the whole graph and return the final state
    pub async fn execute(
        &self,
        graph: &PipelineGraph,
        mut state: PipelineState,
    ) -> Result<PipelineState, ExecutionError> {
        let execution_id = state.execution_id();
        info!(
            "Starting pipeline execution {} ({} steps, {:?})",
            execution_id,
            graph.len(),
            self.scheduler.strategy()
        );
        self.emit(ExecutionEvent::PipelineStarted {
            execution_id,
            total_steps: graph.len(),
        });

        let mut failures: BTreeMap<usize, StepError> = BTreeMap::new();

        for stage in graph.stage_indices() {
            let failed: BTreeSet<usize> = failures.keys().copied().collect();
            let plan = self.scheduler.plan_stage(graph, stage, &failed);

            if self.scheduler.concurrency(plan.runnable.len()) <= 1 {
                for &index in &plan.runnable {
                    let step = graph.step_at(index);
                    info!("Running step {}", step.id());
                    self.emit(ExecutionEvent::StepStarted {
                        step_id: step.id().to_string(),
                    });
                    let outcome = step.run(&state).await;
                    self.merge(graph, index, outcome, &mut state, &mut failures);
                }
            } else {
                let outcomes = self.run_concurrently(graph, &plan.runnable, &state).await;
                for (index, outcome) in outcomes {
                    self.merge(graph, index, outcome, &mut state, &mut failures);
                }
            }

            if let Some(&(_, dependency)) = plan.blocked.first() {
                for &(step, failed_dep) in &plan.blocked {
                    let step_id = graph.step_at(step).id().to_string();
                    let failed_dependency = graph.step_at(failed_dep).id().to_string();
                    warn!("Skipping {}: dependency {} failed", step_id, failed_dependency);
                    self.emit(ExecutionEvent::StepSkipped {
                        step_id,
                        failed_dependency,
                    });
                }
                return Err(self.abort(graph, execution_id, dependency, failures));
            }
        }

        let first_failure = failures.keys().next().copied();
        if let Some(index) = first_failure {
            return Err(self.abort(graph, execution_id, index, failures));
        }

        info!("Pipeline execution finished: {} - Completed", execution_id);
        self.emit(ExecutionEvent::PipelineCompleted {
            execution_id,
            status: ExecutionStatus::Completed,
        });
        Ok(state)
    }

    /// Fan a stage out over the runtime and wait for every step
    async fn run_concurrently(
        &self,
        graph: &PipelineGraph,
        runnable: &[usize],
        state: &PipelineState,
    ) -> Vec<(usize, StepOutcome)> {
        let snapshot = Arc::new(state.clone());
        let permits = Arc::new(Semaphore::new(self.scheduler.concurrency(runnable.len())));
        let mut tasks = JoinSet::new();

        for &index in runnable {
            let step = Arc::clone(graph.step_at(index));
            let snapshot = Arc::clone(&snapshot);
            let permits = Arc::clone(&permits);
            let events = self.events.clone();

            tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            Err(StepError::Internal("scheduler closed".to_string())),
                        )
                    }
                };
                info!("Running step {}", step.id());
                emit_to(
                    &events,
                    ExecutionEvent::StepStarted {
                        step_id: step.id().to_string(),
                    },
                );
                (index, step.run(&snapshot).await)
            });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    outcomes.insert(index, outcome);
                }
                Err(e) => error!("Step task did not finish: {}", e),
            }
        }

        runnable
            .iter()
            .map(|&index| {
                let outcome = outcomes.remove(&index).unwrap_or_else(|| {
                    Err(StepError::Internal(
                        "step task panicked or was cancelled".to_string(),
                    ))
                });
                (index, outcome)
            })
            .collect()
    }

    /// Apply one step's outcome to the running state
    fn merge(
        &self,
        graph: &PipelineGraph,
        index: usize,
        outcome: StepOutcome,
        state: &mut PipelineState,
        failures: &mut BTreeMap<usize, StepError>,
    ) {
        let step = graph.step_at(index);
        let step_id = step.id().to_string();

        let result = outcome.and_then(|updates| {
            let allowed = step.writes();
            if let Some(update) = updates.iter().find(|u| !allowed.contains(&u.key())) {
                return Err(StepError::UndeclaredWrite(update.key()));
            }
            let writes: Vec<StateKey> = updates.iter().map(StateUpdate::key).collect();
            state.apply_all(updates)?;
            Ok(writes)
        });

        match result {
            Ok(writes) => {
                debug!("Step {} wrote {:?}", step_id, writes);
                info!("Step {} completed", step_id);
                self.emit(ExecutionEvent::StepCompleted { step_id, writes });
            }
            Err(e) => {
                error!("Step {} failed: {}", step_id, e);
                self.emit(ExecutionEvent::StepFailed {
                    step_id,
                    error: e.to_string(),
                });
                failures.insert(index, e);
            }
        }
    }

    fn abort(
        &self,
        graph: &PipelineGraph,
        execution_id: Uuid,
        index: usize,
        mut failures: BTreeMap<usize, StepError>,
    ) -> ExecutionError {
        let step_id = graph.step_at(index).id().to_string();
        let source = failures
            .remove(&index)
            .unwrap_or_else(|| StepError::Internal("failure was not recorded".to_string()));

        error!("Pipeline execution {} aborted at step {}", execution_id, step_id);
        self.emit(ExecutionEvent::PipelineCompleted {
            execution_id,
            status: ExecutionStatus::Failed,
        });

        ExecutionError::StepExecution { step_id, source }
    }
}
