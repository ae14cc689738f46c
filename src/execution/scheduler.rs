//! Execution scheduler - determines how the steps of a stage run

use crate::execution::graph::PipelineGraph;
use std::collections::BTreeSet;

/// Strategy for scheduling step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// Execute steps in dependency order, one at a time
    Sequential,

    /// Execute all ready steps in parallel
    Parallel,

    /// Limited parallelism (max N concurrent steps)
    LimitedParallel(usize),
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::Parallel
    }
}

/// What to do with one stage
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StagePlan {
    /// Steps whose dependencies all succeeded
    pub runnable: Vec<usize>,

    /// Steps with a failed dependency, paired with the earliest such dependency
    pub blocked: Vec<(usize, usize)>,
}

/// Scheduler for determining which steps to run
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// How many steps of a stage of `stage_len` may run at once
    pub fn concurrency(&self, stage_len: usize) -> usize {
        match self.strategy {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => stage_len.max(1),
            SchedulingStrategy::LimitedParallel(max) => max.clamp(1, stage_len.max(1)),
        }
    }

    /// Split a stage into runnable steps and steps blocked by failed dependencies
    pub fn plan_stage(
        &self,
        graph: &PipelineGraph,
        stage: &[usize],
        failed: &BTreeSet<usize>,
    ) -> StagePlan {
        let mut plan = StagePlan::default();
        for &step in stage {
            let ancestors = graph.ancestors_of(step);
            match failed.iter().find(|&&f| ancestors.contains(&f)) {
                Some(&dependency) => plan.blocked.push((step, dependency)),
                None => plan.runnable.push(step),
            }
        }
        plan
    }
}
