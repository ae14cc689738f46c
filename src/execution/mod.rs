//! Pipeline execution engine

pub mod engine;
pub mod graph;
pub mod scheduler;

pub use engine::{ExecutionError, ExecutionEvent, GraphExecutor};
pub use graph::{GraphBuilder, GraphError, PipelineGraph};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy, StagePlan};
