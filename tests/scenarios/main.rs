//! Scenario-based tests for triage

#[path = "../helpers.rs"]
mod helpers;

mod deadline;
mod degraded_classifier;
mod determinism;
mod failure_handling;
mod input_validation;
