//! Test: Failure handling - step failures abort with the failing step's id

use crate::helpers::*;
use std::sync::Arc;
use triage::core::StepError;
use triage::execution::{ExecutionEvent, SchedulingStrategy};
use triage::pipeline::PipelineError;
use triage::service::{ClassifierError, CompletionError};
use triage::steps::COMBINE_STEP_ID;
use triage::ExecutionStatus;

#[tokio::test]
async fn test_combine_failure_reports_step_and_upstream_cause() {
    let completion = Arc::new(EchoCompletion::new().failing_when(
        "expert answers",
        CompletionError::Status {
            status: 503,
            body: "overloaded".to_string(),
        },
    ));

    let run = run_triage(
        completion,
        Arc::new(sample_classifier()),
        SchedulingStrategy::Parallel,
        sample_inputs(),
    )
    .await;
    let err = run.result.expect_err("combine failure must abort");

    assert_eq!(err.failed_step(), Some(COMBINE_STEP_ID));
    let PipelineError::Execution(exec) = &err else {
        panic!("expected execution error, got {:?}", err);
    };
    assert_eq!(exec.step_id(), COMBINE_STEP_ID);
    assert_eq!(
        exec.upstream(),
        Some(&CompletionError::Status {
            status: 503,
            body: "overloaded".to_string()
        })
    );

    // final_answer was never written
    assert!(!run.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StepCompleted { step_id, .. } if step_id == COMBINE_STEP_ID
    )));
    assert!(matches!(
        run.events.last(),
        Some(ExecutionEvent::PipelineCompleted {
            status: ExecutionStatus::Failed,
            ..
        })
    ));
}

#[tokio::test]
async fn test_specialist_failure_blocks_combine_but_not_siblings() {
    let completion = Arc::new(EchoCompletion::new().failing_when(
        "You are an expert in mobile systems",
        CompletionError::Timeout(60),
    ));

    let run = run_triage(
        completion.clone(),
        Arc::new(sample_classifier()),
        SchedulingStrategy::Parallel,
        sample_inputs(),
    )
    .await;
    let err = run.result.as_ref().expect_err("specialist failure must abort");

    assert_eq!(err.failed_step(), Some("specialist_mobile"));
    assert!(run.completed_at("specialist_distributed").is_some());
    assert!(run.completed_at("specialist_os").is_some());
    assert!(run.started_at(COMBINE_STEP_ID).is_none());
    assert!(run.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StepSkipped { step_id, failed_dependency }
            if step_id == COMBINE_STEP_ID && failed_dependency == "specialist_mobile"
    )));
    assert!(completion.combine_prompt().is_none());
}

#[tokio::test]
async fn test_initiate_failure_stops_everything() {
    let completion = Arc::new(EchoCompletion::new().failing_when(
        "You are the Orchestrator",
        CompletionError::Transport("connection reset".to_string()),
    ));
    let classifier = Arc::new(sample_classifier());

    let run = run_triage(
        completion.clone(),
        classifier.clone(),
        SchedulingStrategy::Parallel,
        sample_inputs(),
    )
    .await;
    let err = run.result.expect_err("initiate failure must abort");

    assert_eq!(err.failed_step(), Some("orchestrator_initiate"));
    assert_eq!(classifier.call_count(), 0);
    assert_eq!(completion.call_count(), 1);
}

#[tokio::test]
async fn test_empty_completion_is_an_upstream_failure() {
    let completion = Arc::new(EchoCompletion::new().failing_when(
        "expert answers",
        CompletionError::EmptyCompletion,
    ));

    let run = run_triage(
        completion,
        Arc::new(sample_classifier()),
        SchedulingStrategy::Sequential,
        sample_inputs(),
    )
    .await;

    let err = run.result.expect_err("empty completion must abort");
    let PipelineError::Execution(exec) = &err else {
        panic!("expected execution error, got {:?}", err);
    };
    assert!(matches!(exec.step_error(), StepError::Upstream(CompletionError::EmptyCompletion)));
}

#[tokio::test]
async fn test_out_of_range_probability_degrades_domain() {
    // A probability outside [0, 1] is treated as an unavailable classifier
    let classifier = Arc::new(triage_classifier_with("os", 1.7));

    let run = run_triage(
        Arc::new(EchoCompletion::new()),
        classifier,
        SchedulingStrategy::Parallel,
        sample_inputs(),
    )
    .await;

    let outcome = run.result.expect("degraded domain must not abort");
    let os = outcome.domain_answers.iter().find(|a| a.domain == "os").unwrap();
    assert!(os.answer.contains("could not be obtained"));
}

fn triage_classifier_with(domain: &str, probability: f64) -> FixedClassifier {
    let mut probabilities = vec![("distributed", 0.9), ("mobile", 0.2), ("os", 0.1)];
    for entry in probabilities.iter_mut() {
        if entry.0 == domain {
            entry.1 = probability;
        }
    }
    FixedClassifier::new(probabilities)
}

#[test]
fn test_unavailable_error_is_distinct_from_invalid_vector() {
    let unavailable = ClassifierError::Unavailable("down".to_string());
    let invalid = ClassifierError::InvalidFeatureVector {
        domain: "os".to_string(),
        expected: 30,
        actual: 3,
    };
    assert_ne!(unavailable, invalid);
}
