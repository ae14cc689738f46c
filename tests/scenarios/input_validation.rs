//! Test: Input validation - malformed inputs are rejected before any call

use crate::helpers::*;
use std::sync::Arc;
use triage::core::InputError;
use triage::execution::SchedulingStrategy;
use triage::pipeline::PipelineError;
use triage::service::ClassifierError;

#[tokio::test]
async fn test_short_vector_rejected_without_calls() {
    let completion = Arc::new(EchoCompletion::new());
    let classifier = Arc::new(sample_classifier());

    let mut inputs = sample_inputs();
    inputs.insert("mobile".to_string(), vec![25.0, 1.0, 0.0]);

    let run = run_triage(
        completion.clone(),
        classifier.clone(),
        SchedulingStrategy::Parallel,
        inputs,
    )
    .await;
    let err = run.result.expect_err("short vector must be rejected");

    match err {
        PipelineError::InvalidInput(InputError::InvalidFeatureVector(
            ClassifierError::InvalidFeatureVector {
                domain,
                expected,
                actual,
            },
        )) => {
            assert_eq!(domain, "mobile");
            assert_eq!(expected, 30);
            assert_eq!(actual, 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(completion.call_count(), 0);
    assert_eq!(classifier.call_count(), 0);
    assert!(run.events.is_empty());
}

#[tokio::test]
async fn test_nan_feature_rejected_without_calls() {
    let completion = Arc::new(EchoCompletion::new());
    let classifier = Arc::new(sample_classifier());

    let mut inputs = sample_inputs();
    let mut distributed = feature_vector(&[21.0, 0.0, 0.0, 203.0]);
    distributed[1] = f64::NAN;
    inputs.insert("distributed".to_string(), distributed);

    let run = run_triage(
        completion.clone(),
        classifier.clone(),
        SchedulingStrategy::Parallel,
        inputs,
    )
    .await;

    assert!(matches!(
        run.result,
        Err(PipelineError::InvalidInput(InputError::InvalidFeatureVector(
            ClassifierError::NonFiniteFeature { ref domain, index: 1, .. }
        ))) if domain == "distributed"
    ));
    assert_eq!(completion.call_count(), 0);
    assert_eq!(classifier.call_count(), 0);
    assert!(run.events.is_empty());
}

#[tokio::test]
async fn test_missing_domain_rejected_without_calls() {
    let completion = Arc::new(EchoCompletion::new());
    let classifier = Arc::new(sample_classifier());

    let mut inputs = sample_inputs();
    inputs.remove("os");

    let run = run_triage(
        completion.clone(),
        classifier.clone(),
        SchedulingStrategy::Parallel,
        inputs,
    )
    .await;

    assert!(matches!(
        run.result,
        Err(PipelineError::InvalidInput(InputError::MissingDomain { ref domain, .. })) if domain == "os"
    ));
    assert_eq!(completion.call_count(), 0);
    assert_eq!(classifier.call_count(), 0);
}

#[tokio::test]
async fn test_extra_inputs_are_ignored() {
    let mut inputs = sample_inputs();
    inputs.insert("network".to_string(), vec![1.0]);

    let run = run_triage(
        Arc::new(EchoCompletion::new()),
        Arc::new(sample_classifier()),
        SchedulingStrategy::Parallel,
        inputs,
    )
    .await;

    assert!(run.result.is_ok());
}
