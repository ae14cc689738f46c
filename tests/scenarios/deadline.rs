//! Test: Deadline - an overall deadline bounds the run

use crate::helpers::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use triage::core::config::TriageConfig;
use triage::core::ExecutionStatus;
use triage::execution::ExecutionEvent;
use triage::pipeline::{PipelineError, TriagePipeline};

#[tokio::test]
async fn test_deadline_exceeded() {
    let completion = Arc::new(EchoCompletion::new().with_delay(Duration::from_millis(500)));
    let pipeline = TriagePipeline::new(
        &TriageConfig::default(),
        completion,
        Arc::new(sample_classifier()),
    )
    .unwrap()
    .with_deadline(Duration::from_millis(50));

    let err = pipeline.run(SAMPLE_QUERY, sample_inputs()).await.unwrap_err();

    assert!(matches!(err, PipelineError::DeadlineExceeded(d) if d == Duration::from_millis(50)));
    assert_eq!(err.failed_step(), None);
}

#[tokio::test]
async fn test_deadline_ends_event_stream_with_failure() {
    let completion = Arc::new(EchoCompletion::new().with_delay(Duration::from_millis(500)));
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let pipeline = TriagePipeline::new(
        &TriageConfig::default(),
        completion,
        Arc::new(sample_classifier()),
    )
    .unwrap()
    .with_deadline(Duration::from_millis(50))
    .with_event_sender(sender);

    let result = pipeline.run(SAMPLE_QUERY, sample_inputs()).await;
    drop(pipeline);

    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }

    assert!(matches!(result, Err(PipelineError::DeadlineExceeded(_))));
    let Some(ExecutionEvent::PipelineStarted { execution_id: started, .. }) = events.first() else {
        panic!("first event should be PipelineStarted: {:?}", events);
    };
    assert_eq!(
        events.last(),
        Some(&ExecutionEvent::PipelineCompleted {
            execution_id: *started,
            status: ExecutionStatus::Failed,
        })
    );
    let completed_events = events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::PipelineCompleted { .. }))
        .count();
    assert_eq!(completed_events, 1);
}

#[tokio::test]
async fn test_generous_deadline_does_not_interfere() {
    let pipeline = TriagePipeline::new(
        &TriageConfig::default(),
        Arc::new(EchoCompletion::new()),
        Arc::new(sample_classifier()),
    )
    .unwrap()
    .with_deadline(Duration::from_secs(30));

    let outcome = pipeline.run(SAMPLE_QUERY, sample_inputs()).await.unwrap();
    assert_eq!(outcome.domain_answers.len(), 3);
}
