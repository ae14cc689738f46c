//! Test: Degraded classifier - one unreachable domain still yields an answer

use crate::helpers::*;
use std::sync::Arc;
use triage::execution::{ExecutionEvent, SchedulingStrategy};

#[tokio::test]
async fn test_unavailable_classifier_degrades_one_domain() {
    let completion = Arc::new(EchoCompletion::new());
    let classifier = Arc::new(sample_classifier().unavailable_for("mobile"));

    let run = run_triage(
        completion.clone(),
        classifier,
        SchedulingStrategy::Parallel,
        sample_inputs(),
    )
    .await;
    let outcome = run.result.expect("a degraded domain must not abort the run");

    let mobile = outcome
        .domain_answers
        .iter()
        .find(|a| a.domain == "mobile")
        .expect("mobile answer present");
    assert!(mobile.answer.contains("could not be obtained"));

    let os = outcome.domain_answers.iter().find(|a| a.domain == "os").unwrap();
    assert!(os.answer.starts_with("echo: You are an expert in operating systems"));

    // No completion call for the degraded domain
    assert_eq!(completion.call_count(), 4);
    assert!(!completion
        .prompts()
        .iter()
        .any(|p| p.starts_with("You are an expert in mobile systems")));

    let combine_prompt = completion.combine_prompt().expect("combine ran");
    assert!(combine_prompt.contains("could not be obtained"));
    assert!(!outcome.final_answer.is_empty());

    assert!(!run
        .events
        .iter()
        .any(|e| matches!(e, ExecutionEvent::StepFailed { .. })));
}
