//! Test utility functions for triage
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use triage::core::config::TriageConfig;
use triage::core::{DomainInputs, Message};
use triage::execution::{ExecutionEvent, SchedulingStrategy};
use triage::pipeline::{PipelineError, PipelineOutcome, TriagePipeline};
use triage::service::{
    Classification, ClassifierError, ClassifierService, CompletionError, CompletionService,
};

/// Completion stub that echoes the first line of the prompt.
///
/// Every prompt is recorded so tests can inspect what each step sent.
#[derive(Default)]
pub struct EchoCompletion {
    prompts: Mutex<Vec<String>>,
    failures: Vec<(String, CompletionError)>,
    delay: Option<Duration>,
}

impl EchoCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any prompt containing `needle`
    pub fn failing_when(mut self, needle: &str, error: CompletionError) -> Self {
        self.failures.push((needle.to_string(), error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// The prompt sent by the combine step, if it ran
    pub fn combine_prompt(&self) -> Option<String> {
        self.prompts()
            .into_iter()
            .find(|p| p.contains("expert answers"))
    }
}

#[async_trait]
impl CompletionService for EchoCompletion {
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        let prompt: String = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((_, error)) = self.failures.iter().find(|(needle, _)| prompt.contains(needle)) {
            return Err(error.clone());
        }

        let first_line = prompt.lines().next().unwrap_or_default();
        Ok(format!("echo: {}", first_line))
    }
}

/// Classifier stub with a fixed result per domain
#[derive(Default)]
pub struct FixedClassifier {
    results: HashMap<String, Result<Classification, ClassifierError>>,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new<'a>(probabilities: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        let results = probabilities
            .into_iter()
            .map(|(domain, p)| (domain.to_string(), Classification::from_probability(p)))
            .collect();
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }

    /// Report the service as unreachable for one domain
    pub fn unavailable_for(mut self, domain: &str) -> Self {
        self.results.insert(
            domain.to_string(),
            Err(ClassifierError::Unavailable("connection refused".to_string())),
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassifierService for FixedClassifier {
    async fn classify(
        &self,
        domain: &str,
        _features: &[f64],
    ) -> Result<Classification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results.get(domain).cloned().unwrap_or_else(|| {
            Err(ClassifierError::Unavailable(format!("no stub result for {}", domain)))
        })
    }
}

/// Pad a vector prefix with zeros up to the default length
pub fn feature_vector(prefix: &[f64]) -> Vec<f64> {
    let mut features = prefix.to_vec();
    features.resize(30, 0.0);
    features
}

/// Inputs for the three default domains
pub fn sample_inputs() -> DomainInputs {
    let mut inputs = DomainInputs::new();
    inputs.insert("distributed".to_string(), feature_vector(&[21.0, 0.0, 0.0, 203.0]));
    inputs.insert("mobile".to_string(), feature_vector(&[25.0, 1.0, 0.0, 190.0]));
    inputs.insert("os".to_string(), feature_vector(&[20.0, 0.0, 1.0, 210.0]));
    inputs
}

/// Classifier returning 0.9 / 0.2 / 0.1 for distributed / mobile / os
pub fn sample_classifier() -> FixedClassifier {
    FixedClassifier::new([("distributed", 0.9), ("mobile", 0.2), ("os", 0.1)])
}

pub const SAMPLE_QUERY: &str = "Users report intermittent timeouts when syncing from the app.";

/// Result of a run plus everything it emitted
pub struct TriageTestResult {
    pub result: Result<PipelineOutcome, PipelineError>,
    pub events: Vec<ExecutionEvent>,
}

impl TriageTestResult {
    /// Step ids in the order they started
    pub fn started(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::StepStarted { step_id } => Some(step_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Index of an event matching the predicate
    pub fn position(&self, predicate: impl Fn(&ExecutionEvent) -> bool) -> Option<usize> {
        self.events.iter().position(predicate)
    }

    pub fn completed_at(&self, step: &str) -> Option<usize> {
        self.position(|e| matches!(e, ExecutionEvent::StepCompleted { step_id, .. } if step_id == step))
    }

    pub fn started_at(&self, step: &str) -> Option<usize> {
        self.position(|e| matches!(e, ExecutionEvent::StepStarted { step_id } if step_id == step))
    }
}

/// Run the default pipeline with stub services and collect its events
pub async fn run_triage(
    completion: Arc<EchoCompletion>,
    classifier: Arc<FixedClassifier>,
    strategy: SchedulingStrategy,
    inputs: DomainInputs,
) -> TriageTestResult {
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let pipeline = TriagePipeline::new(&TriageConfig::default(), completion, classifier)
        .expect("default graph is valid")
        .with_strategy(strategy)
        .with_event_sender(sender);

    let result = pipeline.run(SAMPLE_QUERY, inputs).await;
    drop(pipeline);

    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }

    TriageTestResult { result, events }
}
