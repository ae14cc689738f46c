//! Domain specialist step: classifier call followed by a completion call

use crate::core::{
    DomainSpec, Message, PipelineState, StateKey, StateUpdate, Step, StepError,
};
use crate::service::{Classification, ClassifierError, ClassifierService, CompletionService};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Step id for a domain's specialist
pub fn specialist_step_id(domain: &str) -> String {
    format!("specialist_{}", domain)
}

/// Answer recorded when the classifier cannot be reached
pub fn degraded_answer(domain: &DomainSpec) -> String {
    format!(
        "The fault classification for the {} domain could not be obtained, \
         so no fault probability is available for it. This perspective was \
         not assessed.",
        domain.perspective
    )
}

/// Computes one domain's perspective on the user's query
pub struct SpecialistStep {
    id: String,
    domain: DomainSpec,
    classifier: Arc<dyn ClassifierService>,
    completion: Arc<dyn CompletionService>,
}

impl SpecialistStep {
    pub fn new(
        domain: DomainSpec,
        classifier: Arc<dyn ClassifierService>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            id: specialist_step_id(&domain.name),
            domain,
            classifier,
            completion,
        }
    }

    pub fn domain(&self) -> &DomainSpec {
        &self.domain
    }

    pub fn build_prompt(&self, query: &str, classification: &Classification) -> String {
        let perspective = &self.domain.perspective;
        format!(
            "You are an expert in {perspective}. The user asked:\n\n\
             {query}\n\n\
             A fault classifier for {perspective} reported a fault probability of \
             {probability:.3} (label {label}). Labels mean: 0 = no fault in this \
             domain, 1 = fault present.\n\n\
             Judge whether the reported issue originates in {perspective}, \
             citing the probability in your answer.",
            probability = classification.probability,
            label = classification.label,
        )
    }

    fn answer(&self, answer: String) -> Vec<StateUpdate> {
        vec![StateUpdate::DomainAnswer {
            domain: self.domain.name.clone(),
            answer,
        }]
    }
}

#[async_trait]
impl Step for SpecialistStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn writes(&self) -> Vec<StateKey> {
        vec![StateKey::DomainAnswer(self.domain.name.clone())]
    }

    async fn run(&self, state: &PipelineState) -> Result<Vec<StateUpdate>, StepError> {
        let query = state
            .query()
            .ok_or_else(|| StepError::MissingInput("history is empty".to_string()))?;

        let key = self.domain.feature_key();
        let features = state.domain_input(key).ok_or_else(|| {
            StepError::MissingInput(format!("no feature vector under '{}'", key))
        })?;

        let classification = match self.classifier.classify(&self.domain.name, features).await {
            Ok(classification) => classification,
            Err(ClassifierError::Unavailable(reason)) => {
                warn!(
                    "Classifier unavailable for {}: {}; recording degraded answer",
                    self.domain.name, reason
                );
                return Ok(self.answer(degraded_answer(&self.domain)));
            }
            Err(e) => return Err(e.into()),
        };

        let prompt = self.build_prompt(&query.content, &classification);
        debug!("Specialist prompt for {}: {}", self.domain.name, prompt);

        let answer = self.completion.complete(&[Message::system(prompt)]).await?;
        info!(
            "Specialist {} answered (probability {:.3})",
            self.domain.name, classification.probability
        );

        Ok(self.answer(answer))
    }
}
