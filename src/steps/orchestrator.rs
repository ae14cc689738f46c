//! Orchestrator steps: acknowledge the request, then combine the specialists

use crate::core::{
    DomainSpec, Message, PipelineState, StateKey, StateUpdate, Step, StepError,
};
use crate::service::CompletionService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub const INITIATE_STEP_ID: &str = "orchestrator_initiate";
pub const COMBINE_STEP_ID: &str = "orchestrator_combine";

/// "a", "a and b", "a, b and c"
fn join_perspectives(domains: &[DomainSpec]) -> String {
    let names: Vec<&str> = domains.iter().map(|d| d.perspective.as_str()).collect();
    match names.split_last() {
        None => String::new(),
        Some((last, [])) => last.to_string(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Acknowledges the request and announces the perspectives to be gathered
pub struct InitiateStep {
    completion: Arc<dyn CompletionService>,
    domains: Vec<DomainSpec>,
}

impl InitiateStep {
    pub fn new(completion: Arc<dyn CompletionService>, domains: Vec<DomainSpec>) -> Self {
        Self { completion, domains }
    }

    pub fn build_prompt(&self, user_input: &str) -> String {
        format!(
            "You are the Orchestrator. The user said:\n\n\
             {}\n\n\
             Acknowledge the request. Next, we will gather {} perspectives \
             before providing a final answer.",
            user_input,
            join_perspectives(&self.domains)
        )
    }
}

#[async_trait]
impl Step for InitiateStep {
    fn id(&self) -> &str {
        INITIATE_STEP_ID
    }

    fn writes(&self) -> Vec<StateKey> {
        vec![StateKey::History]
    }

    async fn run(&self, state: &PipelineState) -> Result<Vec<StateUpdate>, StepError> {
        let user_input = state
            .latest_message()
            .ok_or_else(|| StepError::MissingInput("history is empty".to_string()))?;

        let prompt = self.build_prompt(&user_input.content);
        debug!("Initiate prompt: {}", prompt);

        let acknowledgment = self.completion.complete(&[Message::system(prompt)]).await?;
        info!("Orchestrator acknowledged the request");

        Ok(vec![StateUpdate::AppendHistory(Message::assistant(
            acknowledgment,
        ))])
    }
}

/// Synthesizes every domain answer into the final answer
pub struct CombineStep {
    completion: Arc<dyn CompletionService>,
    domains: Vec<DomainSpec>,
}

impl CombineStep {
    pub fn new(completion: Arc<dyn CompletionService>, domains: Vec<DomainSpec>) -> Self {
        Self { completion, domains }
    }

    /// Build the synthesis prompt; every configured domain must have an answer
    pub fn build_prompt(&self, state: &PipelineState) -> Result<String, StepError> {
        let mut prompt = format!(
            "You have the following {} expert answers:\n\n",
            self.domains.len()
        );

        for domain in &self.domains {
            let answer = state.domain_answer(&domain.name).ok_or_else(|| {
                StepError::MissingInput(format!("no answer for domain '{}'", domain.name))
            })?;
            prompt.push_str(&format!(
                "{} perspective:\n{}\n\n",
                capitalize(&domain.perspective),
                answer
            ));
        }

        prompt.push_str("Combine them into a single, concise answer for the user.");
        Ok(prompt)
    }
}

#[async_trait]
impl Step for CombineStep {
    fn id(&self) -> &str {
        COMBINE_STEP_ID
    }

    fn writes(&self) -> Vec<StateKey> {
        vec![StateKey::FinalAnswer]
    }

    async fn run(&self, state: &PipelineState) -> Result<Vec<StateUpdate>, StepError> {
        let prompt = self.build_prompt(state)?;
        debug!("Combine prompt: {}", prompt);

        let final_answer = self.completion.complete(&[Message::system(prompt)]).await?;
        info!("Orchestrator combined {} domain answers", self.domains.len());

        Ok(vec![StateUpdate::FinalAnswer(final_answer)])
    }
}
