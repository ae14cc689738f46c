//! Clients for the external classification and completion services

pub mod classifier_client;
pub mod client;
pub mod completion_client;
pub mod response;

use crate::core::Message;
use async_trait::async_trait;
pub use classifier_client::HttpClassifierClient;
pub use client::ServiceClientConfig;
pub use completion_client::{HttpCompletionClient, COMPLETION_TEMPERATURE};
pub use response::{Classification, ClassifierError, CompletionError, FAULT_THRESHOLD};

/// Trait for language-model completion - allows for different implementations
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate text for an ordered list of role-tagged messages
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError>;
}

/// Trait for fault classification - allows for different implementations
#[async_trait]
pub trait ClassifierService: Send + Sync {
    /// Score one domain's feature vector
    async fn classify(
        &self,
        domain: &str,
        features: &[f64],
    ) -> Result<Classification, ClassifierError>;
}
