//! HTTP client for the fault classification service

use crate::core::domain::check_feature_vector;
use crate::service::{Classification, ClassifierError, ClassifierService, ServiceClientConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    features: &'a [f64],
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    probability: f64,
    predicted_class: i64,
}

/// Client for the `POST /predict` scoring endpoint
#[derive(Debug, Clone)]
pub struct HttpClassifierClient {
    client: reqwest::Client,
    config: ServiceClientConfig,
    feature_vector_length: usize,
}

impl HttpClassifierClient {
    /// Create a new classifier client
    ///
    /// `feature_vector_length` is checked before every request; a vector of
    /// any other length, or one holding NaN or infinity, is rejected without
    /// touching the network.
    pub fn new(
        config: ServiceClientConfig,
        feature_vector_length: usize,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            feature_vector_length,
        })
    }

    pub fn feature_vector_length(&self) -> usize {
        self.feature_vector_length
    }

    async fn predict_once(&self, features: &[f64]) -> Result<Classification, ClassifierError> {
        let url = self.config.url("predict");

        let response = self
            .client
            .post(&url)
            .json(&PredictRequest { features })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Unavailable(format!(
                        "timeout after {} seconds",
                        self.config.timeout_secs
                    ))
                } else {
                    ClassifierError::Unavailable(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Unavailable(format!("HTTP {}", status)));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Unavailable(format!("malformed response: {}", e)))?;

        if !matches!(parsed.predicted_class, 0 | 1) {
            return Err(ClassifierError::Unavailable(format!(
                "predicted_class {} is not 0 or 1",
                parsed.predicted_class
            )));
        }

        let classification = Classification::from_probability(parsed.probability)?;
        if i64::from(classification.label) != parsed.predicted_class {
            warn!(
                "Classifier label {} disagrees with probability {:.3}; using {}",
                parsed.predicted_class, parsed.probability, classification.label
            );
        }

        Ok(classification)
    }
}

#[async_trait]
impl ClassifierService for HttpClassifierClient {
    async fn classify(
        &self,
        domain: &str,
        features: &[f64],
    ) -> Result<Classification, ClassifierError> {
        check_feature_vector(domain, features, self.feature_vector_length)?;

        let mut attempt: u32 = 0;
        loop {
            match self.predict_once(features).await {
                Ok(classification) => {
                    debug!(
                        "Classified {}: probability {:.3}, label {}",
                        domain, classification.probability, classification.label
                    );
                    return Ok(classification);
                }
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.config.retry_backoff_ms * u64::from(attempt);
                    warn!(
                        "Classifier attempt {} for {} failed ({}), retrying in {}ms",
                        attempt, domain, e, backoff
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
