//! Service response and error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Probability above which a domain is labelled as faulty
pub const FAULT_THRESHOLD: f64 = 0.5;

/// Errors from the classification service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error("invalid feature vector for '{domain}': expected {expected} values, got {actual}")]
    InvalidFeatureVector {
        domain: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid feature vector for '{domain}': value {value} at index {index} is not finite")]
    NonFiniteFeature {
        domain: String,
        index: usize,
        value: f64,
    },

    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the completion service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("timeout after {0} seconds")]
    Timeout(u64),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed completion body: {0}")]
    Malformed(String),

    #[error("completion was empty")]
    EmptyCompletion,
}

/// Fault probability and binarized label for one domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub probability: f64,
    pub label: u8,
}

impl Classification {
    /// Build a classification, deriving the label from the threshold
    pub fn from_probability(probability: f64) -> Result<Self, ClassifierError> {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(ClassifierError::Unavailable(format!(
                "probability {} outside [0, 1]",
                probability
            )));
        }
        Ok(Self {
            probability,
            label: u8::from(probability > FAULT_THRESHOLD),
        })
    }

    pub fn is_fault(&self) -> bool {
        self.label == 1
    }
}
