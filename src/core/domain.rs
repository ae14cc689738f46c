//! Analysis domains and their feature vectors

use crate::service::ClassifierError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Feature vectors keyed by feature key
pub type DomainInputs = BTreeMap<String, Vec<f64>>;

/// One specialist perspective
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSpec {
    /// Domain name, used as the key in `domain_answers`
    pub name: String,

    /// Human-readable perspective, e.g. "operating systems"
    pub perspective: String,

    /// Key into the domain inputs; defaults to the domain name
    #[serde(default)]
    pub feature_key: Option<String>,
}

impl DomainSpec {
    pub fn new(name: impl Into<String>, perspective: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            perspective: perspective.into(),
            feature_key: None,
        }
    }

    pub fn with_feature_key(mut self, key: impl Into<String>) -> Self {
        self.feature_key = Some(key.into());
        self
    }

    /// The key this domain's feature vector is stored under
    pub fn feature_key(&self) -> &str {
        self.feature_key.as_deref().unwrap_or(&self.name)
    }

    /// The three perspectives the pipeline gathers out of the box
    pub fn defaults() -> Vec<DomainSpec> {
        vec![
            DomainSpec::new("distributed", "distributed systems"),
            DomainSpec::new("mobile", "mobile systems"),
            DomainSpec::new("os", "operating systems"),
        ]
    }
}

/// Caller input rejected before the pipeline starts
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no feature vector supplied for domain '{domain}' (key '{key}')")]
    MissingDomain { domain: String, key: String },

    #[error(transparent)]
    InvalidFeatureVector(#[from] ClassifierError),
}

/// Check a vector's length and reject NaN or infinite values
pub fn check_feature_vector(
    domain: &str,
    features: &[f64],
    expected: usize,
) -> Result<(), ClassifierError> {
    if features.len() != expected {
        return Err(ClassifierError::InvalidFeatureVector {
            domain: domain.to_string(),
            expected,
            actual: features.len(),
        });
    }
    if let Some(index) = features.iter().position(|f| !f.is_finite()) {
        return Err(ClassifierError::NonFiniteFeature {
            domain: domain.to_string(),
            index,
            value: features[index],
        });
    }
    Ok(())
}

/// Validate that every domain has a well-formed vector of the expected length
pub fn validate_inputs(
    domains: &[DomainSpec],
    inputs: &DomainInputs,
    expected_len: usize,
) -> Result<(), InputError> {
    for domain in domains {
        let key = domain.feature_key();
        let features = inputs.get(key).ok_or_else(|| InputError::MissingDomain {
            domain: domain.name.clone(),
            key: key.to_string(),
        })?;
        check_feature_vector(&domain.name, features, expected_len)?;
    }
    Ok(())
}
