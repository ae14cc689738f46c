//! Triage configuration from YAML

use crate::core::domain::{DomainInputs, DomainSpec};
use crate::service::ServiceClientConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o";
pub const DEFAULT_CLASSIFIER_ENDPOINT: &str = "http://localhost:8000";
pub const DEFAULT_FEATURE_VECTOR_LENGTH: usize = 30;

/// Top-level configuration loaded from YAML
#[derive(Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Base URL of the OpenAI-compatible completion service
    #[serde(default = "default_completion_endpoint", alias = "completionEndpoint")]
    pub completion_endpoint: String,

    /// Bearer credential for the completion service
    #[serde(default, alias = "completionCredential", skip_serializing)]
    pub completion_credential: Option<String>,

    /// Model requested from the completion service
    #[serde(default = "default_completion_model", alias = "completionModel")]
    pub completion_model: String,

    /// Base URL of the classification service
    #[serde(default = "default_classifier_endpoint", alias = "classifierEndpoint")]
    pub classifier_endpoint: String,

    /// Number of values every feature vector must carry
    #[serde(default = "default_feature_vector_length", alias = "featureVectorLength")]
    pub feature_vector_length: usize,

    /// Specialist perspectives, in the order they are reported
    #[serde(default = "DomainSpec::defaults", alias = "domainList")]
    pub domains: Vec<DomainSpec>,

    #[serde(default = "default_classifier_timeout_secs")]
    pub classifier_timeout_secs: u64,

    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,

    /// Extra classifier attempts after an unavailable response
    #[serde(default = "default_classifier_max_retries")]
    pub classifier_max_retries: u32,

    #[serde(default = "default_classifier_retry_backoff_ms")]
    pub classifier_retry_backoff_ms: u64,
}

fn default_completion_endpoint() -> String {
    DEFAULT_COMPLETION_ENDPOINT.to_string()
}

fn default_completion_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_string()
}

fn default_classifier_endpoint() -> String {
    DEFAULT_CLASSIFIER_ENDPOINT.to_string()
}

fn default_feature_vector_length() -> usize {
    DEFAULT_FEATURE_VECTOR_LENGTH
}

fn default_classifier_timeout_secs() -> u64 {
    10
}

fn default_completion_timeout_secs() -> u64 {
    60
}

fn default_classifier_max_retries() -> u32 {
    1
}

fn default_classifier_retry_backoff_ms() -> u64 {
    250
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            completion_endpoint: default_completion_endpoint(),
            completion_credential: None,
            completion_model: default_completion_model(),
            classifier_endpoint: default_classifier_endpoint(),
            feature_vector_length: default_feature_vector_length(),
            domains: DomainSpec::defaults(),
            classifier_timeout_secs: default_classifier_timeout_secs(),
            completion_timeout_secs: default_completion_timeout_secs(),
            classifier_max_retries: default_classifier_max_retries(),
            classifier_retry_backoff_ms: default_classifier_retry_backoff_ms(),
        }
    }
}

impl fmt::Debug for TriageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriageConfig")
            .field("completion_endpoint", &self.completion_endpoint)
            .field(
                "completion_credential",
                &self.completion_credential.as_ref().map(|_| "<redacted>"),
            )
            .field("completion_model", &self.completion_model)
            .field("classifier_endpoint", &self.classifier_endpoint)
            .field("feature_vector_length", &self.feature_vector_length)
            .field("domains", &self.domains)
            .field("classifier_timeout_secs", &self.classifier_timeout_secs)
            .field("completion_timeout_secs", &self.completion_timeout_secs)
            .field("classifier_max_retries", &self.classifier_max_retries)
            .field("classifier_retry_backoff_ms", &self.classifier_retry_backoff_ms)
            .finish()
    }
}

impl TriageConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TriageConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for a run: explicit file, else the default
    /// location if present, else built-in defaults; then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => Self::default(),
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/triage/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("triage").join("config.yaml"))
    }

    /// Override endpoints and credentials from the environment
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("TRIAGE_COMPLETION_ENDPOINT") {
            self.completion_endpoint = endpoint;
        }
        if let Some(model) = lookup("TRIAGE_COMPLETION_MODEL") {
            self.completion_model = model;
        }
        if let Some(endpoint) = lookup("TRIAGE_CLASSIFIER_ENDPOINT") {
            self.classifier_endpoint = endpoint;
        }
        if let Some(credential) = lookup("TRIAGE_COMPLETION_CREDENTIAL") {
            self.completion_credential = Some(credential);
        } else if self.completion_credential.is_none() {
            self.completion_credential = lookup("OPENAI_API_KEY");
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.completion_endpoint.trim().is_empty() {
            anyhow::bail!("completion_endpoint must not be empty");
        }
        if self.classifier_endpoint.trim().is_empty() {
            anyhow::bail!("classifier_endpoint must not be empty");
        }
        if self.completion_model.trim().is_empty() {
            anyhow::bail!("completion_model must not be empty");
        }
        if self.feature_vector_length == 0 {
            anyhow::bail!("feature_vector_length must be greater than zero");
        }
        if self.domains.is_empty() {
            anyhow::bail!("At least one domain must be configured");
        }

        let mut seen_names = std::collections::HashSet::new();
        let mut seen_keys = std::collections::HashSet::new();
        for domain in &self.domains {
            if domain.name.trim().is_empty() {
                anyhow::bail!("Domain names must not be empty");
            }
            if !seen_names.insert(domain.name.as_str()) {
                anyhow::bail!("Duplicate domain: {}", domain.name);
            }
            if !seen_keys.insert(domain.feature_key()) {
                anyhow::bail!(
                    "Domain '{}' reuses feature key '{}'",
                    domain.name,
                    domain.feature_key()
                );
            }
        }

        Ok(())
    }

    /// Client settings for the completion service
    pub fn completion_client_config(&self) -> ServiceClientConfig {
        let config = ServiceClientConfig::new(self.completion_endpoint.clone())
            .with_timeout(self.completion_timeout_secs)
            .with_model(self.completion_model.clone());
        match &self.completion_credential {
            Some(credential) => config.with_credential(credential.clone()),
            None => config,
        }
    }

    /// Client settings for the classification service
    pub fn classifier_client_config(&self) -> ServiceClientConfig {
        ServiceClientConfig::new(self.classifier_endpoint.clone())
            .with_timeout(self.classifier_timeout_secs)
            .with_retries(self.classifier_max_retries, self.classifier_retry_backoff_ms)
    }
}

/// Load per-domain feature vectors from a YAML or JSON file
pub fn load_inputs<P: AsRef<Path>>(path: P) -> Result<DomainInputs> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read inputs file {}", path.display()))?;
    let inputs: DomainInputs = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse inputs file {}", path.display()))?;
    Ok(inputs)
}
