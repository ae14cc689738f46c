//! Service client configuration

use std::fmt;

/// Connection settings shared by the HTTP service clients
#[derive(Clone)]
pub struct ServiceClientConfig {
    /// Base URL of the service (no trailing path)
    pub endpoint: String,

    /// Bearer credential, if the service requires one
    pub credential: Option<String>,

    /// Model name, for services that serve more than one
    pub model: Option<String>,

    /// Timeout for a single request in seconds
    pub timeout_secs: u64,

    /// Extra attempts after a retryable failure
    pub max_retries: u32,

    /// Base delay between attempts; attempt `n` waits `n * retry_backoff_ms`
    pub retry_backoff_ms: u64,
}

impl Default for ServiceClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            credential: None,
            model: None,
            timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 0,
        }
    }
}

impl fmt::Debug for ServiceClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClientConfig")
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl ServiceClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_credential(mut self, credential: String) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    /// Join a path onto the endpoint
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
