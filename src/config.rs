use std::time::Duration;

use crate::error::{KmsError, KmsResult};

pub const DEFAULT_ENDPOINT: &str = "https://cloudkms.googleapis.com/v1";

pub const ENDPOINT_ENV: &str = "GCP_KMS_ENDPOINT";
pub const ACCESS_TOKEN_ENV: &str = "GCP_KMS_ACCESS_TOKEN";
pub const TIMEOUT_ENV: &str = "GCP_KMS_TIMEOUT_SECS";

/// Settings for the REST transport.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL the key names are appended to.
    pub endpoint: String,
    /// OAuth2 bearer token sent with every request. Obtaining it is up to the
    /// caller.
    pub access_token: Option<String>,
    pub user_agent: String,
    /// Per-request timeout enforced by the HTTP client.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            user_agent: tink_user_agent(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> KmsResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> KmsResult<Self> {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|v| !v.is_empty()) {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(KmsError::Config(format!(
                    "{ENDPOINT_ENV} must be an http(s) URL, got {endpoint:?}"
                )));
            }
            config.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        config.access_token = lookup(ACCESS_TOKEN_ENV).filter(|v| !v.is_empty());
        if let Some(secs) = lookup(TIMEOUT_ENV).filter(|v| !v.is_empty()) {
            let secs: u64 = secs.parse().map_err(|e| {
                KmsError::Config(format!("{TIMEOUT_ENV} must be a number of seconds: {e}"))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub fn tink_user_agent() -> String {
    format!("Tink/{} Rust", env!("CARGO_PKG_VERSION"))
}
