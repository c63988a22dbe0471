use std::sync::Arc;

use crate::{
    aead::KmsAead,
    config::ClientConfig,
    context::CallContext,
    error::{KmsError, KmsResult},
    service::{KeyManagementService, RestKmsService},
    signer::KmsSigner,
};

/// Scheme marker every key URI handled by this crate starts with.
pub const GCP_PREFIX: &str = "gcp-kms://";

/// Hands out KMS-backed primitives for key URIs under one prefix.
#[derive(Clone)]
pub struct GcpKmsClient {
    key_uri_prefix: String,
    kms: Arc<dyn KeyManagementService>,
}

pub struct GcpKmsClientBuilder {
    key_uri_prefix: String,
    config: Option<ClientConfig>,
    kms: Option<Arc<dyn KeyManagementService>>,
}

impl GcpKmsClientBuilder {
    /// Use the REST transport configured by `config`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing service implementation. Takes precedence over
    /// [`Self::config`].
    pub fn service(mut self, kms: Arc<dyn KeyManagementService>) -> Self {
        self.kms = Some(kms);
        self
    }

    pub fn build(self) -> KmsResult<GcpKmsClient> {
        if !self.key_uri_prefix.to_lowercase().starts_with(GCP_PREFIX) {
            return Err(KmsError::InvalidKeyUri {
                uri: self.key_uri_prefix,
                prefix: GCP_PREFIX,
            });
        }
        let kms: Arc<dyn KeyManagementService> = match (self.kms, self.config) {
            (Some(kms), _) => kms,
            (None, Some(config)) => Arc::new(RestKmsService::new(&config)?),
            (None, None) => return Err(KmsError::MissingClient),
        };
        Ok(GcpKmsClient {
            key_uri_prefix: self.key_uri_prefix,
            kms,
        })
    }
}

impl GcpKmsClient {
    /// `uri_prefix` must have the form `gcp-kms://[path]`.
    pub fn builder(uri_prefix: impl Into<String>) -> GcpKmsClientBuilder {
        GcpKmsClientBuilder {
            key_uri_prefix: uri_prefix.into(),
            config: None,
            kms: None,
        }
    }

    pub fn new(uri_prefix: impl Into<String>, config: ClientConfig) -> KmsResult<Self> {
        Self::builder(uri_prefix).config(config).build()
    }

    pub fn key_uri_prefix(&self) -> &str {
        &self.key_uri_prefix
    }

    pub fn supported(&self, key_uri: &str) -> bool {
        key_uri.starts_with(&self.key_uri_prefix)
    }

    pub fn get_aead(&self, key_uri: &str) -> KmsResult<KmsAead> {
        if !self.supported(key_uri) {
            return Err(KmsError::UnsupportedKeyUri(key_uri.to_string()));
        }
        Ok(KmsAead::new(strip_prefix(key_uri), self.kms.clone()))
    }

    /// Fetches and validates the public key of `key_uri`. A bare key name is
    /// accepted; a `gcp-kms://` URI must fall under this client's prefix.
    pub async fn get_signer(&self, ctx: &CallContext, key_uri: &str) -> KmsResult<KmsSigner> {
        if key_uri.starts_with(GCP_PREFIX) && !self.supported(key_uri) {
            return Err(KmsError::UnsupportedKeyUri(key_uri.to_string()));
        }
        KmsSigner::new(ctx, strip_prefix(key_uri), self.kms.clone()).await
    }
}

/// AEAD for a single key URI, on a client of its own.
pub fn get_aead_with_context(key_uri: &str, config: ClientConfig) -> KmsResult<KmsAead> {
    GcpKmsClient::new(key_uri, config)?.get_aead(key_uri)
}

fn strip_prefix(key_uri: &str) -> &str {
    key_uri.strip_prefix(GCP_PREFIX).unwrap_or(key_uri)
}
