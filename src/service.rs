use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    ClientBuilder, Response,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    common::{
        AsymmetricSignRequest, AsymmetricSignResponse, DecryptRequest, DecryptResponse,
        EncryptRequest, EncryptResponse, GetPublicKeyRequest, PublicKey,
    },
    config::ClientConfig,
    error::{KmsError, KmsResult, RpcError},
};

/// The four Cloud KMS primitives the adapters are built on.
///
/// Implementations only move requests and responses; every integrity check
/// happens in the adapters.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait KeyManagementService: Send + Sync {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, RpcError>;

    async fn decrypt(&self, request: DecryptRequest) -> Result<DecryptResponse, RpcError>;

    async fn get_public_key(&self, request: GetPublicKeyRequest) -> Result<PublicKey, RpcError>;

    async fn asymmetric_sign(
        &self,
        request: AsymmetricSignRequest,
    ) -> Result<AsymmetricSignResponse, RpcError>;
}

/// Cloud KMS over the v1 JSON API.
#[derive(Clone, Debug)]
pub struct RestKmsService {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

impl RestKmsService {
    pub fn new(config: &ClientConfig) -> KmsResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| KmsError::Config(format!("invalid access token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = ClientBuilder::new()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| KmsError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self::with_client(client, &config.endpoint))
    }

    /// Wraps an already configured client, e.g. one carrying its own auth
    /// middleware headers.
    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, name: &str, suffix: &str) -> String {
        format!("{}/{}{}", self.endpoint, name, suffix)
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        name: &str,
        method: &str,
        body: &Req,
    ) -> Result<Resp, RpcError> {
        let url = self.url(name, method);
        tracing::debug!(%url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        Self::read(response).await
    }

    async fn read<Resp: DeserializeOwned>(response: Response) -> Result<Resp, RpcError> {
        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await?;
            return serde_json::from_slice(&body).map_err(RpcError::MalformedResponse);
        }

        let body = response.text().await?;
        let rejected = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(ErrorEnvelope { error }) => RpcError::Rejected {
                code: if error.code == 0 { status.as_u16() } else { error.code },
                status: error.status,
                message: error.message,
            },
            Err(_) => RpcError::Rejected {
                code: status.as_u16(),
                status: status.canonical_reason().unwrap_or_default().to_string(),
                message: body,
            },
        };
        Err(rejected)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl KeyManagementService for RestKmsService {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, RpcError> {
        self.post(&request.name, ":encrypt", &request).await
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<DecryptResponse, RpcError> {
        self.post(&request.name, ":decrypt", &request).await
    }

    async fn get_public_key(&self, request: GetPublicKeyRequest) -> Result<PublicKey, RpcError> {
        let url = self.url(&request.name, "/publicKey");
        tracing::debug!(%url, format = %request.public_key_format, "GET");
        let response = self
            .client
            .get(&url)
            .query(&[("publicKeyFormat", request.public_key_format.as_str())])
            .send()
            .await?;
        Self::read(response).await
    }

    async fn asymmetric_sign(
        &self,
        request: AsymmetricSignRequest,
    ) -> Result<AsymmetricSignResponse, RpcError> {
        self.post(&request.name, ":asymmetricSign", &request).await
    }
}
