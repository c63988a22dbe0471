use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    algorithm::{is_supported, requires_data_for_sign, HashAlgorithm},
    checksum::compute_checksum,
    common::{
        AsymmetricSignRequest, CryptoKeyVersionAlgorithm, GcpKeyRef, GetPublicKeyRequest,
        ProtectionLevel, PublicKey, PublicKeyFormat, SignInput,
    },
    context::CallContext,
    error::{KmsError, KmsResult, RpcError},
    service::KeyManagementService,
};

/// Largest message AsymmetricSign accepts.
pub const MAX_SIGN_DATA_SIZE: usize = 64 * 1024;

/// Public key fetches that fail checksum validation, or whose reply cannot
/// be decoded, are retried up to this many attempts in total.
const PUBLIC_KEY_ATTEMPTS: usize = 3;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Signer: Send + Sync {
    async fn sign_with_context(&self, ctx: &CallContext, data: &[u8]) -> KmsResult<Vec<u8>>;

    async fn sign(&self, data: &[u8]) -> KmsResult<Vec<u8>> {
        self.sign_with_context(&CallContext::background(), data).await
    }
}

/// Signs with one Cloud KMS asymmetric key version.
///
/// The public key and algorithm are fetched and validated once, in
/// [`KmsSigner::new`]; afterwards the signer holds no mutable state and can be
/// shared freely between tasks.
#[derive(Clone)]
pub struct KmsSigner {
    key: GcpKeyRef,
    // `key.to_specifier()`, sent with every request.
    key_name: String,
    kms: Arc<dyn KeyManagementService>,
    public_key: Arc<PublicKey>,
}

impl std::fmt::Debug for KmsSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmsSigner")
            .field("key_name", &self.key_name)
            .field("algorithm", &self.public_key.algorithm)
            .field("protection_level", &self.public_key.protection_level)
            .finish()
    }
}

impl KmsSigner {
    pub async fn new(
        ctx: &CallContext,
        key_name: &str,
        kms: Arc<dyn KeyManagementService>,
    ) -> KmsResult<Self> {
        let key: GcpKeyRef = key_name.parse()?;
        let key_name = key.to_specifier();

        let public_key = get_public_key(ctx, kms.as_ref(), &key_name).await?;
        if !is_supported(public_key.algorithm) {
            return Err(KmsError::UnsupportedAlgorithm(public_key.algorithm));
        }

        tracing::debug!(
            key = %key_name,
            algorithm = %public_key.algorithm,
            protection_level = %public_key.protection_level,
            "signer ready"
        );
        Ok(Self {
            key,
            key_name,
            kms,
            public_key: Arc::new(public_key),
        })
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn key_ref(&self) -> &GcpKeyRef {
        &self.key
    }

    pub fn algorithm(&self) -> CryptoKeyVersionAlgorithm {
        self.public_key.algorithm
    }

    pub fn protection_level(&self) -> ProtectionLevel {
        self.public_key.protection_level
    }

    /// The PEM-encoded public key, checksum-verified, exactly as fetched.
    pub fn public_key_pem(&self) -> &[u8] {
        key_material(&self.public_key).0
    }

    /// The DER body of [`Self::public_key_pem`].
    pub fn public_key_der(&self) -> KmsResult<Vec<u8>> {
        Ok(pem::parse(self.public_key_pem())?.into_contents())
    }

    fn build_request(&self, data: &[u8]) -> KmsResult<AsymmetricSignRequest> {
        let input = if requires_data_for_sign(self.algorithm(), self.protection_level()) {
            SignInput::Data {
                data: data.to_vec(),
                data_crc32c: Some(compute_checksum(data)),
            }
        } else {
            let digest = HashAlgorithm::for_algorithm(self.algorithm())?.digest(data);
            let digest_crc32c = Some(compute_checksum(digest.as_bytes()));
            SignInput::Digest {
                digest,
                digest_crc32c,
            }
        };
        Ok(AsymmetricSignRequest {
            name: self.key_name.clone(),
            input,
        })
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Signer for KmsSigner {
    async fn sign_with_context(&self, ctx: &CallContext, data: &[u8]) -> KmsResult<Vec<u8>> {
        if data.len() > MAX_SIGN_DATA_SIZE {
            return Err(KmsError::DataTooLarge {
                len: data.len(),
                limit: MAX_SIGN_DATA_SIZE,
            });
        }

        let request = self.build_request(data)?;
        let response = ctx
            .run("AsymmetricSign", self.kms.asymmetric_sign(request))
            .await?;

        if response.name != self.key_name {
            tracing::warn!(key = %self.key_name, received = %response.name, "key name mismatch in KMS response");
            return Err(KmsError::KeyNameMismatch {
                requested: self.key_name.clone(),
                received: response.name,
            });
        }
        // Only one of data or digest is ever sent, so one flag is enough.
        if !response.verified_data_crc32c && !response.verified_digest_crc32c {
            tracing::warn!(key = %self.key_name, "sign input checksum not verified by KMS");
            return Err(KmsError::InputChecksumUnverified {
                key: self.key_name.clone(),
            });
        }
        if response.signature_crc32c.unwrap_or_default() != compute_checksum(&response.signature) {
            tracing::warn!(key = %self.key_name, "signature corrupted in transit");
            return Err(KmsError::ResponseCorrupted {
                key: self.key_name.clone(),
                field: "signature",
            });
        }

        tracing::debug!(key = %self.key_name, len = response.signature.len(), "signed");
        Ok(response.signature)
    }
}

/// Key bytes and their checksum. Older responses only carry `pem`.
fn key_material(public_key: &PublicKey) -> (&[u8], Option<i64>) {
    match &public_key.public_key {
        Some(data) => (&data.data, data.crc32c_checksum),
        None => (public_key.pem.as_bytes(), public_key.pem_crc32c),
    }
}

async fn try_get_public_key(
    ctx: &CallContext,
    kms: &dyn KeyManagementService,
    request: &GetPublicKeyRequest,
) -> KmsResult<PublicKey> {
    if request.public_key_format == PublicKeyFormat::Unspecified {
        return Err(KmsError::PublicKeyFormatRequired);
    }
    let response = ctx
        .run("GetPublicKey", kms.get_public_key(request.clone()))
        .await?;

    let (data, received) = key_material(&response);
    let received = received.unwrap_or_default();
    let calculated = compute_checksum(data);
    if received != calculated {
        return Err(KmsError::PublicKeyChecksumMismatch {
            received,
            calculated,
        });
    }
    Ok(response)
}

fn is_retryable(err: &KmsError) -> bool {
    matches!(
        err,
        KmsError::PublicKeyChecksumMismatch { .. }
            | KmsError::Rpc {
                source: RpcError::MalformedResponse(_),
                ..
            }
    )
}

async fn get_public_key(
    ctx: &CallContext,
    kms: &dyn KeyManagementService,
    key_name: &str,
) -> KmsResult<PublicKey> {
    let request = GetPublicKeyRequest {
        name: key_name.to_string(),
        public_key_format: PublicKeyFormat::Pem,
    };

    let mut attempt = 1;
    let response = loop {
        match try_get_public_key(ctx, kms, &request).await {
            Err(err) if is_retryable(&err) && attempt < PUBLIC_KEY_ATTEMPTS => {
                tracing::warn!(key = %key_name, attempt, error = %err, "retrying public key fetch");
                attempt += 1;
            }
            result => break result?,
        }
    };

    if response.name != key_name {
        tracing::warn!(key = %key_name, received = %response.name, "key name mismatch in public key response");
        return Err(KmsError::KeyNameMismatch {
            requested: key_name.to_string(),
            received: response.name,
        });
    }
    Ok(response)
}
