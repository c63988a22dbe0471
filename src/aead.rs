use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    checksum::compute_checksum,
    common::{DecryptRequest, EncryptRequest},
    context::CallContext,
    error::{KmsError, KmsResult},
    service::KeyManagementService,
};

/// Authenticated encryption with associated data.
///
/// The `*_with_context` methods are the real operations; `encrypt` and
/// `decrypt` run them under [`CallContext::background`].
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Aead: Send + Sync {
    async fn encrypt_with_context(
        &self,
        ctx: &CallContext,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> KmsResult<Vec<u8>>;

    async fn decrypt_with_context(
        &self,
        ctx: &CallContext,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> KmsResult<Vec<u8>>;

    async fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> KmsResult<Vec<u8>> {
        self.encrypt_with_context(&CallContext::background(), plaintext, associated_data)
            .await
    }

    async fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> KmsResult<Vec<u8>> {
        self.decrypt_with_context(&CallContext::background(), ciphertext, associated_data)
            .await
    }
}

/// AEAD backed by a Cloud KMS symmetric key.
#[derive(Clone)]
pub struct KmsAead {
    key_name: String,
    kms: Arc<dyn KeyManagementService>,
}

impl KmsAead {
    /// `key_name` is used as given; no format is enforced on this path.
    pub fn new(key_name: impl Into<String>, kms: Arc<dyn KeyManagementService>) -> Self {
        Self {
            key_name: key_name.into(),
            kms,
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Aead for KmsAead {
    async fn encrypt_with_context(
        &self,
        ctx: &CallContext,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> KmsResult<Vec<u8>> {
        let request = EncryptRequest {
            name: self.key_name.clone(),
            plaintext: plaintext.to_vec(),
            plaintext_crc32c: Some(compute_checksum(plaintext)),
            additional_authenticated_data: associated_data.to_vec(),
            additional_authenticated_data_crc32c: Some(compute_checksum(associated_data)),
        };

        let response = ctx.run("Encrypt", self.kms.encrypt(request)).await?;

        if !response.verified_plaintext_crc32c {
            tracing::warn!(key = %self.key_name, "plaintext checksum not verified by KMS");
            return Err(KmsError::RequestChecksumUnverified {
                key: self.key_name.clone(),
                field: "plaintext_crc32c",
            });
        }
        if !response.verified_additional_authenticated_data_crc32c {
            tracing::warn!(key = %self.key_name, "associated data checksum not verified by KMS");
            return Err(KmsError::RequestChecksumUnverified {
                key: self.key_name.clone(),
                field: "additional_authenticated_data_crc32c",
            });
        }
        // The response names the primary version, so it only has to extend
        // the requested key name.
        if !response.name.starts_with(&self.key_name) {
            tracing::warn!(key = %self.key_name, received = %response.name, "key name mismatch in KMS response");
            return Err(KmsError::KeyNameMismatch {
                requested: self.key_name.clone(),
                received: response.name,
            });
        }
        if response.ciphertext_crc32c.unwrap_or_default() != compute_checksum(&response.ciphertext) {
            tracing::warn!(key = %self.key_name, "ciphertext corrupted in transit");
            return Err(KmsError::ResponseCorrupted {
                key: self.key_name.clone(),
                field: "ciphertext",
            });
        }

        tracing::debug!(key = %response.name, len = response.ciphertext.len(), "encrypted");
        Ok(response.ciphertext)
    }

    async fn decrypt_with_context(
        &self,
        ctx: &CallContext,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> KmsResult<Vec<u8>> {
        let request = DecryptRequest {
            name: self.key_name.clone(),
            ciphertext: ciphertext.to_vec(),
            ciphertext_crc32c: Some(compute_checksum(ciphertext)),
            additional_authenticated_data: associated_data.to_vec(),
            additional_authenticated_data_crc32c: Some(compute_checksum(associated_data)),
        };

        let response = ctx.run("Decrypt", self.kms.decrypt(request)).await?;

        if response.plaintext_crc32c.unwrap_or_default() != compute_checksum(&response.plaintext) {
            tracing::warn!(key = %self.key_name, "plaintext corrupted in transit");
            return Err(KmsError::ResponseCorrupted {
                key: self.key_name.clone(),
                field: "plaintext",
            });
        }

        tracing::debug!(key = %self.key_name, len = response.plaintext.len(), "decrypted");
        Ok(response.plaintext)
    }
}
