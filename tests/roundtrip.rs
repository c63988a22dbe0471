use std::sync::Arc;

use async_trait::async_trait;
use tink_gcpkms::{
    checksum::compute_checksum,
    common::{
        AsymmetricSignRequest, AsymmetricSignResponse, DecryptRequest, DecryptResponse,
        EncryptRequest, EncryptResponse, GetPublicKeyRequest, PublicKey,
    },
    Aead, CallContext, GcpKmsClient, KeyManagementService, KmsError, RpcError,
};
use tokio_util::sync::CancellationToken;

const KEY_URI: &str = "gcp-kms://projects/P1/locations/L1/keyRings/R1/cryptoKeys/K1";
const PRIMARY_VERSION: &str = "/cryptoKeyVersions/1";

/// Toy symmetric KMS: binds the associated data's checksum into the
/// ciphertext and refuses to decrypt under any other associated data.
struct ToyKms;

fn scramble(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|b| b ^ 0x5A).collect()
}

fn rejected(code: u16, status: &str, message: &str) -> RpcError {
    RpcError::Rejected {
        code,
        status: status.into(),
        message: message.into(),
    }
}

#[async_trait]
impl KeyManagementService for ToyKms {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, RpcError> {
        let aad_tag = compute_checksum(&request.additional_authenticated_data) as u32;
        let mut ciphertext = aad_tag.to_be_bytes().to_vec();
        ciphertext.extend(scramble(&request.plaintext));
        Ok(EncryptResponse {
            name: format!("{}{}", request.name, PRIMARY_VERSION),
            ciphertext_crc32c: Some(compute_checksum(&ciphertext)),
            ciphertext,
            verified_plaintext_crc32c: request.plaintext_crc32c
                == Some(compute_checksum(&request.plaintext)),
            verified_additional_authenticated_data_crc32c: request
                .additional_authenticated_data_crc32c
                == Some(compute_checksum(&request.additional_authenticated_data)),
            ..Default::default()
        })
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<DecryptResponse, RpcError> {
        if request.ciphertext_crc32c != Some(compute_checksum(&request.ciphertext)) {
            return Err(rejected(400, "INVALID_ARGUMENT", "ciphertext_crc32c mismatch"));
        }
        if request.ciphertext.len() < 4 {
            return Err(rejected(400, "INVALID_ARGUMENT", "Decryption failed"));
        }
        let (tag, body) = request.ciphertext.split_at(4);
        let aad_tag = compute_checksum(&request.additional_authenticated_data) as u32;
        if tag != aad_tag.to_be_bytes() {
            return Err(rejected(400, "INVALID_ARGUMENT", "Decryption failed"));
        }
        let plaintext = scramble(body);
        Ok(DecryptResponse {
            plaintext_crc32c: Some(compute_checksum(&plaintext)),
            plaintext,
            used_primary: true,
            ..Default::default()
        })
    }

    async fn get_public_key(&self, _: GetPublicKeyRequest) -> Result<PublicKey, RpcError> {
        Err(rejected(400, "FAILED_PRECONDITION", "not an asymmetric key"))
    }

    async fn asymmetric_sign(
        &self,
        _: AsymmetricSignRequest,
    ) -> Result<AsymmetricSignResponse, RpcError> {
        Err(rejected(400, "FAILED_PRECONDITION", "not an asymmetric key"))
    }
}

fn client() -> GcpKmsClient {
    GcpKmsClient::builder("gcp-kms://")
        .service(Arc::new(ToyKms))
        .build()
        .unwrap()
}

#[tokio::test]
async fn encrypt_then_decrypt_round_trips() {
    let aead = client().get_aead(KEY_URI).unwrap();
    let cases: [(&[u8], &[u8]); 4] = [
        (b"plaintext", b"additional data"),
        (b"", b"additional data"),
        (b"plaintext", b""),
        (&[0u8; 4096], b"\x00\x01"),
    ];
    for (plaintext, associated_data) in cases {
        let ciphertext = aead.encrypt(plaintext, associated_data).await.unwrap();
        assert_ne!(ciphertext, plaintext);
        let decrypted = aead.decrypt(&ciphertext, associated_data).await.unwrap();
        assert_eq!(decrypted, plaintext);
    }
}

#[tokio::test]
async fn decrypt_with_other_associated_data_fails() {
    let aead = client().get_aead(KEY_URI).unwrap();
    let ciphertext = aead.encrypt(b"plaintext", b"aad").await.unwrap();

    let err = aead.decrypt(&ciphertext, b"other aad").await.unwrap_err();
    assert!(matches!(
        err,
        KmsError::Rpc {
            operation: "Decrypt",
            source: RpcError::Rejected { code: 400, .. }
        }
    ));
    assert!(!err.is_integrity_failure());
}

#[tokio::test]
async fn cancelled_context_stops_the_call() {
    let aead = client().get_aead(KEY_URI).unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = CallContext::background().with_cancellation(token);

    let err = aead
        .encrypt_with_context(&ctx, b"plaintext", b"aad")
        .await
        .unwrap_err();
    assert!(matches!(err, KmsError::Cancelled { operation: "Encrypt" }));
}

#[tokio::test]
async fn signer_on_symmetric_key_surfaces_rejection() {
    let err = client()
        .get_signer(
            &CallContext::background(),
            "gcp-kms://projects/P1/locations/L1/keyRings/R1/cryptoKeys/K1/cryptoKeyVersions/1",
        )
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("GCP KMS GetPublicKey failed"));
}
