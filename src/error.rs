use crate::common::CryptoKeyVersionAlgorithm;

pub type KmsResult<T> = Result<T, KmsError>;

/// Failure of a single remote call, before any response validation.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The service could not be reached, or its reply could not be read.
    #[error("could not reach service: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with success but the body could not be decoded,
    /// e.g. a base64 field damaged in transit.
    #[error("service returned an unreadable response: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    /// The service answered with an error status.
    #[error("service rejected request ({code} {status}): {message}")]
    Rejected {
        code: u16,
        status: String,
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum KmsError {
    #[error("key URI {uri:?} must start with {prefix}")]
    InvalidKeyUri { uri: String, prefix: &'static str },

    #[error("unsupported key URI {0:?}")]
    UnsupportedKeyUri(String),

    #[error("key name {0:?} does not match the expected format \"projects/*/locations/*/keyRings/*/cryptoKeys/*/cryptoKeyVersions/*\"")]
    InvalidKeyName(String),

    #[error("kms client cannot be absent")]
    MissingClient,

    #[error("the input data ({len} bytes) is larger than the allowed limit ({limit} bytes)")]
    DataTooLarge { len: usize, limit: usize },

    #[error("public key format is required")]
    PublicKeyFormatRequired,

    #[error("GCP KMS {operation} failed: {source}")]
    Rpc {
        operation: &'static str,
        #[source]
        source: RpcError,
    },

    #[error("GCP KMS {operation} was cancelled")]
    Cancelled { operation: &'static str },

    #[error("GCP KMS {operation} exceeded its deadline")]
    DeadlineExceeded { operation: &'static str },

    #[error("KMS request for {key:?} is missing the checksum field {field}, and other information may be missing from the response. Please retry a limited number of times in case the error is transient")]
    RequestChecksumUnverified { key: String, field: &'static str },

    #[error("checking the input checksum failed for {key:?}: the response verified neither data_crc32c nor digest_crc32c")]
    InputChecksumUnverified { key: String },

    #[error("the response key name {received:?} does not match the requested key name {requested:?}")]
    KeyNameMismatch { requested: String, received: String },

    #[error("KMS response corrupted in transit for {key:?}: the checksum in field {field}_crc32c did not match the data in field {field}. Please retry in case this is a transient error")]
    ResponseCorrupted { key: String, field: &'static str },

    #[error("public key checksum verification failed: received {received}, calculated {calculated}")]
    PublicKeyChecksumMismatch { received: i64, calculated: i64 },

    #[error("the given algorithm {0} is not supported")]
    UnsupportedAlgorithm(CryptoKeyVersionAlgorithm),

    #[error("algorithm {0} does not support digests")]
    DigestUnsupported(CryptoKeyVersionAlgorithm),

    #[error("invalid public key material: {0}")]
    InvalidPublicKey(#[from] pem::PemError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl KmsError {
    pub(crate) fn rpc(operation: &'static str) -> impl FnOnce(RpcError) -> KmsError {
        move |source| KmsError::Rpc { operation, source }
    }

    /// True when the service answered but the answer could not be trusted.
    /// Such failures are usually transient and the whole operation may be
    /// retried by the caller.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            KmsError::RequestChecksumUnverified { .. }
                | KmsError::InputChecksumUnverified { .. }
                | KmsError::KeyNameMismatch { .. }
                | KmsError::ResponseCorrupted { .. }
                | KmsError::PublicKeyChecksumMismatch { .. }
                | KmsError::Rpc {
                    source: RpcError::MalformedResponse(_),
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_class() {
        let corrupted = KmsError::ResponseCorrupted {
            key: "k".into(),
            field: "ciphertext",
        };
        assert!(corrupted.is_integrity_failure());
        assert!(corrupted.to_string().contains("ciphertext_crc32c"));

        let rejected = KmsError::Rpc {
            operation: "Encrypt",
            source: RpcError::Rejected {
                code: 404,
                status: "NOT_FOUND".into(),
                message: "Key not found".into(),
            },
        };
        assert!(!rejected.is_integrity_failure());
        assert_eq!(
            rejected.to_string(),
            "GCP KMS Encrypt failed: service rejected request (404 NOT_FOUND): Key not found"
        );
        assert!(!KmsError::MissingClient.is_integrity_failure());

        let unreadable = KmsError::Rpc {
            operation: "Decrypt",
            source: RpcError::MalformedResponse(
                serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            ),
        };
        assert!(unreadable.is_integrity_failure());
        assert!(unreadable
            .to_string()
            .contains("service returned an unreadable response"));
    }
}
