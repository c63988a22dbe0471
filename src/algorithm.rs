use crate::{
    common::{CryptoKeyVersionAlgorithm, Digest, ProtectionLevel},
    error::{KmsError, KmsResult},
};

use CryptoKeyVersionAlgorithm::*;

/// Signing algorithms the signer accepts.
pub fn is_supported(algorithm: CryptoKeyVersionAlgorithm) -> bool {
    matches!(
        algorithm,
        EcSignEd25519
            | EcSignP256Sha256
            | EcSignP384Sha384
            | EcSignSecp256k1Sha256
            | RsaSignPss2048Sha256
            | RsaSignPss3072Sha256
            | RsaSignPss4096Sha256
            | RsaSignPss4096Sha512
            | RsaSignPkcs12048Sha256
            | RsaSignPkcs13072Sha256
            | RsaSignPkcs14096Sha256
            | RsaSignPkcs14096Sha512
            | RsaSignRawPkcs12048
            | RsaSignRawPkcs13072
            | RsaSignRawPkcs14096
    )
}

/// Whether AsymmetricSign must be given the message itself rather than a
/// digest of it. Externally protected keys always take the message.
pub fn requires_data_for_sign(
    algorithm: CryptoKeyVersionAlgorithm,
    protection_level: ProtectionLevel,
) -> bool {
    matches!(
        algorithm,
        EcSignEd25519 | RsaSignRawPkcs12048 | RsaSignRawPkcs13072 | RsaSignRawPkcs14096
    ) || matches!(
        protection_level,
        ProtectionLevel::External | ProtectionLevel::ExternalVpc
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn for_algorithm(algorithm: CryptoKeyVersionAlgorithm) -> KmsResult<Self> {
        match algorithm {
            EcSignP256Sha256
            | EcSignSecp256k1Sha256
            | RsaSignPss2048Sha256
            | RsaSignPss3072Sha256
            | RsaSignPss4096Sha256
            | RsaSignPkcs12048Sha256
            | RsaSignPkcs13072Sha256
            | RsaSignPkcs14096Sha256 => Ok(HashAlgorithm::Sha256),
            EcSignP384Sha384 => Ok(HashAlgorithm::Sha384),
            RsaSignPss4096Sha512 | RsaSignPkcs14096Sha512 => Ok(HashAlgorithm::Sha512),
            other => Err(KmsError::DigestUnsupported(other)),
        }
    }

    /// Hashes `data`, tagging the result with its width.
    pub fn digest(self, data: &[u8]) -> Digest {
        match self {
            HashAlgorithm::Sha256 => Digest::Sha256(hash::<sha2::Sha256>(data)),
            HashAlgorithm::Sha384 => Digest::Sha384(hash::<sha2::Sha384>(data)),
            HashAlgorithm::Sha512 => Digest::Sha512(hash::<sha2::Sha512>(data)),
        }
    }
}

fn hash<H: digest::Digest>(data: &[u8]) -> Vec<u8> {
    H::digest(data).to_vec()
}
