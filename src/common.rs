use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::KmsError;

/// Fully qualified name of a single Cloud KMS key version.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GcpKeyRef {
    pub project_id: String,
    pub location: String,
    pub key_ring: String,
    pub key_name: String,
    pub version: String,
}

const KEY_PATH_LABELS: [&str; 5] = [
    "projects",
    "locations",
    "keyRings",
    "cryptoKeys",
    "cryptoKeyVersions",
];

impl GcpKeyRef {
    pub fn to_specifier(&self) -> String {
        format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}/cryptoKeyVersions/{}",
            self.project_id, self.location, self.key_ring, self.key_name, self.version
        )
    }
}

impl FromStr for GcpKeyRef {
    type Err = KmsError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = name.split('/').collect();
        if segments.len() != KEY_PATH_LABELS.len() * 2 {
            return Err(KmsError::InvalidKeyName(name.to_string()));
        }
        let mut values: Vec<String> = Vec::with_capacity(KEY_PATH_LABELS.len());
        for (pair, label) in segments.chunks(2).zip(KEY_PATH_LABELS) {
            if pair[0] != label || pair[1].is_empty() {
                return Err(KmsError::InvalidKeyName(name.to_string()));
            }
            values.push(pair[1].to_string());
        }
        let [project_id, location, key_ring, key_name, version]: [String; 5] = values
            .try_into()
            .map_err(|_| KmsError::InvalidKeyName(name.to_string()))?;
        Ok(Self {
            project_id,
            location,
            key_ring,
            key_name,
            version,
        })
    }
}

impl fmt::Display for GcpKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_specifier())
    }
}

/// Declares a Cloud KMS enum whose JSON form is the upper-case proto name.
/// Values this crate does not know deserialize to `Unrecognized`.
macro_rules! kms_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident default $default:ident {
            $($variant:ident => $wire:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )*
            #[serde(other)]
            Unrecognized,
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)*
                    $name::Unrecognized => "UNRECOGNIZED",
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

kms_enum! {
    pub enum CryptoKeyVersionAlgorithm default Unspecified {
        Unspecified => "CRYPTO_KEY_VERSION_ALGORITHM_UNSPECIFIED",
        GoogleSymmetricEncryption => "GOOGLE_SYMMETRIC_ENCRYPTION",
        RsaSignPss2048Sha256 => "RSA_SIGN_PSS_2048_SHA256",
        RsaSignPss3072Sha256 => "RSA_SIGN_PSS_3072_SHA256",
        RsaSignPss4096Sha256 => "RSA_SIGN_PSS_4096_SHA256",
        RsaSignPss4096Sha512 => "RSA_SIGN_PSS_4096_SHA512",
        RsaSignPkcs12048Sha256 => "RSA_SIGN_PKCS1_2048_SHA256",
        RsaSignPkcs13072Sha256 => "RSA_SIGN_PKCS1_3072_SHA256",
        RsaSignPkcs14096Sha256 => "RSA_SIGN_PKCS1_4096_SHA256",
        RsaSignPkcs14096Sha512 => "RSA_SIGN_PKCS1_4096_SHA512",
        RsaSignRawPkcs12048 => "RSA_SIGN_RAW_PKCS1_2048",
        RsaSignRawPkcs13072 => "RSA_SIGN_RAW_PKCS1_3072",
        RsaSignRawPkcs14096 => "RSA_SIGN_RAW_PKCS1_4096",
        RsaDecryptOaep2048Sha256 => "RSA_DECRYPT_OAEP_2048_SHA256",
        RsaDecryptOaep3072Sha256 => "RSA_DECRYPT_OAEP_3072_SHA256",
        RsaDecryptOaep4096Sha256 => "RSA_DECRYPT_OAEP_4096_SHA256",
        RsaDecryptOaep4096Sha512 => "RSA_DECRYPT_OAEP_4096_SHA512",
        EcSignP256Sha256 => "EC_SIGN_P256_SHA256",
        EcSignP384Sha384 => "EC_SIGN_P384_SHA384",
        EcSignSecp256k1Sha256 => "EC_SIGN_SECP256K1_SHA256",
        EcSignEd25519 => "EC_SIGN_ED25519",
        HmacSha256 => "HMAC_SHA256",
    }
}

kms_enum! {
    pub enum ProtectionLevel default Unspecified {
        Unspecified => "PROTECTION_LEVEL_UNSPECIFIED",
        Software => "SOFTWARE",
        Hsm => "HSM",
        External => "EXTERNAL",
        ExternalVpc => "EXTERNAL_VPC",
    }
}

kms_enum! {
    pub enum PublicKeyFormat default Unspecified {
        Unspecified => "PUBLIC_KEY_FORMAT_UNSPECIFIED",
        Pem => "PEM",
        Der => "DER",
        NistPqc => "NIST_PQC",
        XWing => "XWING",
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptRequest {
    #[serde(skip)]
    pub name: String,
    #[serde(with = "base64_bytes", default)]
    pub plaintext: Vec<u8>,
    #[serde(with = "int64_string", default, skip_serializing_if = "Option::is_none")]
    pub plaintext_crc32c: Option<i64>,
    #[serde(with = "base64_bytes", default)]
    pub additional_authenticated_data: Vec<u8>,
    #[serde(with = "int64_string", default, skip_serializing_if = "Option::is_none")]
    pub additional_authenticated_data_crc32c: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptResponse {
    #[serde(default)]
    pub name: String,
    #[serde(with = "base64_bytes", default)]
    pub ciphertext: Vec<u8>,
    #[serde(with = "int64_string", default, skip_serializing_if = "Option::is_none")]
    pub ciphertext_crc32c: Option<i64>,
    #[serde(default)]
    pub verified_plaintext_crc32c: bool,
    #[serde(default)]
    pub verified_additional_authenticated_data_crc32c: bool,
    #[serde(default)]
    pub protection_level: ProtectionLevel,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    #[serde(skip)]
    pub name: String,
    #[serde(with = "base64_bytes", default)]
    pub ciphertext: Vec<u8>,
    #[serde(with = "int64_string", default, skip_serializing_if = "Option::is_none")]
    pub ciphertext_crc32c: Option<i64>,
    #[serde(with = "base64_bytes", default)]
    pub additional_authenticated_data: Vec<u8>,
    #[serde(with = "int64_string", default, skip_serializing_if = "Option::is_none")]
    pub additional_authenticated_data_crc32c: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecryptResponse {
    #[serde(with = "base64_bytes", default)]
    pub plaintext: Vec<u8>,
    #[serde(with = "int64_string", default, skip_serializing_if = "Option::is_none")]
    pub plaintext_crc32c: Option<i64>,
    #[serde(default)]
    pub used_primary: bool,
    #[serde(default)]
    pub protection_level: ProtectionLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetPublicKeyRequest {
    pub name: String,
    pub public_key_format: PublicKeyFormat,
}

/// Bytes together with the CRC32C the service computed over them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChecksummedData {
    #[serde(with = "base64_bytes", default)]
    pub data: Vec<u8>,
    #[serde(with = "int64_string", default, skip_serializing_if = "Option::is_none")]
    pub crc32c_checksum: Option<i64>,
}

impl ChecksummedData {
    pub fn new(data: Vec<u8>) -> Self {
        let crc32c_checksum = Some(crate::checksum::compute_checksum(&data));
        Self {
            data,
            crc32c_checksum,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pem: String,
    #[serde(with = "int64_string", default, skip_serializing_if = "Option::is_none")]
    pub pem_crc32c: Option<i64>,
    #[serde(default)]
    pub algorithm: CryptoKeyVersionAlgorithm,
    #[serde(default)]
    pub protection_level: ProtectionLevel,
    #[serde(default)]
    pub public_key_format: PublicKeyFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<ChecksummedData>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Digest {
    Sha256(#[serde(with = "base64_bytes")] Vec<u8>),
    Sha384(#[serde(with = "base64_bytes")] Vec<u8>),
    Sha512(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Digest::Sha256(bytes) | Digest::Sha384(bytes) | Digest::Sha512(bytes) => bytes,
        }
    }
}

/// What is handed to the service for signing: the message itself, or a
/// digest computed locally.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SignInput {
    Digest {
        digest: Digest,
        #[serde(
            rename = "digestCrc32c",
            with = "int64_string",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        digest_crc32c: Option<i64>,
    },
    Data {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        #[serde(
            rename = "dataCrc32c",
            with = "int64_string",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        data_crc32c: Option<i64>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AsymmetricSignRequest {
    #[serde(skip)]
    pub name: String,
    #[serde(flatten)]
    pub input: SignInput,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AsymmetricSignResponse {
    #[serde(default)]
    pub name: String,
    #[serde(with = "base64_bytes", default)]
    pub signature: Vec<u8>,
    #[serde(with = "int64_string", default, skip_serializing_if = "Option::is_none")]
    pub signature_crc32c: Option<i64>,
    #[serde(default)]
    pub verified_digest_crc32c: bool,
    #[serde(default)]
    pub verified_data_crc32c: bool,
    #[serde(default)]
    pub protection_level: ProtectionLevel,
}

/// Cloud KMS JSON carries bytes as standard base64.
pub(crate) mod base64_bytes {
    use base64::{prelude::BASE64_STANDARD, Engine};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

/// int64 fields travel as decimal strings in proto3 JSON; plain numbers are
/// accepted as well.
pub(crate) mod int64_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&value.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Text(text)) => text.parse().map(Some).map_err(D::Error::custom),
            Some(Raw::Number(value)) => Ok(Some(value)),
            None => Ok(None),
        }
    }
}
