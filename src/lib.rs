//! Tink primitives backed by Google Cloud KMS.
//!
//! [`KmsAead`] and [`KmsSigner`] wrap the Cloud KMS Encrypt, Decrypt,
//! GetPublicKey and AsymmetricSign calls. Every request field is sent with
//! its CRC32C and every response is checked before it is handed back: the
//! server must confirm it verified our checksums, the key name must match,
//! and the returned payload must match the checksum the server attached.
//!
//! ```rust,no_run
//! use tink_gcpkms::{Aead, ClientConfig, GcpKmsClient};
//!
//! # async fn run() -> Result<(), tink_gcpkms::KmsError> {
//! let client = GcpKmsClient::new("gcp-kms://", ClientConfig::from_env()?)?;
//! let aead = client.get_aead(
//!     "gcp-kms://projects/p/locations/global/keyRings/r/cryptoKeys/k",
//! )?;
//! let ciphertext = aead.encrypt(b"secret", b"context").await?;
//! assert_eq!(aead.decrypt(&ciphertext, b"context").await?, b"secret");
//! # Ok(())
//! # }
//! ```

pub mod aead;
pub mod algorithm;
pub mod checksum;
pub mod client;
pub mod common;
pub mod config;
pub mod context;
pub mod error;
pub mod service;
pub mod signer;

#[cfg(test)]
mod testing;

pub use aead::{Aead, KmsAead};
pub use client::{get_aead_with_context, GcpKmsClient, GCP_PREFIX};
pub use config::ClientConfig;
pub use context::CallContext;
pub use error::{KmsError, KmsResult, RpcError};
pub use service::{KeyManagementService, RestKmsService};
pub use signer::{KmsSigner, Signer, MAX_SIGN_DATA_SIZE};
