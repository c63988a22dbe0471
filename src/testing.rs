//! In-process stand-in for Cloud KMS used by the unit tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;

use crate::{
    common::{
        AsymmetricSignRequest, AsymmetricSignResponse, DecryptRequest, DecryptResponse,
        EncryptRequest, EncryptResponse, GetPublicKeyRequest, PublicKey,
    },
    error::RpcError,
    service::KeyManagementService,
};

type PublicKeyFn = dyn Fn(&GetPublicKeyRequest, usize) -> Result<PublicKey, RpcError> + Send + Sync;
type SignFn =
    dyn Fn(&AsymmetricSignRequest) -> Result<AsymmetricSignResponse, RpcError> + Send + Sync;

#[derive(Default)]
pub(crate) struct MockKms {
    encrypt: Option<EncryptResponse>,
    decrypt: Option<DecryptResponse>,
    public_key: Option<Box<PublicKeyFn>>,
    sign: Option<Box<SignFn>>,
    encrypt_requests: Mutex<Vec<EncryptRequest>>,
    decrypt_requests: Mutex<Vec<DecryptRequest>>,
    sign_requests: Mutex<Vec<AsymmetricSignRequest>>,
    public_key_calls: AtomicUsize,
}

pub(crate) fn internal_error() -> RpcError {
    RpcError::Rejected {
        code: 500,
        status: "INTERNAL".into(),
        message: "Internal error".into(),
    }
}

fn unimplemented() -> RpcError {
    RpcError::Rejected {
        code: 501,
        status: "UNIMPLEMENTED".into(),
        message: "not configured".into(),
    }
}

impl MockKms {
    pub fn with_encrypt(mut self, response: EncryptResponse) -> Self {
        self.encrypt = Some(response);
        self
    }

    pub fn with_decrypt(mut self, response: DecryptResponse) -> Self {
        self.decrypt = Some(response);
        self
    }

    /// The closure also receives how many times the key was fetched before.
    pub fn with_public_key(
        mut self,
        f: impl Fn(&GetPublicKeyRequest, usize) -> Result<PublicKey, RpcError> + Send + Sync + 'static,
    ) -> Self {
        self.public_key = Some(Box::new(f));
        self
    }

    pub fn with_sign(
        mut self,
        f: impl Fn(&AsymmetricSignRequest) -> Result<AsymmetricSignResponse, RpcError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.sign = Some(Box::new(f));
        self
    }

    pub fn last_encrypt(&self) -> Option<EncryptRequest> {
        self.encrypt_requests.lock().unwrap().last().cloned()
    }

    pub fn last_decrypt(&self) -> Option<DecryptRequest> {
        self.decrypt_requests.lock().unwrap().last().cloned()
    }

    pub fn sign_requests(&self) -> Vec<AsymmetricSignRequest> {
        self.sign_requests.lock().unwrap().clone()
    }

    pub fn public_key_calls(&self) -> usize {
        self.public_key_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyManagementService for MockKms {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, RpcError> {
        self.encrypt_requests.lock().unwrap().push(request);
        self.encrypt.clone().ok_or_else(unimplemented)
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<DecryptResponse, RpcError> {
        self.decrypt_requests.lock().unwrap().push(request);
        self.decrypt.clone().ok_or_else(unimplemented)
    }

    async fn get_public_key(&self, request: GetPublicKeyRequest) -> Result<PublicKey, RpcError> {
        let attempt = self.public_key_calls.fetch_add(1, Ordering::SeqCst);
        match &self.public_key {
            Some(f) => f(&request, attempt),
            None => Err(unimplemented()),
        }
    }

    async fn asymmetric_sign(
        &self,
        request: AsymmetricSignRequest,
    ) -> Result<AsymmetricSignResponse, RpcError> {
        let response = match &self.sign {
            Some(f) => f(&request),
            None => Err(unimplemented()),
        };
        self.sign_requests.lock().unwrap().push(request);
        response
    }
}
