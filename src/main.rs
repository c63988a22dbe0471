use base64::{prelude::BASE64_STANDARD, Engine};
use eyre::WrapErr;
use tink_gcpkms::{Aead, CallContext, ClientConfig, GcpKmsClient, Signer, GCP_PREFIX};
use tokio::time::Instant;

const AEAD_KEY_ENV: &str = "GCP_KMS_AEAD_KEY_URI";
const SIGN_KEY_ENV: &str = "GCP_KMS_SIGN_KEY_URI";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ClientConfig::from_env().wrap_err("reading client configuration")?;
    let start_time = Instant::now();
    let client = GcpKmsClient::new(GCP_PREFIX, config)?;

    let time_1 = Instant::now();
    tracing::info!("Client created in {:?}", time_1.duration_since(start_time));

    match std::env::var(AEAD_KEY_ENV) {
        Ok(key_uri) => aead_test(&client, &key_uri).await?,
        Err(_) => tracing::info!("{} not set, skipping encryption", AEAD_KEY_ENV),
    }
    match std::env::var(SIGN_KEY_ENV) {
        Ok(key_uri) => sign_test(&client, &key_uri).await?,
        Err(_) => tracing::info!("{} not set, skipping signing", SIGN_KEY_ENV),
    }
    Ok(())
}

async fn aead_test(client: &GcpKmsClient, key_uri: &str) -> eyre::Result<()> {
    let aead = client.get_aead(key_uri)?;
    let associated_data = b"tink-gcpkms demo";

    let time_1 = Instant::now();
    let ciphertext = aead
        .encrypt(b"hello from tink-gcpkms", associated_data)
        .await
        .wrap_err("encrypting")?;
    let time_2 = Instant::now();
    tracing::info!(
        "Encrypted {} bytes in {:?}",
        ciphertext.len(),
        time_2.duration_since(time_1)
    );

    let plaintext = aead
        .decrypt(&ciphertext, associated_data)
        .await
        .wrap_err("decrypting")?;
    let time_3 = Instant::now();
    tracing::info!("Decrypted in {:?}", time_3.duration_since(time_2));

    println!("Plaintext: {}", String::from_utf8_lossy(&plaintext));
    Ok(())
}

async fn sign_test(client: &GcpKmsClient, key_uri: &str) -> eyre::Result<()> {
    let time_1 = Instant::now();
    let signer = client
        .get_signer(&CallContext::background(), key_uri)
        .await
        .wrap_err("loading signer")?;
    let time_2 = Instant::now();
    tracing::info!(
        "Signer for {} ({}) created in {:?}",
        signer.key_name(),
        signer.algorithm(),
        time_2.duration_since(time_1)
    );

    let signature = signer
        .sign(b"hello from tink-gcpkms")
        .await
        .wrap_err("signing")?;
    let time_3 = Instant::now();
    tracing::info!("Message signed in {:?}", time_3.duration_since(time_2));

    println!("Signature: {}", BASE64_STANDARD.encode(&signature));
    Ok(())
}
