use russh::keys::ssh_key::LineEnding;
use russh::keys::{Algorithm, HashAlg, PrivateKey};
use std::fmt;
use thiserror::Error;

const KEY_COMMENT: &str = "tunnel-maker";

#[derive(Error, Debug)]
#[error("SSH key generation failed: {0}")]
pub struct KeyGenerationError(pub String);

/// Ephemeral keypair created once per run.
#[derive(Clone)]
pub struct Keypair {
    /// Private key in OpenSSH PEM format, no passphrase.
    pub private_key: String,
    /// Single authorized_keys line: `ssh-ed25519 <base64> tunnel-maker`.
    pub public_key: String,
    /// SHA256 fingerprint of the public key.
    pub fingerprint: String,
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// Generates a fresh Ed25519 keypair from the thread-local CSPRNG.
pub fn generate() -> Result<Keypair, KeyGenerationError> {
    log::info!("Creating temporary SSH keypair.");

    let key = PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519)
        .map_err(|e| KeyGenerationError(e.to_string()))?;

    let private_key = key
        .to_openssh(LineEnding::LF)
        .map_err(|e| KeyGenerationError(e.to_string()))?
        .to_string();

    let public = key.public_key();
    let fingerprint = public.fingerprint(HashAlg::Sha256).to_string();
    let encoded = public
        .to_openssh()
        .map_err(|e| KeyGenerationError(e.to_string()))?;

    log::debug!("Generated keypair {}", fingerprint);

    Ok(Keypair {
        private_key,
        public_key: format!("{} {}", encoded, KEY_COMMENT),
        fingerprint,
    })
}
