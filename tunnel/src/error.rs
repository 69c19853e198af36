use thiserror::Error;

#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Configuration error: {0}")]
    Config(#[from] common::ConfigError),

    #[error("Credential error: {0}")]
    Credential(common::CredentialError),

    #[error("SSH identity error: {0}")]
    Identity(#[from] ssh::SshError),

    #[error("API error: {0}")]
    Api(#[from] platform::ApiError),

    #[error(transparent)]
    KeyGeneration(#[from] ssh::KeyGenerationError),
}

impl From<common::CredentialError> for TunnelError {
    fn from(err: common::CredentialError) -> Self {
        match err {
            common::CredentialError::Config(err) => TunnelError::Config(err),
            other => TunnelError::Credential(other),
        }
    }
}
