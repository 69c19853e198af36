use thiserror::Error;

pub mod keygen;
pub mod remote;
mod ssh;
#[cfg(any(test, feature = "test-server"))]
pub mod test_server;

pub use keygen::{KeyGenerationError, Keypair};
pub use ssh::{resolve_identities, CommandOutput, SshSession, SshTarget};

#[derive(Error, Debug)]
pub enum SshError {
    #[error("SSH configuration error: {0}")]
    ConfigurationError(String),
    #[error("SSH connection error: {0}")]
    ConnectionError(String),
    #[error("SSH authentication error: {0}")]
    AuthenticationError(String),
    #[error("Remote command on {host} exited with status {exit_status}: {stderr}")]
    CommandFailed {
        host: String,
        exit_status: u32,
        stderr: String,
    },
}

impl From<std::io::Error> for SshError {
    fn from(err: std::io::Error) -> Self {
        SshError::ConnectionError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_names_host_and_status() {
        let err = SshError::CommandFailed {
            host: "10.0.0.5".to_string(),
            exit_status: 1,
            stderr: "Permission denied".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("10.0.0.5"));
        assert!(message.contains("status 1"));
        assert!(message.contains("Permission denied"));
    }
}
