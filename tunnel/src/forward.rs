use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ForwardSpecError {
    #[error("expected port:host:hostport, got {0:?}")]
    Format(String),
    #[error("invalid port {0:?}, expected 1-65535")]
    Port(String),
    #[error("host must not be empty")]
    EmptyHost,
}

/// An `ssh -L` specification: `local_port:host:remote_port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalForward {
    pub local_port: u16,
    pub host: String,
    pub remote_port: u16,
}

fn parse_port(value: &str) -> Result<u16, ForwardSpecError> {
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ForwardSpecError::Port(value.to_string())),
    }
}

impl FromStr for LocalForward {
    type Err = ForwardSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [local_port, host, remote_port] = parts.as_slice() else {
            return Err(ForwardSpecError::Format(s.to_string()));
        };

        if host.trim().is_empty() {
            return Err(ForwardSpecError::EmptyHost);
        }

        Ok(Self {
            local_port: parse_port(local_port)?,
            host: host.to_string(),
            remote_port: parse_port(remote_port)?,
        })
    }
}

impl fmt::Display for LocalForward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.local_port, self.host, self.remote_port)
    }
}
