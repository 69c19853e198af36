pub mod config;

pub use config::{ConfigError, CredentialError, Credentials};
