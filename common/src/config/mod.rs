mod credentials;
mod file;

pub use credentials::{
    resolve_credentials, resolve_credentials_with, CredentialError, CredentialRequest,
    Credentials, API_KEY_ENV_VARS,
};
pub use file::{expand_path, load_profile, ApiProfile, ConfigError};

/// Base URL used when the API key comes from the environment.
pub const DEFAULT_API_BASE_URL: &str = "https://platform.rescale.com";

/// Profiles file shared with the Rescale CLI.
pub const DEFAULT_API_CONFIG_FILE: &str = "~/.config/rescale/apiconfig";

pub const DEFAULT_API_PROFILE: &str = "default";
