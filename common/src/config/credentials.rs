use super::file::{load_profile, ConfigError};
use log::info;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variables checked for an API key, in order of precedence.
pub const API_KEY_ENV_VARS: [&str; 2] = ["RESCALE_API_US_PROD", "RESCALE_API_KEY"];

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("API key from {origin} is empty")]
    MissingApiKey { origin: String },
}

/// API access resolved once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_base_url: String,
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Where to look for credentials when no environment override is present.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    /// Base URL paired with a key taken from the environment.
    pub api_base_url: String,
    pub config_file: PathBuf,
    pub profile: String,
}

/// Resolves credentials from the process environment or the profiles file.
pub fn resolve_credentials(request: &CredentialRequest) -> Result<Credentials, CredentialError> {
    resolve_credentials_with(request, |name| std::env::var(name).ok())
}

/// Same as [`resolve_credentials`] with an explicit environment lookup.
///
/// When one of [`API_KEY_ENV_VARS`] is set the profiles file is never opened.
pub fn resolve_credentials_with<F>(
    request: &CredentialRequest,
    env: F,
) -> Result<Credentials, CredentialError>
where
    F: Fn(&str) -> Option<String>,
{
    let from_env = API_KEY_ENV_VARS
        .iter()
        .find_map(|name| env(name).map(|key| (*name, key)));

    let (credentials, origin) = match from_env {
        Some((name, api_key)) => {
            info!("Read API key from environment variable {}.", name);
            (
                Credentials {
                    api_base_url: request.api_base_url.clone(),
                    api_key,
                },
                format!("environment variable {name}"),
            )
        }
        None => {
            let profile = load_profile(&request.config_file, &request.profile)?;
            (
                Credentials {
                    api_base_url: profile.apibaseurl,
                    api_key: profile.apikey,
                },
                format!(
                    "profile {:?} in {}",
                    request.profile,
                    request.config_file.display()
                ),
            )
        }
    };

    if credentials.api_key.trim().is_empty() {
        return Err(CredentialError::MissingApiKey { origin });
    }

    info!("api_base_url is {}.", credentials.api_base_url);
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn request(config_file: PathBuf, profile: &str) -> CredentialRequest {
        CredentialRequest {
            api_base_url: "https://platform.rescale.com".to_string(),
            config_file,
            profile: profile.to_string(),
        }
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn env_key_skips_malformed_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"this is [not an ini file\n==\n").unwrap();

        let credentials = resolve_credentials_with(
            &request(file.path().to_path_buf(), "missing"),
            env(&[("RESCALE_API_KEY", "env-key")]),
        )
        .unwrap();

        assert_eq!(credentials.api_key, "env-key");
        assert_eq!(credentials.api_base_url, "https://platform.rescale.com");
    }

    #[test]
    fn env_key_skips_missing_config() {
        let credentials = resolve_credentials_with(
            &request(PathBuf::from("/nonexistent/apiconfig"), "default"),
            env(&[("RESCALE_API_KEY", "env-key")]),
        )
        .unwrap();

        assert_eq!(credentials.api_key, "env-key");
    }

    #[test]
    fn us_prod_variable_takes_precedence() {
        let credentials = resolve_credentials_with(
            &request(PathBuf::from("/nonexistent/apiconfig"), "default"),
            env(&[("RESCALE_API_KEY", "generic"), ("RESCALE_API_US_PROD", "us-prod")]),
        )
        .unwrap();

        assert_eq!(credentials.api_key, "us-prod");
    }

    #[test]
    fn falls_back_to_profile() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"[prod]\napibaseurl = https://platform.rescale.com\napikey = prod-key\n\n\
              [demo-company]\napibaseurl = https://eu.rescale.com\napikey = demo-key\n",
        )
        .unwrap();

        let credentials = resolve_credentials_with(
            &request(file.path().to_path_buf(), "demo-company"),
            env(&[]),
        )
        .unwrap();

        assert_eq!(
            credentials,
            Credentials {
                api_base_url: "https://eu.rescale.com".to_string(),
                api_key: "demo-key".to_string(),
            }
        );
    }

    #[test]
    fn missing_config_without_env_fails() {
        let err = resolve_credentials_with(
            &request(PathBuf::from("/nonexistent/apiconfig"), "default"),
            env(&[]),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CredentialError::Config(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = resolve_credentials_with(
            &request(PathBuf::from("/nonexistent/apiconfig"), "default"),
            env(&[("RESCALE_API_KEY", "  ")]),
        )
        .unwrap_err();

        assert!(matches!(err, CredentialError::MissingApiKey { .. }));
    }

    #[test]
    fn debug_hides_api_key() {
        let credentials = Credentials {
            api_base_url: "https://platform.rescale.com".to_string(),
            api_key: "super-secret".to_string(),
        };

        assert!(!format!("{credentials:?}").contains("super-secret"));
    }
}
