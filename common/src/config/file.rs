use ini::{Ini, ParseOption};
use log::{error, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("API configuration file {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read API configuration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("Profile {profile:?} not found in {}", path.display())]
    ProfileNotFound { profile: String, path: PathBuf },

    #[error("Key {key:?} must be defined for profile {profile:?} in {}", path.display())]
    MissingKey {
        key: &'static str,
        profile: String,
        path: PathBuf,
    },

    #[error("Failed to expand path {path}: {message}")]
    Expand { path: String, message: String },
}

/// One section of the API profiles file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiProfile {
    pub apibaseurl: String,
    pub apikey: String,
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(path)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .map_err(|e| ConfigError::Expand {
            path: path.to_string(),
            message: e.to_string(),
        })
}

/// Section whose keys every profile inherits.
const DEFAULT_SECTION: &str = "DEFAULT";

/// Reads the ini style profiles file and returns the named section.
///
/// Keys from a `[DEFAULT]` section fill in whatever the profile leaves out.
/// Section names are taken literally, dots included.
///
/// ```ini
/// [default]
/// apibaseurl = https://platform.rescale.com
/// apikey = 0123abcd
/// ```
pub fn load_profile(path: &Path, profile: &str) -> Result<ApiProfile, ConfigError> {
    info!(
        "Reading API configuration file {}, profile: {:?}",
        path.display(),
        profile
    );

    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let option = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_file_opt(path, option).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let defaults = ini.section(Some(DEFAULT_SECTION));
    let selected = ini.section(Some(profile)).ok_or_else(|| ConfigError::ProfileNotFound {
        profile: profile.to_string(),
        path: path.to_path_buf(),
    })?;

    let mut section: HashMap<String, String> = HashMap::new();
    for properties in defaults.into_iter().chain(Some(selected)) {
        for (key, value) in properties.iter() {
            section.insert(key.to_lowercase(), value.to_string());
        }
    }

    let mut take = |key: &'static str| {
        section.remove(key).ok_or_else(|| {
            error!(
                "Keys 'apikey' and 'apibaseurl' must be defined for profile {:?} in file {}",
                profile,
                path.display()
            );
            ConfigError::MissingKey {
                key,
                profile: profile.to_string(),
                path: path.to_path_buf(),
            }
        })
    };

    let apikey = take("apikey")?;
    let apibaseurl = take("apibaseurl")?;

    Ok(ApiProfile { apibaseurl, apikey })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const TWO_PROFILES: &str = "\
[prod]
apibaseurl = https://platform.rescale.com
apikey = prod-key

[demo-company]
apibaseurl = https://eu.rescale.com
apikey = demo-key
";

    #[test]
    fn selects_only_the_named_section() {
        let file = write_config(TWO_PROFILES);

        let profile = load_profile(file.path(), "demo-company").unwrap();
        assert_eq!(profile.apibaseurl, "https://eu.rescale.com");
        assert_eq!(profile.apikey, "demo-key");

        let profile = load_profile(file.path(), "prod").unwrap();
        assert_eq!(profile.apibaseurl, "https://platform.rescale.com");
        assert_eq!(profile.apikey, "prod-key");
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apiconfig");

        let err = load_profile(&path, "default").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(p) if p == path));
    }

    #[test]
    fn missing_profile_is_reported() {
        let file = write_config(TWO_PROFILES);

        let err = load_profile(file.path(), "default").unwrap_err();
        match err {
            ConfigError::ProfileNotFound { profile, .. } => assert_eq!(profile, "default"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_key_names_the_key() {
        let file = write_config("[default]\napibaseurl = https://platform.rescale.com\n");

        let err = load_profile(file.path(), "default").unwrap_err();
        match err {
            ConfigError::MissingKey { key, profile, .. } => {
                assert_eq!(key, "apikey");
                assert_eq!(profile, "default");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unterminated_section_is_a_parse_error() {
        let file = write_config("[prod\napikey = k1\n");

        let err = load_profile(file.path(), "prod").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn dotted_section_names_are_plain_profiles() {
        let file = write_config(
            "\
[prod]
apibaseurl = https://platform.rescale.com
apikey = prod-key

[eu.prod]
apibaseurl = https://eu.rescale.com
apikey = eu-key
",
        );

        let profile = load_profile(file.path(), "prod").unwrap();
        assert_eq!(profile.apikey, "prod-key");

        let profile = load_profile(file.path(), "eu.prod").unwrap();
        assert_eq!(profile.apibaseurl, "https://eu.rescale.com");
        assert_eq!(profile.apikey, "eu-key");
    }

    #[test]
    fn profiles_inherit_default_section() {
        let file = write_config(
            "\
[DEFAULT]
apibaseurl = https://kr.rescale.com
apikey = shared-key

[prod]
apikey = k1

[staging]
apibaseurl = https://staging.rescale.com
",
        );

        let profile = load_profile(file.path(), "prod").unwrap();
        assert_eq!(profile.apibaseurl, "https://kr.rescale.com");
        assert_eq!(profile.apikey, "k1");

        let profile = load_profile(file.path(), "staging").unwrap();
        assert_eq!(profile.apibaseurl, "https://staging.rescale.com");
        assert_eq!(profile.apikey, "shared-key");
    }

    #[test]
    fn keys_are_case_insensitive_and_values_kept_verbatim() {
        let file = write_config("[prod]\nApiBaseUrl = https://platform.rescale.com\nAPIKEY = \"k1\"\n");

        let profile = load_profile(file.path(), "prod").unwrap();
        assert_eq!(profile.apibaseurl, "https://platform.rescale.com");
        assert_eq!(profile.apikey, "\"k1\"");
    }

    #[test]
    fn expand_path_resolves_home() {
        let expanded = expand_path("~/.config/rescale/apiconfig").unwrap();
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with(".config/rescale/apiconfig"));
    }
}
