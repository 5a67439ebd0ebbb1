//! Resolving the API keys the session needs.
//!
//! Keys come from one of two places: environment variables (optionally
//! loaded from a `.env` file), or a TOML secrets file. Either way they are
//! validated before any request is made.

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use serde::Deserialize;
use thiserror::Error;

/// Name of the model API key.
pub const MODEL_KEY_NAME: &str = "OPENROUTER_API_KEY";
/// Name of the search API key.
pub const SEARCH_KEY_NAME: &str = "SERPAPI_API_KEY";
/// The prefix OpenRouter keys start with.
pub const DEFAULT_KEY_PREFIX: &str = "sk-or-";

const DEFAULT_ENV_FILE: &str = ".env";

/// Errors that prevent a session from being created.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key is absent or empty.
    #[error("`{name}` is not set in {location}")]
    MissingKey {
        /// The key name.
        name: &'static str,
        /// Where the key was looked up.
        location: CredentialSource,
    },
    /// The model key doesn't have the expected prefix.
    #[error("`{name}` in {location} doesn't start with `{prefix}`")]
    InvalidKey {
        /// The key name.
        name: &'static str,
        /// The expected prefix.
        prefix: String,
        /// Where the key was found.
        location: CredentialSource,
    },
    /// A credential file exists but cannot be read.
    #[error("cannot read {}: {error}", path.display())]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },
    /// A `.env` file is malformed.
    #[error("cannot parse {}: {error}", path.display())]
    ParseEnv {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        error: dotenvy::Error,
    },
    /// A secrets file is not valid TOML.
    #[error("cannot parse {}: {error}", path.display())]
    ParseSecrets {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },
}

impl ConfigError {
    /// Returns a suggestion for how to fix the error.
    pub fn hint(&self) -> String {
        match self {
            ConfigError::MissingKey { name, location }
            | ConfigError::InvalidKey { name, location, .. } => match location {
                CredentialSource::Env { .. } => format!(
                    "export {name}=<your key>, or add `{name}=<your key>` to \
                     your .env file"
                ),
                CredentialSource::SecretsFile(path) => format!(
                    "add `{name} = \"<your key>\"` to {}",
                    path.display()
                ),
            },
            ConfigError::Read { path, .. } => {
                format!("check that {} exists and is readable", path.display())
            }
            ConfigError::ParseEnv { path, .. } => format!(
                "fix the syntax of {}, each line should look like KEY=value",
                path.display()
            ),
            ConfigError::ParseSecrets { path, .. } => format!(
                "fix the syntax of {}, each line should look like \
                 KEY = \"value\"",
                path.display()
            ),
        }
    }
}

/// Where to look for credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    /// Environment variables, after loading a `.env` file.
    Env {
        /// The `.env` file. A missing file is only an error if it was given
        /// explicitly.
        env_file: Option<PathBuf>,
    },
    /// A TOML file holding the keys.
    SecretsFile(PathBuf),
}

impl Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Env { .. } => write!(f, "the environment"),
            CredentialSource::SecretsFile(path) => {
                write!(f, "{}", path.display())
            }
        }
    }
}

/// What the loaded credentials must satisfy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requirements {
    /// The prefix the model key must start with. Empty disables the check.
    pub key_prefix: String,
    /// Whether a search key is needed.
    pub search: bool,
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            search: true,
        }
    }
}

/// Validated API keys.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    model_api_key: String,
    search_api_key: Option<String>,
}

impl Credentials {
    /// Returns the model API key.
    #[inline]
    pub fn model_api_key(&self) -> &str {
        &self.model_api_key
    }

    /// Returns the search API key, present if it was required or provided.
    #[inline]
    pub fn search_api_key(&self) -> Option<&str> {
        self.search_api_key.as_deref()
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("model_api_key", &"<redacted>")
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    #[serde(rename = "OPENROUTER_API_KEY", alias = "api_key")]
    model_api_key: Option<String>,
    #[serde(rename = "SERPAPI_API_KEY", alias = "serpapi")]
    search_api_key: Option<String>,
}

impl CredentialSource {
    /// Loads and validates the credentials.
    pub fn load(
        &self,
        requirements: &Requirements,
    ) -> Result<Credentials, ConfigError> {
        let (model_api_key, search_api_key) = match self {
            CredentialSource::Env { env_file } => {
                let file_vars = read_env_file(env_file.as_deref())?;
                let lookup = |name: &str| {
                    env::var(name).ok().or_else(|| file_vars.get(name).cloned())
                };
                (lookup(MODEL_KEY_NAME), lookup(SEARCH_KEY_NAME))
            }
            CredentialSource::SecretsFile(path) => {
                let secrets = read_secrets_file(path)?;
                (secrets.model_api_key, secrets.search_api_key)
            }
        };
        self.validate(model_api_key, search_api_key, requirements)
    }

    fn validate(
        &self,
        model_api_key: Option<String>,
        search_api_key: Option<String>,
        requirements: &Requirements,
    ) -> Result<Credentials, ConfigError> {
        let non_empty = |key: Option<String>| {
            key.map(|key| key.trim().to_owned())
                .filter(|key| !key.is_empty())
        };

        let Some(model_api_key) = non_empty(model_api_key) else {
            return Err(ConfigError::MissingKey {
                name: MODEL_KEY_NAME,
                location: self.clone(),
            });
        };
        if !model_api_key.starts_with(&requirements.key_prefix) {
            return Err(ConfigError::InvalidKey {
                name: MODEL_KEY_NAME,
                prefix: requirements.key_prefix.clone(),
                location: self.clone(),
            });
        }

        let search_api_key = non_empty(search_api_key);
        if requirements.search && search_api_key.is_none() {
            return Err(ConfigError::MissingKey {
                name: SEARCH_KEY_NAME,
                location: self.clone(),
            });
        }

        debug!("loaded credentials from {self}");
        Ok(Credentials {
            model_api_key,
            search_api_key,
        })
    }
}

/// Reads `KEY=value` pairs without touching the process environment.
fn read_env_file(
    path: Option<&Path>,
) -> Result<HashMap<String, String>, ConfigError> {
    let explicit = path.is_some();
    let path = path.unwrap_or(Path::new(DEFAULT_ENV_FILE));

    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) if err.not_found() && !explicit => {
            trace!("no env file at {}", path.display());
            return Ok(HashMap::new());
        }
        Err(dotenvy::Error::Io(error)) => {
            return Err(ConfigError::Read {
                path: path.to_owned(),
                error,
            });
        }
        Err(error) => {
            return Err(ConfigError::ParseEnv {
                path: path.to_owned(),
                error,
            });
        }
    };

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|error| ConfigError::ParseEnv {
            path: path.to_owned(),
            error,
        })?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn read_secrets_file(path: &Path) -> Result<SecretsFile, ConfigError> {
    let text = fs::read_to_string(path).map_err(|error| ConfigError::Read {
        path: path.to_owned(),
        error,
    })?;
    toml::from_str(&text).map_err(|error| ConfigError::ParseSecrets {
        path: path.to_owned(),
        error,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn secrets_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_secrets_file() {
        let file = secrets_file(
            r#"
OPENROUTER_API_KEY = "sk-or-v1-abc"
SERPAPI_API_KEY = "serp-123"
"#,
        );
        let source = CredentialSource::SecretsFile(file.path().to_owned());
        let credentials = source.load(&Requirements::default()).unwrap();
        assert_eq!(credentials.model_api_key(), "sk-or-v1-abc");
        assert_eq!(credentials.search_api_key(), Some("serp-123"));
    }

    #[test]
    fn test_secrets_file_aliases() {
        let file = secrets_file(
            r#"
api_key = "sk-or-v1-abc"
serpapi = "serp-123"
unrelated = 1
"#,
        );
        let source = CredentialSource::SecretsFile(file.path().to_owned());
        let credentials = source.load(&Requirements::default()).unwrap();
        assert_eq!(credentials.model_api_key(), "sk-or-v1-abc");
        assert_eq!(credentials.search_api_key(), Some("serp-123"));
    }

    #[test]
    fn test_missing_search_key() {
        let file = secrets_file(r#"OPENROUTER_API_KEY = "sk-or-v1-abc""#);
        let source = CredentialSource::SecretsFile(file.path().to_owned());

        let err = source.load(&Requirements::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingKey {
                name: SEARCH_KEY_NAME,
                ..
            }
        ));
        assert!(err.hint().contains("SERPAPI_API_KEY = "));

        // Fine when search is disabled.
        let requirements = Requirements {
            search: false,
            ..Default::default()
        };
        let credentials = source.load(&requirements).unwrap();
        assert_eq!(credentials.search_api_key(), None);
    }

    #[test]
    fn test_key_validation() {
        let file = secrets_file(
            r#"
OPENROUTER_API_KEY = "sk-proj-abc"
SERPAPI_API_KEY = "serp-123"
"#,
        );
        let source = CredentialSource::SecretsFile(file.path().to_owned());

        let err = source.load(&Requirements::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKey { .. }));

        let requirements = Requirements {
            key_prefix: String::new(),
            ..Default::default()
        };
        assert!(source.load(&requirements).is_ok());

        let file = secrets_file(
            r#"
OPENROUTER_API_KEY = "   "
SERPAPI_API_KEY = "serp-123"
"#,
        );
        let source = CredentialSource::SecretsFile(file.path().to_owned());
        let err = source.load(&Requirements::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingKey {
                name: MODEL_KEY_NAME,
                ..
            }
        ));
    }

    #[test]
    fn test_file_errors() {
        let source = CredentialSource::SecretsFile(
            "/nonexistent/chatloop/secrets.toml".into(),
        );
        let err = source.load(&Requirements::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let file = secrets_file("OPENROUTER_API_KEY = ");
        let source = CredentialSource::SecretsFile(file.path().to_owned());
        let err = source.load(&Requirements::default()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseSecrets { .. }));

        let source = CredentialSource::Env {
            env_file: Some("/nonexistent/chatloop/.env".into()),
        };
        let err = source.load(&Requirements::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_env_file() {
        let file = secrets_file("CHATLOOP_TEST_ONLY=1\nSOME_OTHER=two words\n");
        let vars = read_env_file(Some(file.path())).unwrap();
        assert_eq!(vars.get("CHATLOOP_TEST_ONLY").map(String::as_str), Some("1"));
        assert_eq!(
            vars.get("SOME_OTHER").map(String::as_str),
            Some("two words")
        );
    }

    #[test]
    fn test_env_validation() {
        let source = CredentialSource::Env { env_file: None };
        let err = source
            .validate(None, None, &Requirements::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "`OPENROUTER_API_KEY` is not set in the environment");
        assert!(err.hint().starts_with("export OPENROUTER_API_KEY="));

        let credentials = source
            .validate(
                Some("sk-or-v1-abc\n".to_owned()),
                Some("serp".to_owned()),
                &Requirements::default(),
            )
            .unwrap();
        assert_eq!(credentials.model_api_key(), "sk-or-v1-abc");
        assert!(!format!("{credentials:?}").contains("sk-or"));
    }
}
