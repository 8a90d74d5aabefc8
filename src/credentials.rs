use crate::config::CredentialsConfig;
use crate::error::AuthConfigurationError;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Supplies the API key sent with every board request.
pub trait CredentialProvider: Send + Sync {
    fn api_key(&self) -> Result<String, AuthConfigurationError>;
}

pub struct EnvCredentials {
    pub variable: String,
}

impl CredentialProvider for EnvCredentials {
    fn api_key(&self) -> Result<String, AuthConfigurationError> {
        std::env::var(&self.variable)
            .map_err(|_| AuthConfigurationError::MissingVariable(self.variable.clone()))
    }
}

/// Reads a secrets-manager style JSON document, e.g. `{"monday-api-key": "..."}`,
/// mounted on disk by the deployment.
pub struct SecretFileCredentials {
    pub path: PathBuf,
    pub key: String,
}

impl CredentialProvider for SecretFileCredentials {
    fn api_key(&self) -> Result<String, AuthConfigurationError> {
        let content =
            fs::read_to_string(&self.path).map_err(|source| AuthConfigurationError::Unreadable {
                path: self.path.clone(),
                source,
            })?;
        let document: HashMap<String, serde_json::Value> = serde_json::from_str(&content)
            .map_err(|source| AuthConfigurationError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        match document.get(&self.key) {
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            _ => Err(AuthConfigurationError::MissingKey {
                path: self.path.clone(),
                key: self.key.clone(),
            }),
        }
    }
}

pub fn from_config(config: &CredentialsConfig) -> Box<dyn CredentialProvider> {
    match config {
        CredentialsConfig::Env { variable } => Box::new(EnvCredentials {
            variable: variable.clone(),
        }),
        CredentialsConfig::SecretFile { path, key } => Box::new(SecretFileCredentials {
            path: path.clone(),
            key: key.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn secret_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "site-atlas-{}-{}.json",
            name,
            std::process::id()
        ));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn env_provider_returns_value_verbatim() {
        std::env::set_var("SITE_ATLAS_TEST_KEY", " abc123 ");
        let provider = EnvCredentials {
            variable: "SITE_ATLAS_TEST_KEY".to_string(),
        };
        assert_eq!(provider.api_key().unwrap(), " abc123 ");
    }

    #[test]
    fn env_provider_fails_when_unset() {
        let provider = EnvCredentials {
            variable: "SITE_ATLAS_DEFINITELY_UNSET".to_string(),
        };
        assert!(matches!(
            provider.api_key(),
            Err(AuthConfigurationError::MissingVariable(v)) if v == "SITE_ATLAS_DEFINITELY_UNSET"
        ));
    }

    #[test]
    fn secret_file_provider_reads_named_key() {
        let path = secret_file("ok", r#"{"monday-api-key": "secret", "other": 1}"#);
        let provider = from_config(&CredentialsConfig::SecretFile {
            path: path.clone(),
            key: "monday-api-key".to_string(),
        });
        assert_eq!(provider.api_key().unwrap(), "secret");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn secret_file_provider_fails_loudly() {
        let missing_key = secret_file("nokey", r#"{"other": "x"}"#);
        let provider = SecretFileCredentials {
            path: missing_key.clone(),
            key: "monday-api-key".to_string(),
        };
        assert!(matches!(
            provider.api_key(),
            Err(AuthConfigurationError::MissingKey { .. })
        ));

        let malformed = secret_file("bad", "not json");
        let provider = SecretFileCredentials {
            path: malformed.clone(),
            key: "monday-api-key".to_string(),
        };
        assert!(matches!(
            provider.api_key(),
            Err(AuthConfigurationError::Malformed { .. })
        ));

        let provider = SecretFileCredentials {
            path: PathBuf::from("/nonexistent/site-atlas/secret.json"),
            key: "monday-api-key".to_string(),
        };
        assert!(matches!(
            provider.api_key(),
            Err(AuthConfigurationError::Unreadable { .. })
        ));

        let _ = fs::remove_file(missing_key);
        let _ = fs::remove_file(malformed);
    }
}
