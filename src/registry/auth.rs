use anyhow::{Context, Result};
use base64::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Docker Hub hosts credentials may be stored under, in lookup order
const DOCKER_HUB_HOSTS: &[&str] = &["docker.io", "index.docker.io", "registry-1.docker.io"];

/// Docker config.json structure
#[derive(Debug, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerAuthEntry>,
}

/// Auth entry in docker config
#[derive(Debug, Deserialize)]
struct DockerAuthEntry {
    #[serde(default)]
    auth: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// Basic-auth credentials for the registry.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub token: String,
}

impl RegistryCredentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    /// Read Docker Hub credentials from a `config.json` / `.dockerconfigjson` file.
    pub fn from_docker_config_file(path: &Path) -> Result<Option<Self>> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read docker config {}", path.display()))?;
        Self::from_docker_config(&data)
    }

    /// Parse Docker Hub credentials out of a docker config document.
    pub fn from_docker_config(data: &[u8]) -> Result<Option<Self>> {
        let config: DockerConfig =
            serde_json::from_slice(data).context("Failed to parse docker config")?;

        // Several keys can name Docker Hub; sort them so the pick is stable
        let mut keys: Vec<&String> = config.auths.keys().collect();
        keys.sort();

        for host in DOCKER_HUB_HOSTS {
            for key in keys.iter().filter(|k| normalize_registry_key(k) == *host) {
                let Some(entry) = config.auths.get(*key) else {
                    continue;
                };

                match parse_auth_entry(entry) {
                    Ok(Some(creds)) => {
                        debug!("Found registry credentials under {}", key);
                        return Ok(Some(creds));
                    },
                    Ok(None) => debug!("Entry {} has no credentials, trying next", key),
                    Err(e) => warn!("Ignoring unusable credentials under {}: {:#}", key, e),
                }
            }
        }

        Ok(None)
    }
}

// The token is a secret; keep it out of logs and panics.
impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

fn parse_auth_entry(entry: &DockerAuthEntry) -> Result<Option<RegistryCredentials>> {
    if !entry.username.is_empty() && !entry.password.is_empty() {
        return Ok(Some(RegistryCredentials::new(
            entry.username.clone(),
            entry.password.clone(),
        )));
    }

    // base64 encoded username:password
    if !entry.auth.is_empty() {
        let decoded = BASE64_STANDARD
            .decode(entry.auth.as_bytes())
            .context("Failed to decode auth token")?;

        let auth_str = String::from_utf8(decoded).context("Auth token is not valid UTF-8")?;

        if let Some((username, token)) = auth_str.split_once(':') {
            return Ok(Some(RegistryCredentials::new(username, token)));
        }
    }

    Ok(None)
}

/// `https://index.docker.io/v1/` and `index.docker.io` name the same registry
fn normalize_registry_key(key: &str) -> &str {
    key.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .trim_end_matches("/v1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_registry_key() {
        assert_eq!(normalize_registry_key("docker.io"), "docker.io");
        assert_eq!(
            normalize_registry_key("https://index.docker.io/v1/"),
            "index.docker.io"
        );
        assert_eq!(
            normalize_registry_key("registry-1.docker.io/v1/"),
            "registry-1.docker.io"
        );
        assert_eq!(normalize_registry_key("https://quay.io"), "quay.io");
    }

    #[test]
    fn test_docker_config_skips_empty_hub_entries() {
        let config = br#"{"auths":{
            "docker.io":{},
            "index.docker.io":{},
            "registry-1.docker.io":{},
            "https://index.docker.io/v1/":{"username":"bot","password":"s3cret"}
        }}"#;

        // HashMap order varies between parses, the answer must not
        for _ in 0..200 {
            let creds = RegistryCredentials::from_docker_config(config)
                .unwrap()
                .unwrap();
            assert_eq!(creds, RegistryCredentials::new("bot", "s3cret"));
        }
    }

    #[test]
    fn test_docker_config_prefers_docker_io() {
        let config = br#"{"auths":{
            "https://index.docker.io/v1/":{"username":"legacy","password":"old"},
            "docker.io":{"username":"bot","password":"s3cret"}
        }}"#;

        let creds = RegistryCredentials::from_docker_config(config)
            .unwrap()
            .unwrap();
        assert_eq!(creds.username, "bot");
    }

    #[test]
    fn test_docker_config_skips_undecodable_auth() {
        let config = br#"{"auths":{
            "docker.io":{"auth":"%%%not-base64%%%"},
            "index.docker.io":{"username":"bot","password":"s3cret"}
        }}"#;

        let creds = RegistryCredentials::from_docker_config(config)
            .unwrap()
            .unwrap();
        assert_eq!(creds.username, "bot");
    }

    #[test]
    fn test_docker_config_with_username_password() {
        let config = br#"{"auths":{"https://index.docker.io/v1/":{"username":"bot","password":"s3cret"}}}"#;

        let creds = RegistryCredentials::from_docker_config(config)
            .unwrap()
            .unwrap();
        assert_eq!(creds, RegistryCredentials::new("bot", "s3cret"));
    }

    #[test]
    fn test_docker_config_with_encoded_auth() {
        let auth = BASE64_STANDARD.encode("bot:tok:en");
        let config = format!(r#"{{"auths":{{"docker.io":{{"auth":"{}"}}}}}}"#, auth);

        let creds = RegistryCredentials::from_docker_config(config.as_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(creds.username, "bot");
        assert_eq!(creds.token, "tok:en");
    }

    #[test]
    fn test_docker_config_other_registry_only() {
        let config = br#"{"auths":{"gcr.io":{"username":"u","password":"p"}}}"#;
        assert!(
            RegistryCredentials::from_docker_config(config)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_docker_config_invalid_json() {
        assert!(RegistryCredentials::from_docker_config(b"not json").is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = RegistryCredentials::new("bot", "s3cret");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("bot"));
        assert!(!rendered.contains("s3cret"));
    }
}
