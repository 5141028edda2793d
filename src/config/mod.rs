use crate::models::ReconciliationTarget;
use crate::registry::{DEFAULT_PAGE_SIZE, DEFAULT_REGISTRY_URL, RegistryCredentials};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const ENV_PREFIX: &str = "KUBERT_";

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(String),

    #[error("Invalid target '{0}'")]
    InvalidTarget(String),
}

/// Registry connection settings
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    pub page_size: u32,
    pub credentials: Option<RegistryCredentials>,
    /// Docker config file to read credentials from when none are given directly
    pub docker_config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub addr: String,
}

/// Startup configuration. Built once, never changed while running.
#[derive(Debug, Clone)]
pub struct KubertConfig {
    pub namespace: String,
    pub targets: Vec<ReconciliationTarget>,
    pub poll_interval: Duration,
    pub registry: RegistryConfig,
    pub metrics: MetricsConfig,
}

impl Default for KubertConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            targets: Vec::new(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            registry: RegistryConfig {
                base_url: DEFAULT_REGISTRY_URL.to_string(),
                page_size: DEFAULT_PAGE_SIZE,
                credentials: None,
                docker_config: None,
            },
            metrics: MetricsConfig {
                enabled: true,
                addr: DEFAULT_METRICS_ADDR.to_string(),
            },
        }
    }
}

impl KubertConfig {
    /// Load configuration from `KUBERT_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars = std::env::vars()
            .filter_map(|(k, v)| k.strip_prefix(ENV_PREFIX).map(|k| (k.to_string(), v)))
            .collect::<BTreeMap<String, String>>();

        Self::from_map(&vars)
    }

    /// Build configuration from variables with the `KUBERT_` prefix removed
    pub fn from_map(vars: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let namespace = parse_optional_string(vars, "NAMESPACE")
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let targets = parse_targets(
            parse_optional_string(vars, "TARGETS").as_deref().unwrap_or(""),
            &namespace,
        )?;
        if targets.is_empty() {
            warn!("No reconciliation targets configured, set KUBERT_TARGETS");
        }

        let interval = parse_number(vars, "POLL_INTERVAL", DEFAULT_POLL_INTERVAL_SECS)?;
        if interval == 0 {
            return Err(ConfigError::Zero("KUBERT_POLL_INTERVAL".to_string()));
        }

        let page_size = parse_number(vars, "REGISTRY_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::Zero("KUBERT_REGISTRY_PAGE_SIZE".to_string()));
        }

        let credentials = match (
            parse_optional_string(vars, "REGISTRY_USERNAME"),
            parse_optional_string(vars, "REGISTRY_TOKEN"),
        ) {
            (Some(username), Some(token)) => Some(RegistryCredentials::new(username, token)),
            (None, None) => None,
            _ => {
                warn!("Only one of KUBERT_REGISTRY_USERNAME/KUBERT_REGISTRY_TOKEN is set, ignoring both");
                None
            },
        };

        Ok(Self {
            namespace,
            targets,
            poll_interval: Duration::from_secs(interval),
            registry: RegistryConfig {
                base_url: parse_optional_string(vars, "REGISTRY_URL")
                    .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string()),
                page_size,
                credentials,
                docker_config: parse_optional_string(vars, "DOCKER_CONFIG").map(PathBuf::from),
            },
            metrics: MetricsConfig {
                enabled: parse_bool(vars, "METRICS_ENABLED", true)?,
                addr: parse_optional_string(vars, "METRICS_ADDR")
                    .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string()),
            },
        })
    }
}

/// Parse a comma separated list of `name` or `namespace/name` entries.
/// Duplicates are dropped, first occurrence wins.
pub fn parse_targets(
    value: &str,
    default_namespace: &str,
) -> Result<Vec<ReconciliationTarget>, ConfigError> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for entry in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let target = match entry.split_once('/') {
            Some((namespace, name)) => {
                if namespace.is_empty() || name.is_empty() || name.contains('/') {
                    return Err(ConfigError::InvalidTarget(entry.to_string()));
                }
                ReconciliationTarget::new(name, namespace)
            },
            None => ReconciliationTarget::new(entry, default_namespace),
        };

        if seen.insert(target.clone()) {
            targets.push(target);
        }
    }

    Ok(targets)
}

fn parse_optional_string(vars: &BTreeMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(
    vars: &BTreeMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match parse_optional_string(vars, key) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            key: format!("{}{}", ENV_PREFIX, key),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_bool(
    vars: &BTreeMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    parse_number(vars, key, default)
}
