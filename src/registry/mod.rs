pub mod auth;

pub use self::auth::RegistryCredentials;

use crate::metrics::{REGISTRY_ERRORS, REGISTRY_QUERIES};
use crate::models::VersionTag;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.hub.docker.com/v2/repositories";
pub const DEFAULT_PAGE_SIZE: u32 = 100;

const NAME_KEY: &str = "\"name\":\"";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry rejected credentials (status {0})")]
    AuthenticationFailure(u16),

    #[error("Registry request failed: {0}")]
    NetworkFailure(String),

    #[error("Registry returned status {status}")]
    RegistryUnavailable { status: u16 },

    #[error("Unexpected registry failure: {0}")]
    UnexpectedFailure(String),
}

impl RegistryError {
    fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                RegistryError::AuthenticationFailure(status.as_u16())
            },
            _ => RegistryError::RegistryUnavailable {
                status: status.as_u16(),
            },
        }
    }
}

/// Source of raw tag names for a repository.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Tag names in the order the registry reported them.
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError>;
}

/// Tag listing client for the Docker Hub repositories API
pub struct DockerHubClient {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
    credentials: Option<RegistryCredentials>,
}

impl DockerHubClient {
    pub fn new(
        base_url: impl Into<String>,
        page_size: u32,
        credentials: Option<RegistryCredentials>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kubert/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size,
            credentials,
        })
    }

    fn tags_url(&self, repository: &str) -> String {
        format!(
            "{}/{}/tags?page_size={}",
            self.base_url, repository, self.page_size
        )
    }
}

#[async_trait]
impl RegistryClient for DockerHubClient {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        let url = self.tags_url(repository);
        debug!("Listing tags from {}", url);

        let mut request = self.client.get(&url);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::from_status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::UnexpectedFailure(e.to_string()))?;

        Ok(extract_tag_names(&body))
    }
}

/// Page of the tag listing. Only the tag names are of interest.
#[derive(Debug, Deserialize)]
struct TagPage {
    #[serde(default)]
    results: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Pull tag names out of a tag listing body, in document order.
///
/// Well-formed bodies are decoded through the `results` array. Anything that
/// does not decode (truncated pages, schema drift) falls back to collecting
/// every `"name":"..."` pair in the raw text.
pub fn extract_tag_names(body: &str) -> Vec<String> {
    match serde_json::from_str::<TagPage>(body) {
        Ok(page) => page.results.into_iter().map(|entry| entry.name).collect(),
        Err(e) => {
            warn!("Tag listing is not valid JSON ({}), scanning for tag names", e);
            scan_tag_names(body)
        },
    }
}

fn scan_tag_names(body: &str) -> Vec<String> {
    body.split(NAME_KEY)
        .skip(1)
        .filter_map(|rest| rest.split_once('"').map(|(name, _)| name.to_string()))
        .collect()
}

/// Finds the best upgrade tag for a repository.
#[derive(Clone)]
pub struct TagResolver {
    client: Arc<dyn RegistryClient>,
}

impl TagResolver {
    pub fn new(client: Arc<dyn RegistryClient>) -> Self {
        Self { client }
    }

    pub async fn fetch_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        REGISTRY_QUERIES.inc();

        let tags = self.client.list_tags(repository).await.inspect_err(|_| {
            REGISTRY_ERRORS.inc();
        })?;

        debug!("Registry returned {} tags for {}", tags.len(), repository);
        Ok(tags)
    }

    /// Keep the tags that are version tags. Equal versions collapse to the
    /// first one seen.
    pub fn filter_version_tags<S: AsRef<str>>(raw_tags: &[S]) -> BTreeSet<VersionTag> {
        let mut versions = BTreeSet::new();

        for raw in raw_tags {
            match VersionTag::parse(raw.as_ref()) {
                Some(version) => {
                    versions.insert(version);
                },
                None => debug!("Skipping non-version tag: {}", raw.as_ref()),
            }
        }

        versions
    }

    /// Highest candidate strictly greater than `current`.
    pub fn select_upgrade(
        current: &VersionTag,
        candidates: &BTreeSet<VersionTag>,
    ) -> Option<VersionTag> {
        candidates.last().filter(|best| *best > current).cloned()
    }
}
