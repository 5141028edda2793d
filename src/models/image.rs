use std::fmt;
use thiserror::Error;

/// Namespace the registry uses for unqualified "official" image names.
pub const OFFICIAL_NAMESPACE: &str = "library";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageReferenceError {
    #[error("Image reference '{0}' has an empty repository")]
    EmptyRepository(String),
}

/// An image reference split into `repository[:tag]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub repository: String,
    pub tag: Option<String>,
}

impl ImageReference {
    /// Split on the first `:`. Everything after it is the tag, so a registry
    /// port (`localhost:5000/app:1.2`) ends up in the tag and never parses as
    /// a version.
    pub fn parse(image: &str) -> Result<Self, ImageReferenceError> {
        let (repository, tag) = match image.split_once(':') {
            Some((repository, tag)) => (repository, Some(tag)),
            None => (image, None),
        };

        if repository.is_empty() {
            return Err(ImageReferenceError::EmptyRepository(image.to_string()));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.filter(|t| !t.is_empty()).map(String::from),
        })
    }

    /// Repository path to query the registry with. Unqualified names live
    /// under the official namespace.
    pub fn query_repository(&self) -> String {
        if self.repository.contains('/') {
            self.repository.clone()
        } else {
            format!("{}/{}", OFFICIAL_NAMESPACE, self.repository)
        }
    }

    /// Same repository, different tag.
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            repository: self.repository.clone(),
            tag: Some(tag.to_string()),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{}", self.repository, tag),
            None => f.write_str(&self.repository),
        }
    }
}
