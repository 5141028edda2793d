use crate::models::{ImageReference, ImageReferenceError, VersionTag};
use crate::registry::{RegistryError, TagResolver};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidImage(#[from] ImageReferenceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Turns an image reference into the newest compatible one.
#[derive(Clone)]
pub struct ImageResolver {
    tags: TagResolver,
}

impl ImageResolver {
    pub fn new(tags: TagResolver) -> Self {
        Self { tags }
    }

    /// Newest compatible image for `current_image`, or `current_image` itself.
    ///
    /// Never fails: registry problems and unusable references are logged and
    /// leave the image as it is.
    pub async fn resolve_latest_image(&self, current_image: &str) -> String {
        match self.try_resolve(current_image).await {
            Ok(Some(image)) => image,
            Ok(None) => current_image.to_string(),
            Err(e) => {
                warn!(
                    "Failed to resolve latest image for {}, keeping it: {}",
                    current_image, e
                );
                current_image.to_string()
            },
        }
    }

    async fn try_resolve(&self, current_image: &str) -> Result<Option<String>, ResolveError> {
        let reference = ImageReference::parse(current_image)?;

        let Some(current_tag) = reference.tag.as_deref() else {
            debug!("Image {} has no tag, nothing to compare against", current_image);
            return Ok(None);
        };

        let Some(current_version) = VersionTag::parse(current_tag) else {
            debug!(
                "Tag {} of {} is not a version tag, skipping",
                current_tag, current_image
            );
            return Ok(None);
        };

        let repository = reference.query_repository();
        let raw_tags = self.tags.fetch_tags(&repository).await?;
        let candidates = TagResolver::filter_version_tags(raw_tags.as_slice());

        match TagResolver::select_upgrade(&current_version, &candidates) {
            Some(newer) => {
                let upgraded = reference.with_tag(newer.raw()).to_string();
                debug!(
                    "Newer tag found for {}: {} -> {}",
                    repository, current_tag, newer
                );
                Ok(Some(upgraded))
            },
            None => {
                debug!(
                    "No tag newer than {} among {} version tags of {}",
                    current_tag,
                    candidates.len(),
                    repository
                );
                Ok(None)
            },
        }
    }
}
