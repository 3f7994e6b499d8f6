//! Repository name to override key resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::UnmappedImageError;
use crate::rewriter::image_ref::ImageRef;

/// Mapping from a bare repository name to a values override key.
///
/// Resolution fails closed: an image missing from the mapping is an error,
/// never a pass-through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageKeyMapping(BTreeMap<String, String>);

impl ImageKeyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, repository: impl Into<String>, key: impl Into<String>) {
        self.0.insert(repository.into(), key.into());
    }

    /// Override key for a bare repository name.
    pub fn resolve(&self, repository: &str) -> Result<&str, UnmappedImageError> {
        self.0
            .get(repository)
            .map(String::as_str)
            .ok_or_else(|| UnmappedImageError {
                repository: repository.to_string(),
                image: repository.to_string(),
            })
    }

    /// Override key for a full image reference.
    pub fn resolve_image(&self, image: &str) -> Result<&str, UnmappedImageError> {
        let repository = ImageRef::parse(image).repository;
        self.0
            .get(&repository)
            .map(String::as_str)
            .ok_or_else(|| UnmappedImageError {
                repository,
                image: image.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ImageKeyMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
