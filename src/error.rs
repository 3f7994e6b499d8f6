//! Error types for chart generation
//!
//! Every variant is fatal for the run: a packaging defect is fixed by
//! correcting the input configuration, never by retrying.

use std::path::PathBuf;
use thiserror::Error;

/// An image repository with no entry in the chart's `imageMappings`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no image key mapping provided for repository '{repository}' (image '{image}')")]
pub struct UnmappedImageError {
    /// Bare repository name that failed to resolve
    pub repository: String,
    /// Full image reference it was parsed from
    pub image: String,
}

/// Errors that can occur while generating a chart
#[derive(Debug, Error)]
pub enum ChartifyError {
    /// One or more images in a chart could not be mapped to an override key
    #[error("chart '{chart}' has unmapped images: {}", format_unmapped(.images))]
    UnmappedImages {
        chart: String,
        images: Vec<UnmappedImageError>,
    },

    /// An expected chart file or directory is absent
    #[error("missing chart artifact: {}", .0.display())]
    MissingChartArtifact(PathBuf),

    /// A manifest could not be parsed or lacks a field the rewrite needs
    #[error("malformed manifest {}: {message}", .path.display())]
    MalformedManifest { path: PathBuf, message: String },

    /// The chart configuration cannot be processed
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// An external command (helm, git) exited unsuccessfully
    #[error("command '{command}' failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ChartifyError {
    /// Shorthand for a [`ChartifyError::MalformedManifest`].
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ChartifyError::MalformedManifest {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn format_unmapped(images: &[UnmappedImageError]) -> String {
    images
        .iter()
        .map(|e| e.repository.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for chart generation
pub type Result<T> = std::result::Result<T, ChartifyError>;
