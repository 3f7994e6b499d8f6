pub mod types;

use crate::error::{ChartifyError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "charts-config.yaml";

/// Directory holding per-chart `values.yaml` replacements.
pub const CHART_VALUES_DIR: &str = "chart-values";

/// Default config file path in the current directory
pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Directory that relative work paths are resolved against
pub fn config_base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load the repository list from `path`
pub fn load_config(path: &Path) -> Result<Vec<types::RepoConfig>> {
    if !path.is_file() {
        return Err(ChartifyError::MissingChartArtifact(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        log::warn!("{} lists no repositories", path.display());
        return Ok(Vec::new());
    }
    let repos: Vec<types::RepoConfig> = serde_yaml::from_str(&content)?;
    log::debug!(
        "Loaded {} repositories with {} charts from {}",
        repos.len(),
        repos.iter().map(|r| r.charts.len()).sum::<usize>(),
        path.display()
    );
    Ok(repos)
}
