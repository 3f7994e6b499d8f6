use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::{ChartifyError, Result};
use crate::rewriter::store::yaml_files_in;
use crate::rewriter::yaml::str_at;

const CRD_KIND: &str = "CustomResourceDefinition";

/// Copy the CustomResourceDefinitions of `source_chart/crds` into
/// `chart_dir/crds`. Other kinds found there are skipped.
pub fn copy_crds(source_chart: &Path, chart_dir: &Path) -> Result<Vec<PathBuf>> {
    if !source_chart.is_dir() {
        return Err(ChartifyError::MissingChartArtifact(source_chart.to_path_buf()));
    }
    let crd_dir = source_chart.join("crds");
    if !crd_dir.is_dir() {
        log::info!("No CRDs in {}", source_chart.display());
        return Ok(Vec::new());
    }

    let destination = chart_dir.join("crds");
    if destination.exists() {
        fs::remove_dir_all(&destination)?;
    }
    fs::create_dir_all(&destination)?;

    let mut copied = Vec::new();
    for file in yaml_files_in(&crd_dir)? {
        let content = fs::read_to_string(&file)?;
        let resource: Value = serde_yaml::from_str(&content)
            .map_err(|e| ChartifyError::malformed(&file, e.to_string()))?;
        if str_at(&resource, &["kind"]) != Some(CRD_KIND) {
            log::debug!("Skipping non-CRD file {}", file.display());
            continue;
        }
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = destination.join(name);
        fs::copy(&file, &target)?;
        copied.push(target);
    }

    log::info!("Copied {} CRDs to {}", copied.len(), destination.display());
    Ok(copied)
}
