//! Chart directory preparation ahead of rewriting.
//!
//! Sources are fetched, the upstream chart is rendered, and every rendered
//! document lands in `templates/` of a fresh chart directory together with
//! `Chart.yaml` and the values template.

pub mod crds;
pub mod renderer;
pub mod source;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

use crate::error::{ChartifyError, Result};
use crate::rewriter::yaml::str_at;

pub use crds::copy_crds;
pub use renderer::{ChartRenderer, HelmCli};
pub use source::{GitCli, SourceFetcher};

/// values.yaml written into every generated chart
pub const VALUES_TEMPLATE: &str = include_str!("../../assets/chart-templates/values.yaml");

const BRANCH_PREFIX: &str = "backplane-";

static CHART_VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)*$").unwrap());

/// Chart version derived from a release branch such as `backplane-2.9`.
pub fn chart_version(update_chart_version: bool, branch: Option<&str>, repo_name: &str) -> Option<String> {
    if !update_chart_version {
        return None;
    }
    log::info!("Calculating chart version ...");
    let Some(branch) = branch else {
        log::warn!("No branch specified for repo {}, skip.", repo_name);
        return None;
    };
    let version = branch.replace(BRANCH_PREFIX, "");
    if !CHART_VERSION_REGEX.is_match(&version) {
        log::warn!(
            "Unable to use branch name {} as chart version for repo {}, skip.",
            branch,
            repo_name
        );
        return None;
    }
    log::info!("Chart version: {}", version);
    Some(version)
}

/// One non-empty document of a rendered stream.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub kind: String,
    pub name: Option<String>,
    pub content: String,
}

/// Split a multi-document stream, dropping documents with no content.
pub fn split_rendered(output: &str) -> Result<Vec<RenderedDocument>> {
    let mut chunks: Vec<String> = vec![String::new()];
    for line in output.lines() {
        if line.trim_end() == "---" || line.starts_with("--- ") {
            chunks.push(String::new());
            continue;
        }
        if let Some(current) = chunks.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }

    let mut documents = Vec::new();
    for chunk in chunks {
        let blank = chunk.lines().all(|l| {
            let l = l.trim();
            l.is_empty() || l.starts_with('#')
        });
        if blank {
            continue;
        }
        let value: Value = serde_yaml::from_str(&chunk)
            .map_err(|e| ChartifyError::malformed("<rendered chart>", e.to_string()))?;
        if value.is_null() {
            continue;
        }
        let kind = str_at(&value, &["kind"])
            .ok_or_else(|| ChartifyError::malformed("<rendered chart>", "document has no kind"))?
            .to_string();
        let name = str_at(&value, &["metadata", "name"]).map(str::to_string);
        documents.push(RenderedDocument {
            kind,
            name,
            content: chunk,
        });
    }
    Ok(documents)
}

/// File name for a rendered document; later documents of an already
/// written kind are told apart by their name.
fn template_file_name(doc: &RenderedDocument, used: &mut HashSet<String>) -> String {
    let kind = doc.kind.to_lowercase();
    let mut file_name = format!("{}.yaml", kind);
    if used.contains(&file_name) {
        let suffix = doc.name.clone().unwrap_or_else(|| used.len().to_string());
        file_name = format!("{}-{}.yaml", kind, suffix);
        let mut n = 2;
        while used.contains(&file_name) {
            file_name = format!("{}-{}-{}.yaml", kind, suffix, n);
            n += 1;
        }
    }
    used.insert(file_name.clone());
    file_name
}

/// Inputs for scaffolding one chart directory.
#[derive(Debug, Clone)]
pub struct ScaffoldRequest<'a> {
    /// Upstream chart inside the fetched sources
    pub source_chart: &'a Path,
    /// Generated chart directory, recreated from scratch
    pub chart_dir: &'a Path,
    /// Replacement for the upstream values.yaml
    pub values_override: Option<&'a Path>,
    pub chart_version: Option<&'a str>,
}

/// Render the upstream chart and lay out a fresh chart directory.
///
/// Returns the written template files.
pub fn scaffold_chart(renderer: &dyn ChartRenderer, request: &ScaffoldRequest<'_>) -> Result<Vec<PathBuf>> {
    let chart_yaml_path = request.source_chart.join("Chart.yaml");
    if !chart_yaml_path.is_file() {
        return Err(ChartifyError::MissingChartArtifact(chart_yaml_path));
    }

    let templates = request.chart_dir.join("templates");
    if request.chart_dir.exists() {
        fs::remove_dir_all(request.chart_dir)?;
    }
    fs::create_dir_all(&templates)?;

    if let Some(version) = request.chart_version {
        let mut chart_yaml: Value = serde_yaml::from_str(&fs::read_to_string(&chart_yaml_path)?)
            .map_err(|e| ChartifyError::malformed(&chart_yaml_path, e.to_string()))?;
        let Some(map) = chart_yaml.as_mapping_mut() else {
            return Err(ChartifyError::malformed(&chart_yaml_path, "not a mapping"));
        };
        map.insert(Value::from("version"), Value::from(version));
        fs::write(&chart_yaml_path, serde_yaml::to_string(&chart_yaml)?)?;
    }

    if let Some(values) = request.values_override.filter(|p| p.is_file()) {
        log::info!("Using chart-specific values from {}", values.display());
        fs::copy(values, request.source_chart.join("values.yaml"))?;
    }

    let rendered = renderer.render(request.source_chart)?;
    let mut used = HashSet::new();
    let mut written = Vec::new();
    for doc in split_rendered(&rendered)? {
        let path = templates.join(template_file_name(&doc, &mut used));
        fs::write(&path, &doc.content)?;
        written.push(path);
    }

    fs::copy(&chart_yaml_path, request.chart_dir.join("Chart.yaml"))?;
    fs::write(request.chart_dir.join("values.yaml"), VALUES_TEMPLATE)?;

    log::info!(
        "Scaffolded {} templates into {}",
        written.len(),
        request.chart_dir.display()
    );
    Ok(written)
}
