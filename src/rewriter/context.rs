//! Per-chart rewrite settings.

use crate::config::types::ChartConfig;
use crate::rewriter::image_keys::ImageKeyMapping;

/// Exclusion that stops `readOnlyRootFilesystem` from being forced.
pub const EXCLUDE_READ_ONLY_ROOT_FS: &str = "readOnlyRootFilesystem";
/// Inclusion that adds the pull-secret environment variable to containers.
pub const INCLUDE_PULL_SECRET_OVERRIDE: &str = "pullSecretOverride";

const KNOWN_EXCLUSIONS: &[&str] = &[EXCLUDE_READ_ONLY_ROOT_FS];
const KNOWN_INCLUSIONS: &[&str] = &[INCLUDE_PULL_SECRET_OVERRIDE];

/// Settings for one chart, built once and read-only during a run.
#[derive(Debug, Clone, Default)]
pub struct RewriteContext {
    pub chart_name: String,
    pub image_mappings: ImageKeyMapping,
    pub skip_rbac_overrides: bool,
    pub auto_install_for_all_clusters: bool,
    pub escape_template_variables: Vec<String>,
    pub exclusions: Vec<String>,
    pub inclusions: Vec<String>,
}

impl RewriteContext {
    /// Context with default settings for `chart_name`.
    pub fn for_chart(chart_name: impl Into<String>) -> Self {
        Self {
            chart_name: chart_name.into(),
            ..Default::default()
        }
    }

    pub fn from_config(chart: &ChartConfig) -> Self {
        for option in &chart.exclusions {
            if !KNOWN_EXCLUSIONS.contains(&option.as_str()) {
                log::warn!("Chart '{}': ignoring unknown exclusion '{}'", chart.name, option);
            }
        }
        for option in &chart.inclusions {
            if !KNOWN_INCLUSIONS.contains(&option.as_str()) {
                log::warn!("Chart '{}': ignoring unknown inclusion '{}'", chart.name, option);
            }
        }

        Self {
            chart_name: chart.name.clone(),
            image_mappings: chart.image_mappings.clone(),
            skip_rbac_overrides: chart.skip_rbac_overrides,
            auto_install_for_all_clusters: chart.auto_install_for_all_clusters,
            escape_template_variables: chart.escape_template_variables.clone(),
            exclusions: chart.exclusions.clone(),
            inclusions: chart.inclusions.clone(),
        }
    }

    pub fn forces_read_only_root_fs(&self) -> bool {
        !self.exclusions.iter().any(|e| e == EXCLUDE_READ_ONLY_ROOT_FS)
    }

    pub fn adds_pull_secret_env(&self) -> bool {
        self.inclusions.iter().any(|i| i == INCLUDE_PULL_SECRET_OVERRIDE)
    }
}
