use serde::{Deserialize, Serialize};

use crate::error::{ChartifyError, Result};
use crate::rewriter::image_keys::ImageKeyMapping;

/// One source repository and the charts generated from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub repo_name: String,
    pub github_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

/// Settings for one generated chart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default)]
    pub name: String,
    /// Chart directory, relative to the cloned repository
    #[serde(rename = "chart-path", default)]
    pub chart_path: Option<String>,
    /// Output group: `always` or `toggle`
    #[serde(rename = "always-or-toggle", default = "default_group")]
    pub always_or_toggle: String,
    #[serde(rename = "skipRBACOverrides", default)]
    pub skip_rbac_overrides: bool,
    #[serde(rename = "auto-install-for-all-clusters", default)]
    pub auto_install_for_all_clusters: bool,
    #[serde(rename = "updateChartVersion", default)]
    pub update_chart_version: bool,
    #[serde(rename = "imageMappings", default)]
    pub image_mappings: ImageKeyMapping,
    #[serde(rename = "escape-template-variables", default)]
    pub escape_template_variables: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub inclusions: Vec<String>,
}

fn default_group() -> String {
    "toggle".to_string()
}

impl ChartConfig {
    /// Reject entries that cannot be processed at all.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ChartifyError::UnsupportedConfiguration(
                "chart entry has no name".to_string(),
            ));
        }
        if self.chart_path.as_deref().is_none_or(|p| p.trim().is_empty()) {
            return Err(ChartifyError::UnsupportedConfiguration(format!(
                "chart '{}' has no chart-path",
                self.name
            )));
        }
        Ok(())
    }

    pub fn chart_path(&self) -> &str {
        self.chart_path.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_config_keys() {
        let yaml = r#"
name: cluster-proxy-addon
chart-path: charts/cluster-proxy
always-or-toggle: always
skipRBACOverrides: true
auto-install-for-all-clusters: true
updateChartVersion: true
imageMappings:
  cluster-proxy: cluster_proxy
escape-template-variables:
  - CLUSTER_NAME
exclusions:
  - readOnlyRootFilesystem
"#;
        let chart: ChartConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(chart.name, "cluster-proxy-addon");
        assert_eq!(chart.chart_path(), "charts/cluster-proxy");
        assert_eq!(chart.always_or_toggle, "always");
        assert!(chart.skip_rbac_overrides);
        assert!(chart.auto_install_for_all_clusters);
        assert!(chart.update_chart_version);
        assert_eq!(chart.image_mappings.resolve("cluster-proxy").unwrap(), "cluster_proxy");
        assert_eq!(chart.escape_template_variables, vec!["CLUSTER_NAME"]);
        assert!(chart.inclusions.is_empty());
        assert!(chart.validate().is_ok());
    }

    #[test]
    fn test_defaults_and_validation() {
        let chart: ChartConfig = serde_yaml::from_str("name: x\n").unwrap();
        assert_eq!(chart.always_or_toggle, "toggle");
        assert!(!chart.skip_rbac_overrides);
        assert!(chart.image_mappings.is_empty());
        assert!(matches!(
            chart.validate(),
            Err(ChartifyError::UnsupportedConfiguration(_))
        ));

        let unnamed: ChartConfig = serde_yaml::from_str("chart-path: charts/x\n").unwrap();
        let err = unnamed.validate().unwrap_err();
        assert!(err.to_string().contains("no name"));
    }
}
