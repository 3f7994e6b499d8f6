use std::path::Path;

use crate::common::command_utils::{is_command_available, run_checked};
use crate::error::{ChartifyError, Result};

/// Expands a chart directory into a stream of YAML documents.
pub trait ChartRenderer {
    fn render(&self, chart_path: &Path) -> Result<String>;
}

/// Renders with `helm template`.
#[derive(Debug, Clone)]
pub struct HelmCli {
    pub binary: String,
}

impl Default for HelmCli {
    fn default() -> Self {
        Self {
            binary: "helm".to_string(),
        }
    }
}

impl ChartRenderer for HelmCli {
    fn render(&self, chart_path: &Path) -> Result<String> {
        if !is_command_available(&self.binary) {
            return Err(ChartifyError::UnsupportedConfiguration(format!(
                "'{}' is not installed or not in PATH",
                self.binary
            )));
        }
        let path = chart_path.to_string_lossy();
        log::info!("Rendering chart {}", path);
        run_checked(&self.binary, &["template", path.as_ref()], None)
    }
}
