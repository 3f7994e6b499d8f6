use std::path::{Path, PathBuf};

use colored::*;

use crate::config::types::{ChartConfig, RepoConfig};
use crate::config::{self, CHART_VALUES_DIR};
use crate::error::{ChartifyError, Result};
use crate::rewriter::{run_pipeline, PipelineOptions, PipelineReport, RewriteContext};
use crate::scaffold::{
    chart_version, copy_crds, scaffold_chart, ChartRenderer, GitCli, HelmCli, ScaffoldRequest,
    SourceFetcher,
};

/// Directory under the work dir where repositories are cloned.
pub const CLONE_DIR: &str = "tmp";

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub destination: PathBuf,
    pub work_dir: PathBuf,
    pub skip_overrides: bool,
    pub lint: bool,
}

/// Result of generating one chart.
#[derive(Debug, Clone)]
pub struct ChartOutcome {
    pub repo: String,
    pub chart: String,
    pub chart_dir: PathBuf,
    pub templates: usize,
    pub crds: usize,
    pub report: PipelineReport,
}

/// `<destination>/charts/<always-or-toggle>/<name>`
pub fn chart_output_dir(destination: &Path, chart: &ChartConfig) -> PathBuf {
    destination
        .join("charts")
        .join(&chart.always_or_toggle)
        .join(&chart.name)
}

/// Generate every chart of every repository.
///
/// All chart entries are validated before any repository is fetched.
pub fn generate_charts(
    repos: &[RepoConfig],
    options: &GenerateOptions,
    fetcher: &dyn SourceFetcher,
    renderer: &dyn ChartRenderer,
) -> Result<Vec<ChartOutcome>> {
    for repo in repos {
        for chart in &repo.charts {
            chart.validate().inspect_err(|e| {
                log::error!("Unable to generate helm chart for repo {}: {}", repo.repo_name, e)
            })?;
        }
    }

    let mut outcomes = Vec::new();
    for repo in repos {
        let clone_dir = options.work_dir.join(CLONE_DIR).join(&repo.repo_name);
        fetcher.fetch(repo, &clone_dir)?;

        for chart in &repo.charts {
            log::info!("Helm Chartifying - {}", chart.name);
            outcomes.push(generate_chart(repo, chart, &clone_dir, options, renderer)?);
        }
    }
    Ok(outcomes)
}

fn generate_chart(
    repo: &RepoConfig,
    chart: &ChartConfig,
    clone_dir: &Path,
    options: &GenerateOptions,
    renderer: &dyn ChartRenderer,
) -> Result<ChartOutcome> {
    let source_chart = clone_dir.join(chart.chart_path());
    if !source_chart.is_dir() {
        return Err(ChartifyError::MissingChartArtifact(source_chart));
    }
    let chart_dir = chart_output_dir(&options.destination, chart);
    let version = chart_version(
        chart.update_chart_version,
        repo.branch.as_deref(),
        &repo.repo_name,
    );
    let values_override = options
        .work_dir
        .join(CHART_VALUES_DIR)
        .join(&chart.name)
        .join("values.yaml");

    let templates = scaffold_chart(
        renderer,
        &ScaffoldRequest {
            source_chart: &source_chart,
            chart_dir: &chart_dir,
            values_override: Some(&values_override),
            chart_version: version.as_deref(),
        },
    )?;
    let crds = copy_crds(&source_chart, &chart_dir)?;

    let ctx = RewriteContext::from_config(chart);
    let report = run_pipeline(
        &chart_dir,
        &ctx,
        PipelineOptions {
            skip_overrides: options.skip_overrides,
            lint: options.lint,
        },
    )?;

    Ok(ChartOutcome {
        repo: repo.repo_name.clone(),
        chart: chart.name.clone(),
        chart_dir,
        templates: templates.len(),
        crds: crds.len(),
        report,
    })
}

pub fn handle_generate(
    config_path: Option<PathBuf>,
    destination: Option<PathBuf>,
    skip_overrides: bool,
    lint: bool,
    work_dir: Option<PathBuf>,
) -> Result<()> {
    let config_path = config_path.unwrap_or_else(config::default_config_path);
    let repos = config::load_config(&config_path)?;
    let work_dir = work_dir.unwrap_or_else(|| config::config_base_dir(&config_path));

    // Lint output is scaffolded into a scratch directory and dropped.
    let scratch = if lint { Some(tempfile::TempDir::new()?) } else { None };
    let destination = match (&scratch, destination) {
        (Some(dir), _) => dir.path().to_path_buf(),
        (None, Some(dest)) => dest,
        (None, None) => {
            return Err(ChartifyError::UnsupportedConfiguration(
                "destination directory is required when not linting".to_string(),
            ));
        }
    };

    if lint {
        println!("🔍 Linting {} repositories from {}", repos.len(), config_path.display());
    } else {
        println!(
            "📦 Generating charts from {} into {}",
            config_path.display(),
            destination.display()
        );
    }
    if skip_overrides {
        println!("⏭️  Overrides skipped (--skip-overrides)");
    }

    let options = GenerateOptions {
        destination,
        work_dir,
        skip_overrides,
        lint,
    };
    let outcomes = generate_charts(&repos, &options, &GitCli, &HelmCli::default())?;

    for outcome in &outcomes {
        println!(
            "✅ {} {} ({} templates, {} CRDs, {} image keys, {} control blocks)",
            outcome.chart.bright_green().bold(),
            format!("[{}]", outcome.repo).dimmed(),
            outcome.templates,
            outcome.crds,
            outcome.report.image_keys.len(),
            outcome.report.control_blocks
        );
        if !lint {
            println!("   └── {}", outcome.chart_dir.display());
        }
    }

    if lint {
        println!("\n🎉 Lint passed for {} charts", outcomes.len());
    } else {
        println!("\n🎉 Generated {} charts", outcomes.len());
    }
    Ok(())
}
