//! Stage ordering for one chart.

use std::path::Path;

use crate::error::Result;
use crate::rewriter::context::RewriteContext;
use crate::rewriter::control::inject_controls;
use crate::rewriter::escape::escape_template_variables;
use crate::rewriter::images::rewrite_images;
use crate::rewriter::rbac::normalize_rbac;
use crate::rewriter::resources::normalize_resources;
use crate::rewriter::security::harden_deployment;
use crate::rewriter::store::{ChartBundle, ManifestKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Skip images, RBAC, hardening and control injection.
    pub skip_overrides: bool,
    /// Run every stage but never persist the bundle.
    pub lint: bool,
}

/// What a pipeline run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub manifests: usize,
    pub resources_updated: usize,
    pub variables_escaped: usize,
    pub image_keys: Vec<String>,
    pub rbac_renamed: usize,
    pub deployments_hardened: usize,
    pub control_blocks: usize,
    pub saved: bool,
}

/// Run every stage over an in-memory bundle.
///
/// The resource stage always runs. The override stages run in a fixed
/// order: images, RBAC, hardening, then control blocks, so that hardening
/// sees rewritten images and control injection sees the hardening sentinels.
pub fn rewrite_bundle(
    bundle: &mut ChartBundle,
    ctx: &RewriteContext,
    skip_overrides: bool,
) -> Result<PipelineReport> {
    let mut report = PipelineReport {
        manifests: bundle.manifests.len(),
        ..Default::default()
    };

    report.resources_updated = normalize_resources(bundle, ctx)?;
    report.variables_escaped = escape_template_variables(bundle, &ctx.escape_template_variables);

    if skip_overrides {
        log::info!("Skipping overrides for chart {}", ctx.chart_name);
        return Ok(report);
    }

    report.image_keys = rewrite_images(bundle, ctx)?;

    if ctx.skip_rbac_overrides {
        log::info!("Skipping RBAC overrides for chart {}", ctx.chart_name);
    } else {
        report.rbac_renamed = normalize_rbac(bundle, &ctx.chart_name)?;
    }

    log::info!("Adding security and scheduling defaults to deployments");
    for doc in bundle.manifests_of_kind_mut(&ManifestKind::Deployment) {
        harden_deployment(doc, ctx)?;
        report.deployments_hardened += 1;
    }

    log::info!("Injecting Helm flow control");
    for doc in bundle.manifests.iter_mut() {
        report.control_blocks += inject_controls(doc, ctx)?;
    }

    Ok(report)
}

/// Load the chart at `chart_dir`, rewrite it and save it once.
pub fn run_pipeline(
    chart_dir: &Path,
    ctx: &RewriteContext,
    options: PipelineOptions,
) -> Result<PipelineReport> {
    log::info!("Rewriting chart {} at {}", ctx.chart_name, chart_dir.display());
    let mut bundle = ChartBundle::load(chart_dir)?;
    let mut report = rewrite_bundle(&mut bundle, ctx, options.skip_overrides)?;

    if options.lint {
        log::info!("Lint mode, leaving {} untouched", chart_dir.display());
    } else {
        bundle.save()?;
        report.saved = true;
    }
    Ok(report)
}
