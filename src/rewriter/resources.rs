//! Kind-specific namespace and install adjustments.
//!
//! Runs for every chart, whether or not overrides are applied.

use serde_yaml::{Mapping, Value};

use crate::error::{ChartifyError, Result};
use crate::rewriter::context::RewriteContext;
use crate::rewriter::store::{ChartBundle, ManifestDocument, ManifestKind};
use crate::rewriter::yaml::set;

/// Namespace expression used wherever a namespace is templated.
pub const NAMESPACE_EXPR: &str = "{{ .Values.global.namespace }}";

/// Placement-based install strategy covering every managed cluster.
pub fn global_install_strategy() -> Value {
    let mut rollout = Mapping::new();
    set(&mut rollout, "type", "All");

    let mut placement = Mapping::new();
    set(&mut placement, "name", "global");
    set(&mut placement, "namespace", "open-cluster-management-global-set");
    set(&mut placement, "rolloutStrategy", rollout);

    let mut strategy = Mapping::new();
    set(&mut strategy, "placements", vec![Value::Mapping(placement)]);
    set(&mut strategy, "type", "Placements");
    Value::Mapping(strategy)
}

/// Apply the per-kind adjustments to every manifest of the bundle.
pub fn normalize_resources(bundle: &mut ChartBundle, ctx: &RewriteContext) -> Result<usize> {
    log::info!("Updating resources for chart {}", ctx.chart_name);
    let mut updated = 0;
    for doc in bundle.manifests.iter_mut() {
        if normalize_document(doc, ctx)? {
            updated += 1;
        } else {
            log::debug!("No updates for kind {} at this step", doc.kind);
        }
    }
    Ok(updated)
}

fn normalize_document(doc: &mut ManifestDocument, ctx: &RewriteContext) -> Result<bool> {
    match doc.kind {
        ManifestKind::AddOnDeploymentConfig => {
            log::info!("Updating AddOnDeploymentConfig");
            set(doc.metadata_mut()?, "namespace", NAMESPACE_EXPR);
        }
        ManifestKind::ClusterManagementAddOn => {
            log::info!("Updating ClusterManagementAddOn");
            let Some(spec) = doc.root.get_mut("spec").and_then(Value::as_mapping_mut) else {
                return Ok(false);
            };
            template_default_config_namespaces(spec);
            if ctx.auto_install_for_all_clusters && !spec.contains_key("installStrategy") {
                set(spec, "installStrategy", global_install_strategy());
            }
        }
        ManifestKind::ServiceAccount => {
            log::info!("Updating ServiceAccount");
            doc.metadata_mut()?.remove("namespace");
        }
        ManifestKind::ClusterRoleBinding if !ctx.skip_rbac_overrides => {
            log::info!("Updating ClusterRoleBinding");
            let subjects = doc
                .root
                .get_mut("subjects")
                .and_then(Value::as_sequence_mut)
                .ok_or_else(|| ChartifyError::malformed(&doc.path, "subjects is missing"))?;
            for subject in subjects.iter_mut().filter_map(Value::as_mapping_mut) {
                set(subject, "namespace", NAMESPACE_EXPR);
            }
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn template_default_config_namespaces(spec: &mut Mapping) {
    let Some(configs) = spec
        .get_mut("supportedConfigs")
        .and_then(Value::as_sequence_mut)
    else {
        return;
    };
    for config in configs.iter_mut().filter_map(Value::as_mapping_mut) {
        let Some(default_config) = config
            .get_mut("defaultConfig")
            .and_then(Value::as_mapping_mut)
        else {
            continue;
        };
        if default_config.contains_key("namespace") {
            set(default_config, "namespace", NAMESPACE_EXPR);
        }
    }
}
