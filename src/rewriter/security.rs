//! Scheduling and security hardening for Deployments.
//!
//! Applies the anti-affinity, host isolation and restricted security
//! context profile. Fields whose final form is Helm flow control
//! (`nodeSelector`, `tolerations`, `imagePullSecrets`, container `env`,
//! `replicas`) are left as sentinel values for [`crate::rewriter::control`].

use serde_yaml::{Mapping, Value};

use crate::error::{ChartifyError, Result};
use crate::rewriter::context::RewriteContext;
use crate::rewriter::control::REPLICA_COUNT_EXPR;
use crate::rewriter::store::{containers_of, ManifestDocument, ManifestKind};
use crate::rewriter::yaml::{child_mapping, empty_string, get_path_mut, set};

/// Canonical deployment spec fragment holding the anti-affinity rules.
const DEPLOYMENT_SPEC: &str = include_str!("../../assets/chart-templates/deploymentspec.yaml");

/// Pod label the anti-affinity rules select on.
pub const ANTI_AFFINITY_LABEL: &str = "ocm-antiaffinity-selector";

const RUNTIME_DEFAULT: &str = "RuntimeDefault";

/// Anti-affinity block selecting pods labelled with `name`.
pub fn anti_affinity(name: &str) -> Result<Value> {
    let mut spec: Value = serde_yaml::from_str(DEPLOYMENT_SPEC)?;
    let terms = get_path_mut(
        &mut spec,
        &[
            "affinity",
            "podAntiAffinity",
            "preferredDuringSchedulingIgnoredDuringExecution",
        ],
    )
    .and_then(Value::as_sequence_mut)
    .ok_or_else(|| {
        ChartifyError::UnsupportedConfiguration(
            "deployment spec template has no anti-affinity terms".to_string(),
        )
    })?;

    for term in terms.iter_mut() {
        if let Some(values) = get_path_mut(
            term,
            &["podAffinityTerm", "labelSelector", "matchExpressions"],
        )
        .and_then(|e| e.get_mut(0))
        .and_then(|e| e.get_mut("values"))
        {
            *values = Value::Sequence(vec![Value::from(name)]);
        }
    }

    spec.get_mut("affinity")
        .map(std::mem::take)
        .ok_or_else(|| {
            ChartifyError::UnsupportedConfiguration(
                "deployment spec template has no affinity".to_string(),
            )
        })
}

/// Harden one Deployment in place.
pub fn harden_deployment(doc: &mut ManifestDocument, ctx: &RewriteContext) -> Result<()> {
    if doc.kind != ManifestKind::Deployment {
        return Ok(());
    }
    let name = doc.require_name()?;
    let affinity = anti_affinity(&name)?;

    doc.metadata_mut()?.remove("namespace");

    let path = doc.path.clone();
    let spec = doc
        .root
        .get_mut("spec")
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| ChartifyError::malformed(&path, "spec is missing"))?;
    set(spec, "replicas", REPLICA_COUNT_EXPR);

    let labels = child_mapping(spec, "template")
        .and_then(|template| child_mapping(template, "metadata"))
        .and_then(|metadata| child_mapping(metadata, "labels"))
        .ok_or_else(|| ChartifyError::malformed(&path, "spec.template.metadata.labels is not a mapping"))?;
    set(labels, ANTI_AFFINITY_LABEL, name.as_str());

    let pod_spec = doc.pod_spec_mut()?;
    set(pod_spec, "affinity", affinity);
    set(pod_spec, "tolerations", empty_string());
    set(pod_spec, "hostNetwork", false);
    set(pod_spec, "hostPID", false);
    set(pod_spec, "hostIPC", false);
    set(pod_spec, "nodeSelector", empty_string());
    set(pod_spec, "imagePullSecrets", empty_string());

    let pod_security = child_mapping(pod_spec, "securityContext").ok_or_else(|| {
        ChartifyError::malformed(&path, "spec.template.spec.securityContext is not a mapping")
    })?;
    set(pod_security, "runAsNonRoot", true);
    let pod_profile_is_default = match seccomp_type(pod_security) {
        None => {
            // Gated on the platform version by the control pass.
            let mut profile = Mapping::new();
            set(&mut profile, "type", RUNTIME_DEFAULT);
            set(pod_security, "seccompProfile", profile);
            true
        }
        Some(kind) if kind == RUNTIME_DEFAULT => true,
        Some(_) => {
            log::warn!(
                "Leaving non-standard pod-level seccompprofile setting in {}",
                name
            );
            false
        }
    };

    let containers = containers_of(pod_spec)
        .ok_or_else(|| ChartifyError::malformed(&path, "spec.template.spec.containers is missing"))?;
    for container in containers.iter_mut().filter_map(Value::as_mapping_mut) {
        harden_container(container, ctx, pod_profile_is_default).ok_or_else(|| {
            ChartifyError::malformed(&path, "container securityContext is not a mapping")
        })?;
    }

    log::debug!("Hardened deployment {}", name);
    Ok(())
}

fn harden_container(
    container: &mut Mapping,
    ctx: &RewriteContext,
    pod_profile_is_default: bool,
) -> Option<()> {
    if !container.contains_key("env") {
        set(container, "env", Mapping::new());
    }
    let container_name = container
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string();

    let security = child_mapping(container, "securityContext")?;
    set(security, "allowPrivilegeEscalation", false);
    let mut capabilities = Mapping::new();
    set(&mut capabilities, "drop", vec![Value::from("ALL")]);
    set(security, "capabilities", capabilities);
    set(security, "privileged", false);
    set(security, "runAsNonRoot", true);
    if ctx.forces_read_only_root_fs() {
        set(security, "readOnlyRootFilesystem", true);
    }

    match seccomp_type(security) {
        Some(kind) if kind == RUNTIME_DEFAULT && pod_profile_is_default => {
            security.remove("seccompProfile");
        }
        Some(kind) if kind == RUNTIME_DEFAULT => {}
        Some(_) => log::warn!(
            "Leaving non-standard seccompprofile setting for container {}",
            container_name
        ),
        None => {}
    }
    Some(())
}

fn seccomp_type(security_context: &Mapping) -> Option<String> {
    let profile = security_context.get("seccompProfile")?;
    Some(
        profile
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    )
}
