//! Image override rewriting.
//!
//! Three paths turn literal image references into
//! `{{ .Values.global.imageOverrides.<key> }}`:
//!
//! - the `image` of every Deployment container, together with its pull
//!   policy and any `--agent-image-name` argument
//! - every container env var whose name ends in `_IMAGE`
//! - the `image` of Deployments nested in an AddOnTemplate workload
//!
//! Every reference of a chart is resolved before the stage reports
//! success, and all unmapped repositories are reported together.

use serde_yaml::{Mapping, Value};

use crate::error::{ChartifyError, Result, UnmappedImageError};
use crate::rewriter::context::RewriteContext;
use crate::rewriter::image_keys::ImageKeyMapping;
use crate::rewriter::store::{containers_of, pod_spec_of, ChartBundle, ManifestDocument, ManifestKind};
use crate::rewriter::values::register_image_keys;
use crate::rewriter::yaml::{get_path_mut, set};

/// Command-line flag carrying the agent image.
pub const AGENT_IMAGE_FLAG: &str = "--agent-image-name";
/// Env var name suffix marking an image reference.
pub const IMAGE_ENV_SUFFIX: &str = "_IMAGE";
/// Pull policy expression.
pub const PULL_POLICY_EXPR: &str = "{{ .Values.global.pullPolicy }}";

/// Override expression for a key.
pub fn override_expr(key: &str) -> String {
    format!("{{{{ .Values.global.imageOverrides.{} }}}}", key)
}

/// Keys used and references that failed to resolve.
#[derive(Debug, Default)]
struct Resolution {
    keys: Vec<String>,
    unmapped: Vec<UnmappedImageError>,
}

impl Resolution {
    /// Resolve `image` and return its override expression.
    fn resolve(&mut self, mapping: &ImageKeyMapping, image: &str) -> Option<String> {
        match mapping.resolve_image(image) {
            Ok(key) => {
                if !self.keys.iter().any(|k| k == key) {
                    self.keys.push(key.to_string());
                }
                Some(override_expr(key))
            }
            Err(e) => {
                log::error!("No image key mapping provided for imageKey: {}", e.repository);
                if !self.unmapped.contains(&e) {
                    self.unmapped.push(e);
                }
                None
            }
        }
    }
}

/// Rewrite every image reference in the bundle and record the keys in
/// values.yaml. Returns the override keys in first-use order.
pub fn rewrite_images(bundle: &mut ChartBundle, ctx: &RewriteContext) -> Result<Vec<String>> {
    log::info!("Fixing image references in deployments, container env and addon templates");
    let mapping = &ctx.image_mappings;
    let mut resolution = Resolution::default();

    for doc in bundle.manifests.iter_mut() {
        match doc.kind {
            ManifestKind::Deployment => {
                rewrite_deployment_images(doc, mapping, &mut resolution)?;
                rewrite_env_images(doc, mapping, &mut resolution)?;
            }
            ManifestKind::AddOnTemplate => {
                rewrite_addon_template_images(doc, mapping, &mut resolution);
            }
            _ => {}
        }
    }

    if !resolution.unmapped.is_empty() {
        return Err(ChartifyError::UnmappedImages {
            chart: ctx.chart_name.clone(),
            images: resolution.unmapped,
        });
    }

    let values_path = bundle.values_path();
    register_image_keys(&mut bundle.values, &values_path, &resolution.keys)?;
    log::info!(
        "Image references updated, {} override keys registered",
        resolution.keys.len()
    );
    Ok(resolution.keys)
}

fn deployment_containers<'a>(doc: &'a mut ManifestDocument) -> Result<&'a mut Vec<Value>> {
    let path = doc.path.clone();
    containers_of(doc.pod_spec_mut()?).ok_or_else(|| {
        ChartifyError::malformed(path, "spec.template.spec.containers is missing")
    })
}

/// Container `image`, `imagePullPolicy` and agent image argument.
fn rewrite_deployment_images(
    doc: &mut ManifestDocument,
    mapping: &ImageKeyMapping,
    resolution: &mut Resolution,
) -> Result<()> {
    for container in deployment_containers(doc)?
        .iter_mut()
        .filter_map(Value::as_mapping_mut)
    {
        let Some(image) = container.get("image").and_then(Value::as_str).map(str::to_string)
        else {
            continue;
        };
        let Some(expr) = resolution.resolve(mapping, &image) else {
            continue;
        };

        set(container, "image", expr.as_str());
        set(container, "imagePullPolicy", PULL_POLICY_EXPR);
        rewrite_agent_image_args(container, &expr);
    }
    Ok(())
}

fn rewrite_agent_image_args(container: &mut Mapping, expr: &str) {
    let Some(args) = container.get_mut("args").and_then(Value::as_sequence_mut) else {
        return;
    };
    for arg in args.iter_mut() {
        if arg.as_str().is_some_and(|a| a.contains(AGENT_IMAGE_FLAG)) {
            *arg = Value::from(format!("{}={}", AGENT_IMAGE_FLAG, expr));
        }
    }
}

/// Env vars whose name ends in `_IMAGE`; the container image is untouched.
fn rewrite_env_images(
    doc: &mut ManifestDocument,
    mapping: &ImageKeyMapping,
    resolution: &mut Resolution,
) -> Result<()> {
    for container in deployment_containers(doc)?.iter_mut() {
        let Some(env) = container.get_mut("env").and_then(Value::as_sequence_mut) else {
            continue;
        };
        for var in env.iter_mut().filter_map(Value::as_mapping_mut) {
            let is_image = var
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.ends_with(IMAGE_ENV_SUFFIX));
            if !is_image {
                continue;
            }
            let Some(image) = var.get("value").and_then(Value::as_str).map(str::to_string)
            else {
                continue;
            };
            if let Some(expr) = resolution.resolve(mapping, &image) {
                set(var, "value", expr);
            }
        }
    }
    Ok(())
}

/// Only `image` of nested Deployments; no pull policy or argument rewrite.
fn rewrite_addon_template_images(
    doc: &mut ManifestDocument,
    mapping: &ImageKeyMapping,
    resolution: &mut Resolution,
) {
    let Some(manifests) = get_path_mut(
        &mut doc.root,
        &["spec", "agentSpec", "workload", "manifests"],
    )
    .and_then(Value::as_sequence_mut) else {
        log::debug!("{} has no workload manifests", doc.path.display());
        return;
    };

    for manifest in manifests.iter_mut() {
        if manifest.get("kind").and_then(Value::as_str) != Some("Deployment") {
            continue;
        }
        let Some(containers) = pod_spec_of(manifest).and_then(containers_of) else {
            continue;
        };
        for container in containers.iter_mut().filter_map(Value::as_mapping_mut) {
            let Some(image) = container.get("image").and_then(Value::as_str).map(str::to_string)
            else {
                continue;
            };
            if let Some(expr) = resolution.resolve(mapping, &image) {
                set(container, "image", expr);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewriter::yaml::{get_path, str_at};
    use std::path::PathBuf;

    fn bundle(manifests: &[(&str, &str)]) -> ChartBundle {
        ChartBundle {
            dir: PathBuf::from("/charts/toggle/test"),
            values: serde_yaml::from_str(
                "global:\n  imageOverrides:\n    imageOverride: \"\"\n  pullPolicy: Always\n",
            )
            .unwrap(),
            manifests: manifests
                .iter()
                .map(|(path, content)| ManifestDocument::parse(*path, content).unwrap())
                .collect(),
        }
    }

    const DEPLOYMENT: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: controller
spec:
  template:
    spec:
      containers:
      - name: manager
        image: quay.io/acme/controller:v1
        imagePullPolicy: IfNotPresent
        args:
        - --leader-elect
        - --agent-image-name=quay.io/acme/controller:v1
        env:
        - name: AGENT_IMAGE
          value: quay.io/acme/agent:v2
        - name: LOG_LEVEL
          value: info
        - name: FROM_SECRET_IMAGE
          valueFrom:
            secretKeyRef:
              name: images
              key: extra
"#;

    fn ctx(pairs: &[(&str, &str)]) -> RewriteContext {
        let mut ctx = RewriteContext::for_chart("test");
        ctx.image_mappings = pairs.iter().copied().collect();
        ctx
    }

    #[test]
    fn test_rewrite_container_and_env_images() {
        let mut bundle = bundle(&[("deployment.yaml", DEPLOYMENT)]);
        let keys = rewrite_images(
            &mut bundle,
            &ctx(&[("controller", "controllerImage"), ("agent", "agentImage")]),
        )
        .unwrap();
        assert_eq!(keys, vec!["controllerImage", "agentImage"]);

        let container = get_path(
            &bundle.manifests[0].root,
            &["spec", "template", "spec", "containers"],
        )
        .and_then(|c| c.get(0))
        .unwrap();
        assert_eq!(
            str_at(container, &["image"]),
            Some("{{ .Values.global.imageOverrides.controllerImage }}")
        );
        assert_eq!(
            str_at(container, &["imagePullPolicy"]),
            Some("{{ .Values.global.pullPolicy }}")
        );
        let args = container.get("args").unwrap();
        assert_eq!(args.get(0).and_then(Value::as_str), Some("--leader-elect"));
        assert_eq!(
            args.get(1).and_then(Value::as_str),
            Some("--agent-image-name={{ .Values.global.imageOverrides.controllerImage }}")
        );
        let env = container.get("env").unwrap();
        assert_eq!(
            str_at(env.get(0).unwrap(), &["value"]),
            Some("{{ .Values.global.imageOverrides.agentImage }}")
        );
        assert_eq!(str_at(env.get(1).unwrap(), &["value"]), Some("info"));

        let overrides = get_path(&bundle.values, &["global", "imageOverrides"]).unwrap();
        assert!(overrides.get("imageOverride").is_none());
        assert_eq!(overrides.get("controllerImage"), Some(&Value::from("")));
        assert_eq!(overrides.get("agentImage"), Some(&Value::from("")));
    }

    #[test]
    fn test_unmapped_images_are_aggregated() {
        let mut bundle = bundle(&[("deployment.yaml", DEPLOYMENT)]);
        let before = bundle.values.clone();
        let err = rewrite_images(&mut bundle, &ctx(&[])).unwrap_err();
        match err {
            ChartifyError::UnmappedImages { chart, images } => {
                assert_eq!(chart, "test");
                let repos: Vec<_> = images.iter().map(|e| e.repository.as_str()).collect();
                assert_eq!(repos, vec!["controller", "agent"]);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(bundle.values, before);
    }

    #[test]
    fn test_addon_template_images() {
        let template = r#"
apiVersion: addon.open-cluster-management.io/v1alpha1
kind: AddOnTemplate
metadata:
  name: managed-serviceaccount
spec:
  addonName: managed-serviceaccount
  agentSpec:
    workload:
      manifests:
      - kind: ServiceAccount
        apiVersion: v1
        metadata:
          name: agent
      - kind: Deployment
        apiVersion: apps/v1
        metadata:
          name: agent
        spec:
          template:
            spec:
              containers:
              - name: agent
                image: quay.io/acme/msa-agent:v1
                imagePullPolicy: IfNotPresent
"#;
        let empty_template = "apiVersion: v1\nkind: AddOnTemplate\nmetadata:\n  name: empty\nspec:\n  agentSpec: {}\n";
        let mut bundle = bundle(&[
            ("addontemplate.yaml", template),
            ("addontemplate-empty.yaml", empty_template),
        ]);
        let keys = rewrite_images(&mut bundle, &ctx(&[("msa-agent", "msaAgent")])).unwrap();
        assert_eq!(keys, vec!["msaAgent"]);

        let container = get_path(
            &bundle.manifests[0].root,
            &["spec", "agentSpec", "workload", "manifests"],
        )
        .and_then(|m| m.get(1))
        .and_then(|d| get_path(d, &["spec", "template", "spec", "containers"]))
        .and_then(|c| c.get(0))
        .unwrap();
        assert_eq!(
            str_at(container, &["image"]),
            Some("{{ .Values.global.imageOverrides.msaAgent }}")
        );
        assert_eq!(str_at(container, &["imagePullPolicy"]), Some("IfNotPresent"));
    }

    #[test]
    fn test_deployment_without_containers_is_malformed() {
        let mut bundle = bundle(&[(
            "deployment.yaml",
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: x\nspec: {}\n",
        )]);
        let err = rewrite_images(&mut bundle, &ctx(&[])).unwrap_err();
        assert!(matches!(err, ChartifyError::MalformedManifest { .. }));
    }
}
