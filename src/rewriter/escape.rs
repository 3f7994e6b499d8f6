//! Escaping of addon-level template variables.
//!
//! AddOnTemplates carry `{{VAR}}` placeholders meant for the addon
//! framework. Helm would evaluate them, so every occurrence is wrapped in a
//! raw string literal: `{{ `{{VAR}}` }}`.

use serde_yaml::Value;

use crate::rewriter::store::{ChartBundle, ManifestKind};

/// Placeholder form of `variable`.
fn placeholder(variable: &str) -> String {
    format!("{{{{{}}}}}", variable)
}

/// Helm-escaped form of `variable`.
pub fn escaped(variable: &str) -> String {
    format!("{{{{ `{}` }}}}", placeholder(variable))
}

/// Escape every bare occurrence of `variable` in `text`.
///
/// Occurrences that are already escaped are kept as they are.
pub fn escape_variable(text: &str, variable: &str) -> Option<String> {
    let bare = placeholder(variable);
    if !text.contains(&bare) {
        return None;
    }
    let done = escaped(variable);
    let rewritten = text
        .split(done.as_str())
        .map(|segment| segment.replace(&bare, &done))
        .collect::<Vec<_>>()
        .join(&done);
    (rewritten != text).then_some(rewritten)
}

fn escape_in_value(value: &mut Value, variable: &str) -> usize {
    match value {
        Value::String(s) => match escape_variable(s, variable) {
            Some(rewritten) => {
                *s = rewritten;
                1
            }
            None => 0,
        },
        Value::Sequence(seq) => seq.iter_mut().map(|v| escape_in_value(v, variable)).sum(),
        Value::Mapping(map) => map
            .iter_mut()
            .map(|(_, v)| escape_in_value(v, variable))
            .sum(),
        Value::Tagged(tagged) => escape_in_value(&mut tagged.value, variable),
        _ => 0,
    }
}

/// Escape the configured variables in every AddOnTemplate of the bundle.
pub fn escape_template_variables(bundle: &mut ChartBundle, variables: &[String]) -> usize {
    let mut escaped_count = 0;
    for doc in bundle
        .manifests
        .iter_mut()
        .filter(|m| m.kind == ManifestKind::AddOnTemplate)
    {
        for variable in variables {
            log::info!("Escaping variable {} in {}", variable, doc.path.display());
            let count = escape_in_value(&mut doc.root, variable);
            if count > 0 {
                log::info!("Found variable {{{{{}}}}} in {} values", variable, count);
            }
            escaped_count += count;
        }
    }
    escaped_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewriter::store::ManifestDocument;
    use std::path::PathBuf;

    #[test]
    fn test_escape_variable() {
        assert_eq!(
            escape_variable("--hub-kubeconfig={{HUB_KUBECONFIG}}", "HUB_KUBECONFIG").as_deref(),
            Some("--hub-kubeconfig={{ `{{HUB_KUBECONFIG}}` }}")
        );
        assert_eq!(escape_variable("{{ .Values.x }}", "HUB_KUBECONFIG"), None);
    }

    #[test]
    fn test_escape_is_idempotent() {
        let once = escape_variable("a {{CLUSTER_NAME}} b {{CLUSTER_NAME}}", "CLUSTER_NAME").unwrap();
        assert_eq!(once, "a {{ `{{CLUSTER_NAME}}` }} b {{ `{{CLUSTER_NAME}}` }}");
        assert_eq!(escape_variable(&once, "CLUSTER_NAME"), None);

        let mixed = format!("{} {{{{CLUSTER_NAME}}}}", escaped("CLUSTER_NAME"));
        assert_eq!(
            escape_variable(&mixed, "CLUSTER_NAME").unwrap(),
            "{{ `{{CLUSTER_NAME}}` }} {{ `{{CLUSTER_NAME}}` }}"
        );
    }

    #[test]
    fn test_escape_only_addon_templates() {
        let template = r#"
apiVersion: addon.open-cluster-management.io/v1alpha1
kind: AddOnTemplate
metadata:
  name: cluster-proxy
spec:
  agentSpec:
    workload:
      manifests:
      - kind: Deployment
        spec:
          template:
            spec:
              containers:
              - args:
                - --cluster-name={{CLUSTER_NAME}}
                - --hub-kubeconfig={{HUB_KUBECONFIG}}
"#;
        let config_map = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\ndata:\n  x: '{{CLUSTER_NAME}}'\n";
        let mut bundle = ChartBundle {
            dir: PathBuf::from("/chart"),
            values: Value::Null,
            manifests: vec![
                ManifestDocument::parse("addontemplate.yaml", template).unwrap(),
                ManifestDocument::parse("configmap.yaml", config_map).unwrap(),
            ],
        };

        let count = escape_template_variables(
            &mut bundle,
            &["CLUSTER_NAME".to_string(), "HUB_KUBECONFIG".to_string()],
        );
        assert_eq!(count, 2);
        let rendered = bundle.manifests[0].render();
        assert!(rendered.contains("--cluster-name={{ `{{CLUSTER_NAME}}` }}"));
        assert!(rendered.contains("--hub-kubeconfig={{ `{{HUB_KUBECONFIG}}` }}"));
        assert!(bundle.manifests[1].render().contains("'{{CLUSTER_NAME}}'"));
    }
}
