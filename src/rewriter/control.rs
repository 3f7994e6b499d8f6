//! Helm flow control injection.
//!
//! The security pass leaves sentinel values at fixed positions of a
//! Deployment. This pass swaps each sentinel for a typed [`ControlBlock`]
//! node. Control nodes travel inside the `serde_yaml` tree as tagged values
//! and are only turned into Helm syntax by the emitter, so no structured
//! step ever sees (or re-escapes) the generated template code.

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};

use crate::rewriter::context::RewriteContext;
use crate::rewriter::emit::{pad, write_entry, write_items};
use crate::rewriter::store::{containers_of, ManifestDocument, ManifestKind};
use crate::rewriter::yaml::set;

const CONTROL_TAG: &str = "chartify/control";

/// Unquoted replica count expression.
pub const REPLICA_COUNT_EXPR: &str = "{{ .Values.hubconfig.replicaCount }}";

/// Minimum platform version for the pod-level `RuntimeDefault` seccomp profile.
pub const SECCOMP_MIN_OCP_VERSION: &str = ">=4.11.0";

/// Generated template code attached to one mapping entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlBlock {
    /// `nodeSelector` rendered from `hubconfig.nodeSelector` when set
    NodeSelector,
    /// `imagePullSecrets` rendered when `global.pullSecret` is set
    PullSecrets,
    /// `tolerations` rendered from the `hubconfig.tolerations` list
    Tolerations,
    /// Container `env` with proxy variables ahead of the existing entries
    ContainerEnv {
        pull_secret_override: bool,
        entries: Vec<Value>,
    },
    /// `replicas` taken from `hubconfig.replicaCount`
    ReplicaCount,
    /// An entry only rendered on clusters at or above the minimum version
    SeccompGate(Value),
}

impl ControlBlock {
    fn name(&self) -> &'static str {
        match self {
            ControlBlock::NodeSelector => "nodeSelector",
            ControlBlock::PullSecrets => "imagePullSecrets",
            ControlBlock::Tolerations => "tolerations",
            ControlBlock::ContainerEnv { .. } => "env",
            ControlBlock::ReplicaCount => "replicas",
            ControlBlock::SeccompGate(_) => "seccompGate",
        }
    }

    /// Encode as a tagged tree node.
    pub fn into_value(self) -> Value {
        let mut body = Mapping::new();
        set(&mut body, "block", self.name());
        match self {
            ControlBlock::ContainerEnv {
                pull_secret_override,
                entries,
            } => {
                set(&mut body, "pullSecretOverride", pull_secret_override);
                set(&mut body, "entries", Value::Sequence(entries));
            }
            ControlBlock::SeccompGate(inner) => set(&mut body, "body", inner),
            _ => {}
        }
        Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(CONTROL_TAG),
            value: Value::Mapping(body),
        }))
    }

    /// Decode a tree node, `None` for anything that is not a control node.
    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Tagged(tagged) = value else {
            return None;
        };
        if tagged.tag != Tag::new(CONTROL_TAG) {
            return None;
        }
        let body = &tagged.value;
        let block = match body.get("block")?.as_str()? {
            "nodeSelector" => ControlBlock::NodeSelector,
            "imagePullSecrets" => ControlBlock::PullSecrets,
            "tolerations" => ControlBlock::Tolerations,
            "replicas" => ControlBlock::ReplicaCount,
            "env" => ControlBlock::ContainerEnv {
                pull_secret_override: body
                    .get("pullSecretOverride")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                entries: body
                    .get("entries")
                    .and_then(Value::as_sequence)
                    .cloned()
                    .unwrap_or_default(),
            },
            "seccompGate" => ControlBlock::SeccompGate(body.get("body")?.clone()),
            _ => return None,
        };
        Some(block)
    }

    pub fn is_control(value: &Value) -> bool {
        Self::from_value(value).is_some()
    }

    /// Write the block for the entry named `key` at `indent`.
    pub fn write(&self, lines: &mut Vec<String>, key: &str, indent: usize) {
        let p = pad(indent);
        match self {
            ControlBlock::NodeSelector => {
                lines.push("{{- with .Values.hubconfig.nodeSelector }}".to_string());
                lines.push(format!("{}{}:", p, key));
                lines.push(format!("{{{{ toYaml . | indent {} }}}}", indent + 2));
                lines.push("{{- end }}".to_string());
            }
            ControlBlock::PullSecrets => {
                lines.push("{{- if .Values.global.pullSecret }}".to_string());
                lines.push(format!("{}{}:", p, key));
                lines.push(format!("{}- name: {{{{ .Values.global.pullSecret }}}}", p));
                lines.push("{{- end }}".to_string());
            }
            ControlBlock::Tolerations => {
                lines.push("{{- with .Values.hubconfig.tolerations }}".to_string());
                lines.push(format!("{}{}:", p, key));
                lines.push(format!("{}{{{{- range . }}}}", p));
                lines.push(format!(
                    "{}- {{{{ if .Key }}}} key: {{{{ .Key }}}} {{{{- end }}}}",
                    p
                ));
                for field in ["Operator", "Value", "Effect", "TolerationSeconds"] {
                    lines.push(format!(
                        "{}  {{{{ if .{f} }}}} {k}: {{{{ .{f} }}}} {{{{- end }}}}",
                        p,
                        f = field,
                        k = lower_first(field)
                    ));
                }
                lines.push(format!("{}  {{{{- end }}}}", p));
                lines.push("{{- end }}".to_string());
            }
            ControlBlock::ContainerEnv {
                pull_secret_override,
                entries,
            } => {
                lines.push(format!("{}{}:", p, key));
                if *pull_secret_override {
                    lines.push("{{- if .Values.global.pullSecret }}".to_string());
                    lines.push(format!("{}- name: AGENT_IMAGE_PULL_SECRET", p));
                    lines.push(format!("{}  value: {{{{ .Values.global.pullSecret }}}}", p));
                    lines.push("{{- end }}".to_string());
                }
                lines.push("{{- if .Values.hubconfig.proxyConfigs }}".to_string());
                for var in ["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY"] {
                    lines.push(format!("{}- name: {}", p, var));
                    lines.push(format!(
                        "{}  value: {{{{ .Values.hubconfig.proxyConfigs.{} }}}}",
                        p, var
                    ));
                }
                lines.push("{{- end }}".to_string());
                write_items(lines, entries, indent);
            }
            ControlBlock::ReplicaCount => {
                lines.push(format!("{}{}: {}", p, key, REPLICA_COUNT_EXPR));
            }
            ControlBlock::SeccompGate(body) => {
                lines.push(format!(
                    "{{{{- if semverCompare \"{}\" .Values.hubconfig.ocpVersion }}}}",
                    SECCOMP_MIN_OCP_VERSION
                ));
                write_entry(lines, key, body, indent);
                lines.push("{{- end }}".to_string());
            }
        }
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Replace the sentinels left on a Deployment with control blocks.
///
/// Returns the number of blocks injected. Positions that already hold a
/// control node are left alone, so running this twice changes nothing.
pub fn inject_controls(doc: &mut ManifestDocument, ctx: &RewriteContext) -> crate::Result<usize> {
    if doc.kind != ManifestKind::Deployment {
        return Ok(0);
    }
    let mut injected = 0;

    if let Some(spec) = doc.root.get_mut("spec").and_then(Value::as_mapping_mut) {
        if replace_if(spec, "replicas", ControlBlock::ReplicaCount, |v| {
            v.as_str() == Some(REPLICA_COUNT_EXPR)
        }) {
            injected += 1;
        }
    }

    let pull_secret_override = ctx.adds_pull_secret_env();
    let pod_spec = doc.pod_spec_mut()?;

    for (key, block) in [
        ("nodeSelector", ControlBlock::NodeSelector),
        ("imagePullSecrets", ControlBlock::PullSecrets),
        ("tolerations", ControlBlock::Tolerations),
    ] {
        if replace_if(pod_spec, key, block, is_empty_sentinel) {
            injected += 1;
        }
    }

    if let Some(security_context) = pod_spec
        .get_mut("securityContext")
        .and_then(Value::as_mapping_mut)
    {
        if let Some(profile) = security_context.get_mut("seccompProfile") {
            let runtime_default =
                profile.get("type").and_then(Value::as_str) == Some("RuntimeDefault");
            if runtime_default && !ControlBlock::is_control(profile) {
                let body = std::mem::take(profile);
                *profile = ControlBlock::SeccompGate(body).into_value();
                injected += 1;
            }
        }
    }

    if let Some(containers) = containers_of(pod_spec) {
        for container in containers.iter_mut().filter_map(Value::as_mapping_mut) {
            let Some(env) = container.get_mut("env") else {
                continue;
            };
            if ControlBlock::is_control(env) {
                continue;
            }
            let entries = match env {
                Value::Mapping(map) if map.is_empty() => Vec::new(),
                Value::Sequence(seq) => std::mem::take(seq),
                _ => continue,
            };
            *env = ControlBlock::ContainerEnv {
                pull_secret_override,
                entries,
            }
            .into_value();
            injected += 1;
        }
    }

    log::debug!(
        "Injected {} control blocks into {}",
        injected,
        doc.path.display()
    );
    Ok(injected)
}

fn is_empty_sentinel(value: &Value) -> bool {
    value.as_str() == Some("")
}

fn replace_if(
    map: &mut Mapping,
    key: &str,
    block: ControlBlock,
    matches: impl Fn(&Value) -> bool,
) -> bool {
    match map.get_mut(key) {
        Some(slot) if !ControlBlock::is_control(slot) && matches(slot) => {
            *slot = block.into_value();
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewriter::context::RewriteContext;

    const HARDENED: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: addon-manager
spec:
  replicas: '{{ .Values.hubconfig.replicaCount }}'
  template:
    spec:
      nodeSelector: ''
      imagePullSecrets: ''
      tolerations: ''
      securityContext:
        runAsNonRoot: true
        seccompProfile:
          type: RuntimeDefault
      containers:
      - name: manager
        image: quay.io/acme/manager:v1
        env: {}
      - name: sidecar
        image: quay.io/acme/sidecar:v1
        env:
        - name: LOG_LEVEL
          value: debug
"#;

    fn hardened() -> ManifestDocument {
        ManifestDocument::parse("deployment.yaml", HARDENED).unwrap()
    }

    #[test]
    fn test_inject_all_blocks() {
        let mut doc = hardened();
        let ctx = RewriteContext::for_chart("managed-serviceaccount");
        let injected = inject_controls(&mut doc, &ctx).unwrap();
        assert_eq!(injected, 7);

        let rendered = doc.render();
        assert!(rendered.contains("  replicas: {{ .Values.hubconfig.replicaCount }}\n"));
        assert!(rendered.contains(
            "{{- with .Values.hubconfig.nodeSelector }}\n      nodeSelector:\n{{ toYaml . | indent 8 }}\n{{- end }}\n"
        ));
        assert!(rendered.contains(
            "{{- if .Values.global.pullSecret }}\n      imagePullSecrets:\n      - name: {{ .Values.global.pullSecret }}\n{{- end }}\n"
        ));
        assert!(rendered.contains("      tolerations:\n      {{- range . }}\n      - {{ if .Key }} key: {{ .Key }} {{- end }}\n"));
        assert!(rendered.contains("        {{ if .TolerationSeconds }} tolerationSeconds: {{ .TolerationSeconds }} {{- end }}\n"));
        assert!(rendered.contains(
            "{{- if semverCompare \">=4.11.0\" .Values.hubconfig.ocpVersion }}\n        seccompProfile:\n          type: RuntimeDefault\n{{- end }}\n"
        ));
        assert!(rendered.contains(
            "        env:\n{{- if .Values.hubconfig.proxyConfigs }}\n        - name: HTTP_PROXY\n          value: {{ .Values.hubconfig.proxyConfigs.HTTP_PROXY }}\n"
        ));
        assert!(rendered.contains(
            "          value: {{ .Values.hubconfig.proxyConfigs.NO_PROXY }}\n{{- end }}\n        - name: LOG_LEVEL\n          value: debug\n"
        ));
        assert!(!rendered.contains("AGENT_IMAGE_PULL_SECRET"));
    }

    #[test]
    fn test_inject_is_idempotent() {
        let mut doc = hardened();
        let ctx = RewriteContext::for_chart("cluster-proxy");
        inject_controls(&mut doc, &ctx).unwrap();
        let once = doc.render();

        assert_eq!(inject_controls(&mut doc, &ctx).unwrap(), 0);
        let twice = doc.render();
        assert_eq!(once, twice);
        assert_eq!(twice.matches("semverCompare").count(), 1);
    }

    #[test]
    fn test_pull_secret_override_env() {
        let mut doc = hardened();
        let mut ctx = RewriteContext::for_chart("managed-serviceaccount");
        ctx.inclusions.push("pullSecretOverride".to_string());
        inject_controls(&mut doc, &ctx).unwrap();

        let rendered = doc.render();
        assert!(rendered.contains(
            "        env:\n{{- if .Values.global.pullSecret }}\n        - name: AGENT_IMAGE_PULL_SECRET\n          value: {{ .Values.global.pullSecret }}\n{{- end }}\n{{- if .Values.hubconfig.proxyConfigs }}\n"
        ));
    }

    #[test]
    fn test_non_default_seccomp_is_not_gated() {
        let yaml = HARDENED.replace("type: RuntimeDefault", "type: Localhost");
        let mut doc = ManifestDocument::parse("deployment.yaml", &yaml).unwrap();
        inject_controls(&mut doc, &RewriteContext::for_chart("x")).unwrap();
        assert!(!doc.render().contains("semverCompare"));
    }

    #[test]
    fn test_control_block_survives_value_encoding() {
        let block = ControlBlock::ContainerEnv {
            pull_secret_override: true,
            entries: vec![Value::from("x")],
        };
        assert_eq!(ControlBlock::from_value(&block.clone().into_value()), Some(block));
        assert_eq!(ControlBlock::from_value(&Value::from("")), None);
    }

    #[test]
    fn test_other_kinds_untouched() {
        let mut doc = ManifestDocument::parse(
            "sa.yaml",
            "apiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: x\n",
        )
        .unwrap();
        assert_eq!(
            inject_controls(&mut doc, &RewriteContext::for_chart("x")).unwrap(),
            0
        );
    }
}
