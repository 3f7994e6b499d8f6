//! Manifest store for a single chart.
//!
//! A [`ChartBundle`] holds `values.yaml` and every manifest under
//! `templates/` in memory. Rewrite stages mutate the bundle in place and
//! [`ChartBundle::save`] is the single point where anything is written back.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::error::{ChartifyError, Result};
use crate::rewriter::emit;
use crate::rewriter::yaml::{get_path_mut, str_at};

/// Kinds the pipeline knows how to rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    Deployment,
    ServiceAccount,
    ClusterRole,
    Role,
    ClusterRoleBinding,
    RoleBinding,
    AddOnTemplate,
    AddOnDeploymentConfig,
    ClusterManagementAddOn,
    /// Any kind that receives no rewrite
    Other(String),
}

impl ManifestKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "Deployment" => ManifestKind::Deployment,
            "ServiceAccount" => ManifestKind::ServiceAccount,
            "ClusterRole" => ManifestKind::ClusterRole,
            "Role" => ManifestKind::Role,
            "ClusterRoleBinding" => ManifestKind::ClusterRoleBinding,
            "RoleBinding" => ManifestKind::RoleBinding,
            "AddOnTemplate" => ManifestKind::AddOnTemplate,
            "AddOnDeploymentConfig" => ManifestKind::AddOnDeploymentConfig,
            "ClusterManagementAddOn" => ManifestKind::ClusterManagementAddOn,
            other => ManifestKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ManifestKind::Deployment => "Deployment",
            ManifestKind::ServiceAccount => "ServiceAccount",
            ManifestKind::ClusterRole => "ClusterRole",
            ManifestKind::Role => "Role",
            ManifestKind::ClusterRoleBinding => "ClusterRoleBinding",
            ManifestKind::RoleBinding => "RoleBinding",
            ManifestKind::AddOnTemplate => "AddOnTemplate",
            ManifestKind::AddOnDeploymentConfig => "AddOnDeploymentConfig",
            ManifestKind::ClusterManagementAddOn => "ClusterManagementAddOn",
            ManifestKind::Other(kind) => kind,
        }
    }

    /// Role, ClusterRole and their bindings.
    pub fn is_rbac(&self) -> bool {
        matches!(
            self,
            ManifestKind::ClusterRole
                | ManifestKind::Role
                | ManifestKind::ClusterRoleBinding
                | ManifestKind::RoleBinding
        )
    }

    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            ManifestKind::ClusterRoleBinding | ManifestKind::RoleBinding
        )
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Kubernetes resource loaded from a template file.
#[derive(Debug, Clone)]
pub struct ManifestDocument {
    pub path: PathBuf,
    pub kind: ManifestKind,
    pub root: Value,
}

impl ManifestDocument {
    /// Parse a single-document manifest.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let path = path.into();
        let root: Value = serde_yaml::from_str(content)
            .map_err(|e| ChartifyError::malformed(&path, e.to_string()))?;
        let kind = str_at(&root, &["kind"])
            .map(ManifestKind::parse)
            .ok_or_else(|| ChartifyError::malformed(&path, "document has no kind"))?;
        Ok(Self { path, kind, root })
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    pub fn name(&self) -> Option<&str> {
        str_at(&self.root, &["metadata", "name"])
    }

    /// `metadata.name`, required by every kind-specific rewrite.
    pub fn require_name(&self) -> Result<String> {
        self.name()
            .map(str::to_string)
            .ok_or_else(|| self.malformed("metadata.name is missing"))
    }

    pub fn metadata_mut(&mut self) -> Result<&mut Mapping> {
        let path = self.path.clone();
        self.root
            .get_mut("metadata")
            .and_then(Value::as_mapping_mut)
            .ok_or_else(|| ChartifyError::malformed(path, "metadata is missing"))
    }

    /// `spec.template.spec` of a workload.
    pub fn pod_spec_mut(&mut self) -> Result<&mut Mapping> {
        let path = self.path.clone();
        pod_spec_of(&mut self.root)
            .ok_or_else(|| ChartifyError::malformed(path, "spec.template.spec is missing"))
    }

    pub fn malformed(&self, message: impl Into<String>) -> ChartifyError {
        ChartifyError::malformed(&self.path, message)
    }

    /// Serialized form, control blocks included.
    pub fn render(&self) -> String {
        emit::to_yaml_string(&self.root)
    }
}

/// `spec.template.spec` of any workload-shaped value.
pub fn pod_spec_of(workload: &mut Value) -> Option<&mut Mapping> {
    get_path_mut(workload, &["spec", "template", "spec"]).and_then(Value::as_mapping_mut)
}

/// `containers` of a pod spec.
pub fn containers_of(pod_spec: &mut Mapping) -> Option<&mut Vec<Value>> {
    pod_spec
        .get_mut("containers")
        .and_then(Value::as_sequence_mut)
}

/// The in-memory contents of one chart directory.
#[derive(Debug, Clone)]
pub struct ChartBundle {
    pub dir: PathBuf,
    pub values: Value,
    pub manifests: Vec<ManifestDocument>,
}

impl ChartBundle {
    /// Load `values.yaml` and every YAML file under `templates/`.
    pub fn load(dir: &Path) -> Result<Self> {
        let values_path = dir.join("values.yaml");
        if !values_path.is_file() {
            return Err(ChartifyError::MissingChartArtifact(values_path));
        }
        let templates = dir.join("templates");
        if !templates.is_dir() {
            return Err(ChartifyError::MissingChartArtifact(templates));
        }

        let values_content = fs::read_to_string(&values_path)?;
        let values: Value = serde_yaml::from_str(&values_content)
            .map_err(|e| ChartifyError::malformed(&values_path, e.to_string()))?;

        let files = yaml_files_in(&templates)?;
        let manifests = files
            .iter()
            .map(|p| ManifestDocument::load(p))
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Loaded {} manifests from {}",
            manifests.len(),
            templates.display()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            values: if values.is_null() {
                Value::Mapping(Mapping::new())
            } else {
                values
            },
            manifests,
        })
    }

    pub fn values_path(&self) -> PathBuf {
        self.dir.join("values.yaml")
    }

    pub fn manifests_of_kind<'a>(
        &'a self,
        kind: &'a ManifestKind,
    ) -> impl Iterator<Item = &'a ManifestDocument> + 'a {
        self.manifests.iter().filter(move |m| &m.kind == kind)
    }

    pub fn manifests_of_kind_mut<'a>(
        &'a mut self,
        kind: &'a ManifestKind,
    ) -> impl Iterator<Item = &'a mut ManifestDocument> + 'a {
        self.manifests.iter_mut().filter(move |m| &m.kind == kind)
    }

    /// Write every manifest and `values.yaml` back to disk.
    pub fn save(&self) -> Result<()> {
        for manifest in &self.manifests {
            fs::write(&manifest.path, manifest.render())?;
        }
        fs::write(self.values_path(), serde_yaml::to_string(&self.values)?)?;
        log::debug!(
            "Saved {} manifests and values.yaml to {}",
            self.manifests.len(),
            self.dir.display()
        );
        Ok(())
    }
}

pub fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// YAML files directly inside `dir`, sorted by path.
///
/// An entry that cannot be read fails the whole listing.
pub fn yaml_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let path = entry.map_err(std::io::Error::from)?.into_path();
        if path.is_file() && is_yaml_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_chart(dir: &Path) {
        fs::create_dir_all(dir.join("templates")).unwrap();
        fs::write(dir.join("values.yaml"), "global:\n  imageOverrides: {}\n").unwrap();
        fs::write(
            dir.join("templates/serviceaccount.yaml"),
            "apiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: agent\n  namespace: ocm\n",
        )
        .unwrap();
        fs::write(
            dir.join("templates/clusterrole.yaml"),
            "apiVersion: rbac.authorization.k8s.io/v1\nkind: ClusterRole\nmetadata:\n  name: agent\nrules: []\n",
        )
        .unwrap();
        fs::write(dir.join("templates/NOTES.txt"), "not a manifest").unwrap();
    }

    #[test]
    fn test_load_bundle() {
        let temp_dir = TempDir::new().unwrap();
        write_chart(temp_dir.path());

        let bundle = ChartBundle::load(temp_dir.path()).unwrap();
        assert_eq!(bundle.manifests.len(), 2);
        assert_eq!(bundle.manifests[0].kind, ManifestKind::ClusterRole);
        assert_eq!(bundle.manifests[1].kind, ManifestKind::ServiceAccount);
        assert_eq!(
            bundle.manifests_of_kind(&ManifestKind::ServiceAccount).count(),
            1
        );
    }

    #[test]
    fn test_missing_values_is_missing_artifact() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("templates")).unwrap();
        let err = ChartBundle::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, ChartifyError::MissingChartArtifact(_)));
    }

    #[test]
    fn test_manifest_without_kind_is_malformed() {
        let err = ManifestDocument::parse("x.yaml", "metadata:\n  name: x\n").unwrap_err();
        assert!(matches!(err, ChartifyError::MalformedManifest { .. }));
    }

    #[test]
    fn test_save_round_trips_plain_manifests() {
        let temp_dir = TempDir::new().unwrap();
        write_chart(temp_dir.path());

        let bundle = ChartBundle::load(temp_dir.path()).unwrap();
        bundle.save().unwrap();

        let reloaded = ChartBundle::load(temp_dir.path()).unwrap();
        assert_eq!(reloaded.manifests[1].root, bundle.manifests[1].root);
        assert_eq!(reloaded.values, bundle.values);
    }

    #[test]
    fn test_kind_dispatch() {
        assert!(ManifestKind::parse("RoleBinding").is_binding());
        assert!(ManifestKind::parse("ClusterRole").is_rbac());
        assert!(!ManifestKind::parse("ClusterRole").is_binding());
        assert_eq!(
            ManifestKind::parse("ConfigMap"),
            ManifestKind::Other("ConfigMap".to_string())
        );
    }

    #[test]
    fn test_yaml_files_in_lists_sorted_yaml() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["service.yml", "deployment.yaml", "NOTES.txt"] {
            fs::write(temp_dir.path().join(name), "kind: Service\n").unwrap();
        }
        fs::create_dir(temp_dir.path().join("nested.yaml")).unwrap();

        let files = yaml_files_in(temp_dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["deployment.yaml", "service.yml"]);
    }

    #[test]
    fn test_yaml_files_in_reports_walk_errors() {
        let temp_dir = TempDir::new().unwrap();
        let err = yaml_files_in(&temp_dir.path().join("templates")).unwrap_err();
        assert!(matches!(err, ChartifyError::Io(_)));
    }
}
