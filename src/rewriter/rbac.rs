//! RBAC object naming.

use serde_yaml::Value;

use crate::error::{ChartifyError, Result};
use crate::rewriter::store::ChartBundle;
use crate::rewriter::yaml::set;

/// Name given to every role and binding of a chart.
pub fn rbac_name(chart_name: &str) -> String {
    format!("{{{{ .Values.org }}}}:{{{{ .Chart.Name }}}}:{}", chart_name)
}

/// Rename Roles, ClusterRoles and their bindings; bindings also get their
/// `roleRef.name` pointed at the same expression.
pub fn normalize_rbac(bundle: &mut ChartBundle, chart_name: &str) -> Result<usize> {
    log::info!("Updating clusterroles, roles, clusterrolebindings, and rolebindings");
    let name = rbac_name(chart_name);
    let mut updated = 0;

    for doc in bundle.manifests.iter_mut().filter(|m| m.kind.is_rbac()) {
        set(doc.metadata_mut()?, "name", name.as_str());
        if doc.kind.is_binding() {
            let role_ref = doc
                .root
                .get_mut("roleRef")
                .and_then(Value::as_mapping_mut)
                .ok_or_else(|| ChartifyError::malformed(&doc.path, "roleRef is missing"))?;
            set(role_ref, "name", name.as_str());
        }
        updated += 1;
    }

    log::info!("Updated {} RBAC objects", updated);
    Ok(updated)
}
