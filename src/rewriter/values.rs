//! values.yaml bookkeeping for override keys.

use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::{ChartifyError, Result};
use crate::rewriter::yaml::{child_mapping, empty_string};

/// Placeholder key shipped in the values template.
pub const PLACEHOLDER_IMAGE_KEY: &str = "imageOverride";

/// `global.imageOverrides`, created when absent.
///
/// `None` when the root, `global` or `imageOverrides` is not a mapping.
pub fn image_overrides_mut(values: &mut Value) -> Option<&mut Mapping> {
    if values.is_null() {
        *values = Value::Mapping(Mapping::new());
    }
    let global = child_mapping(values.as_mapping_mut()?, "global")?;
    child_mapping(global, "imageOverrides")
}

/// Drop the template placeholder and add an empty entry per key.
pub fn register_image_keys(values: &mut Value, values_path: &Path, keys: &[String]) -> Result<()> {
    let overrides = image_overrides_mut(values).ok_or_else(|| {
        ChartifyError::malformed(values_path, "global.imageOverrides is not a mapping")
    })?;
    overrides.remove(PLACEHOLDER_IMAGE_KEY);
    for key in keys {
        overrides.insert(Value::from(key.as_str()), empty_string());
    }
    Ok(())
}
