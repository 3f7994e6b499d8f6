//! Small navigation helpers over `serde_yaml` trees.

use serde_yaml::{Mapping, Value};

/// Follow a key path from `value`.
pub fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Mutable variant of [`get_path`].
pub fn get_path_mut<'a>(value: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    path.iter()
        .try_fold(value, |current, key| current.get_mut(*key))
}

/// String at `path`, if present and a string.
pub fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    get_path(value, path).and_then(Value::as_str)
}

/// Mapping stored under `key`, created when absent or null.
///
/// Returns `None` when `key` holds some other value.
pub fn child_mapping<'a>(parent: &'a mut Mapping, key: &str) -> Option<&'a mut Mapping> {
    let slot = parent.entry(Value::from(key)).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Mapping(Mapping::new());
    }
    slot.as_mapping_mut()
}

/// Insert or replace `key` in `map`.
pub fn set(map: &mut Mapping, key: &str, value: impl Into<Value>) {
    map.insert(Value::from(key), value.into());
}

/// Empty-string value used as a sentinel for later control injection.
pub fn empty_string() -> Value {
    Value::String(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_path() {
        let doc: Value = serde_yaml::from_str("a:\n  b:\n    c: deep\n").unwrap();
        assert_eq!(str_at(&doc, &["a", "b", "c"]), Some("deep"));
        assert!(get_path(&doc, &["a", "x"]).is_none());
    }

    #[test]
    fn test_child_mapping_replaces_null() {
        let mut map: Mapping = serde_yaml::from_str("securityContext: null\n").unwrap();
        child_mapping(&mut map, "securityContext")
            .unwrap()
            .insert("runAsNonRoot".into(), true.into());
        assert!(child_mapping(&mut map, "labels").is_some());
        let value = Value::Mapping(map);
        assert_eq!(
            get_path(&value, &["securityContext", "runAsNonRoot"]),
            Some(&Value::Bool(true))
        );
        assert_eq!(get_path(&value, &["labels"]), Some(&Value::Mapping(Mapping::new())));
    }

    #[test]
    fn test_child_mapping_keeps_scalars() {
        let mut map: Mapping = serde_yaml::from_str("nodeSelector: zone-a
").unwrap();
        assert!(child_mapping(&mut map, "nodeSelector").is_none());
        assert_eq!(map.get("nodeSelector"), Some(&Value::from("zone-a")));
    }
}
