//! Block-style YAML emitter aware of control blocks.
//!
//! Plain data is written the way a block-style dumper would (indentless
//! sequences, insertion order preserved). Control nodes are written
//! verbatim by [`ControlBlock::write`], which is why the output of this
//! module is a Helm template and no longer necessarily valid YAML.

use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

use crate::rewriter::control::ControlBlock;

const INDENT: usize = 2;

/// Plain scalars that a YAML 1.1 parser (Helm, Kubernetes) resolves to a
/// bool, null, int, float or timestamp.
static YAML11_IMPLICIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"y|Y|yes|Yes|YES|n|N|no|No|NO",
        r"|true|True|TRUE|false|False|FALSE",
        r"|on|On|ON|off|Off|OFF",
        r"|~|null|Null|NULL",
        r"|[-+]?0b[01_]+",
        r"|[-+]?0x[0-9a-fA-F_]+",
        r"|[-+]?[0-9][0-9_]*",
        r"|[-+]?[1-9][0-9_]*(?::[0-5]?[0-9])+(?:\.[0-9_]*)?",
        r"|[-+]?[0-9][0-9_]*\.[0-9_]*(?:[eE][-+]?[0-9]+)?",
        r"|[-+]?\.[0-9_]+(?:[eE][-+]?[0-9]+)?",
        r"|[-+]?[0-9][0-9_]*[eE][-+]?[0-9]+",
        r"|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN)",
        r"|[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}",
        r"(?:(?:[Tt]|[ \t]+)[0-9]{1,2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]*)?",
        r"(?:[ \t]*(?:Z|[-+][0-9]{1,2}(?::[0-9]{2})?))?)?",
        r")$"
    ))
    .unwrap()
});

/// Render a document root.
pub fn to_yaml_string(root: &Value) -> String {
    let mut lines = Vec::new();
    match root {
        Value::Mapping(map) if !map.is_empty() => write_mapping(&mut lines, root, 0),
        Value::Sequence(seq) if !seq.is_empty() => write_items(&mut lines, seq, 0),
        other => lines.push(scalar(other)),
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub(crate) fn pad(indent: usize) -> String {
    " ".repeat(indent)
}

/// Write every entry of a mapping value at `indent`.
fn write_mapping(lines: &mut Vec<String>, value: &Value, indent: usize) {
    if let Value::Mapping(map) = value {
        for (key, child) in map {
            write_entry(lines, &scalar(key), child, indent);
        }
    }
}

/// Write `key: value` at `indent`, descending into collections.
pub(crate) fn write_entry(lines: &mut Vec<String>, key: &str, value: &Value, indent: usize) {
    if let Some(block) = ControlBlock::from_value(value) {
        block.write(lines, key, indent);
        return;
    }
    match value {
        Value::Mapping(map) if !map.is_empty() => {
            lines.push(format!("{}{}:", pad(indent), key));
            write_mapping(lines, value, indent + INDENT);
        }
        Value::Sequence(seq) if !seq.is_empty() => {
            lines.push(format!("{}{}:", pad(indent), key));
            write_items(lines, seq, indent);
        }
        other => lines.push(format!("{}{}: {}", pad(indent), key, scalar(other))),
    }
}

/// Write sequence items as `- ` entries at `indent`.
pub(crate) fn write_items(lines: &mut Vec<String>, items: &[Value], indent: usize) {
    for item in items {
        match item {
            Value::Mapping(map) if !map.is_empty() => {
                let mut nested = Vec::new();
                write_mapping(&mut nested, item, indent + INDENT);
                attach_dash(lines, nested, indent);
            }
            Value::Sequence(seq) if !seq.is_empty() => {
                let mut nested = Vec::new();
                write_items(&mut nested, seq, indent + INDENT);
                attach_dash(lines, nested, indent);
            }
            other => lines.push(format!("{}- {}", pad(indent), scalar(other))),
        }
    }
}

/// Turn the first data line of a nested block into the item line.
fn attach_dash(lines: &mut Vec<String>, mut nested: Vec<String>, indent: usize) {
    let prefix = pad(indent + INDENT);
    if let Some(first) = nested
        .iter_mut()
        .find(|l| !l.starts_with("{{") && l.starts_with(&prefix))
    {
        *first = format!("{}- {}", pad(indent), &first[prefix.len()..]);
    }
    lines.extend(nested);
}

/// Inline representation of a scalar or empty collection.
pub(crate) fn scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Mapping(map) if map.is_empty() => "{}".to_string(),
        Value::Sequence(seq) if seq.is_empty() => "[]".to_string(),
        Value::Tagged(tagged) => format!("{} {}", tagged.tag, scalar(&tagged.value)),
        // Non-empty collections in key or tag position fall back to flow style.
        other => serde_json::to_string(other).unwrap_or_else(|_| "null".to_string()),
    }
}

/// Quote a string only as much as YAML requires.
fn quote(s: &str) -> String {
    if s.chars().any(|c| c.is_control()) {
        return json_quote(s);
    }
    match serde_yaml::to_string(s) {
        Ok(rendered) => {
            // A root scalar may come with document markers.
            let rendered = rendered.trim_end_matches('\n');
            let rendered = rendered.strip_suffix("\n...").unwrap_or(rendered);
            let rendered = rendered.strip_prefix("--- ").unwrap_or(rendered);
            if rendered.contains('\n') {
                json_quote(s)
            } else if rendered == s && YAML11_IMPLICIT.is_match(s) {
                // Plain for YAML 1.2 but typed for the parser Helm uses.
                single_quote(s)
            } else {
                rendered.to_string()
            }
        }
        Err(_) => json_quote(s),
    }
}

fn single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// JSON strings are valid double-quoted YAML scalars.
fn json_quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("{:?}", s))
}
