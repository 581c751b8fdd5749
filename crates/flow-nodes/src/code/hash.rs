//! Short content hashes for generated ids
//!
//! Content ids must match the ids already stored by the host, which
//! serializes with a property allowlist: the sorted top-level keys of the
//! content. The same allowlist filters objects at every depth, and numbers
//! print in the host's shortest form (`1.0` prints as `1`).

use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

/// Length of a short hash, in hex characters
pub const SHORT_HASH_LEN: usize = 12;

fn short_sha256(input: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(input.as_bytes()));
    digest[..SHORT_HASH_LEN].to_string()
}

/// Sorted top-level property names of `value`
fn allowlist(value: &Value) -> Vec<String> {
    let mut keys: Vec<String> = match value {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    };
    // UTF-16 order, as the host sorts strings
    keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
    keys
}

fn write_number(n: &Number, out: &mut String) {
    if n.is_i64() || n.is_u64() {
        out.push_str(&n.to_string());
        return;
    }
    // Adding zero folds -0.0 into 0.0
    let f = n.as_f64().unwrap_or(0.0) + 0.0;
    let magnitude = f.abs();
    if f.fract() == 0.0 && magnitude < 1e21 {
        out.push_str(&format!("{:.0}", f));
    } else if magnitude >= 1e21 || magnitude < 1e-6 {
        let exp = format!("{:e}", f);
        match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => {
                out.push_str(&format!("{}e+{}", mantissa, power));
            }
            _ => out.push_str(&exp),
        }
    } else {
        out.push_str(&f.to_string());
    }
}

fn write_filtered(value: &Value, allow: &[String], out: &mut String) {
    match value {
        Value::Object(map) => write_object(map, allow, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_filtered(item, allow, out);
            }
            out.push(']');
        }
        Value::Number(n) => write_number(n, out),
        // Strings, booleans and null already print the same way
        other => out.push_str(&other.to_string()),
    }
}

fn write_object(map: &Map<String, Value>, allow: &[String], out: &mut String) {
    out.push('{');
    let mut first = true;
    for key in allow {
        let Some(field) = map.get(key) else {
            continue;
        };
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_filtered(field, allow, out);
    }
    out.push('}');
}

/// Serialized form of `content` that the content id is computed over
fn content_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        other => {
            let mut out = String::new();
            write_filtered(other, &allowlist(other), &mut out);
            out
        }
    }
}

/// Hash of a value's content. Strings hash as-is; anything else hashes its
/// serialized form with top-level keys sorted.
pub fn content_hash(content: &Value) -> String {
    short_sha256(&content_text(content))
}

/// Stable id of a node within a workflow
pub fn universal_id(workflow_id: &str, node_id: &str) -> String {
    short_sha256(&format!("{}-{}", workflow_id, node_id))
}
