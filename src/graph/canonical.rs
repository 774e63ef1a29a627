//! Canonical JSON text and content hashing for node IDs.
//!
//! The canonical text of a payload is compact JSON with array order preserved and numbers printed
//! the way a JavaScript runtime prints them, so integral values carry no fractional part. Object
//! members follow JavaScript property order: array-index keys (`"0"`, `"9"`, `"10"`) first in
//! numeric order, then every other key in sorted order. The `type` tag leads the non-index
//! members of the top-level object.

use serde_json::{Map, Value};

use crate::foundation::math::Fnv1a64;
use crate::graph::id::NodeId;

/// Recursively sort object keys. Arrays keep their order; primitives are returned unchanged.
///
/// Absent fields never reach this function: payload builders simply do not insert them.
pub fn canonicalize(v: &Value) -> Value {
    match v {
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Deterministic text encoding of `v` in canonical key order.
pub fn canonical_text(v: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, v);
    out
}

/// Hash `(type, payload)` into a namespaced ID.
///
/// The hashed text is `{"type":<type>,<sorted payload members>}`, with any array-index members
/// ahead of `type`. A `type` member inside the payload is not repeated. Non-object payloads are hashed under a single `payload` member.
pub fn make_id(namespace: &str, type_tag: &str, payload: &Value) -> NodeId {
    let text = tagged_text(type_tag, payload);
    let mut h = Fnv1a64::new_default();
    h.write_str(&text);
    NodeId::from_hash(namespace, h.finish())
}

pub(crate) fn tagged_text(type_tag: &str, payload: &Value) -> String {
    let mut out = String::from("{");
    match payload {
        Value::Object(map) => {
            let keys = js_ordered_keys(map);
            let split = keys.partition_point(|k| is_array_index(k));
            let (index_keys, named_keys) = keys.split_at(split);
            for k in index_keys {
                write_member(&mut out, k, &map[*k]);
                out.push(',');
            }
            out.push_str("\"type\":");
            write_string(&mut out, type_tag);
            for k in named_keys.iter().filter(|k| k.as_str() != "type") {
                out.push(',');
                write_member(&mut out, k, &map[*k]);
            }
        }
        other => {
            out.push_str("\"type\":");
            write_string(&mut out, type_tag);
            out.push_str(",\"payload\":");
            write_value(&mut out, other);
        }
    }
    out.push('}');
    out
}

fn write_member(out: &mut String, key: &str, v: &Value) {
    write_string(out, key);
    out.push(':');
    write_value(out, v);
}

/// Canonical array-index key: `0` or a decimal without leading zeros below `2^32 - 1`.
fn is_array_index(k: &str) -> bool {
    let digits = !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit());
    if !digits || (k.len() > 1 && k.starts_with('0')) {
        return false;
    }
    k.parse::<u64>().is_ok_and(|n| n < u64::from(u32::MAX))
}

/// Keys in the order a JavaScript object built from sorted keys enumerates them.
fn js_ordered_keys(map: &Map<String, Value>) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by(|a, b| match (is_array_index(a), is_array_index(b)) {
        (true, true) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        (false, false) => a.cmp(b),
    });
    keys
}

fn write_value(out: &mut String, v: &Value) {
    match v {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, k) in js_ordered_keys(map).into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_member(out, k, &map[k]);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    // serde_json's string escaping matches JSON.stringify for everything nodes contain.
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("\"\""),
    }
}

fn write_number(out: &mut String, n: &serde_json::Number) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
        return;
    }
    if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
        return;
    }
    let f = n.as_f64().unwrap_or(0.0);
    out.push_str(&js_number(f));
}

/// Format a float the way `JSON.stringify` does for the values nodes carry.
pub(crate) fn js_number(f: f64) -> String {
    if !f.is_finite() {
        return "null".to_string();
    }
    if f == 0.0 {
        return "0".to_string();
    }
    if f.fract() == 0.0 && f.abs() < 1e21 {
        return format!("{f:.0}");
    }
    format!("{f}")
}

#[cfg(test)]
#[path = "../../tests/unit/graph/canonical.rs"]
mod tests;
