// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lookup primitives: dotted-path probing and bounded breadth-first key
//! search over a JSON tree.

use serde_json::Value;
use std::collections::VecDeque;

/// Nodes visited before the key search gives up.
const SEARCH_MAX_VISITS: usize = 256;

/// Nesting depth the key search descends to.
const SEARCH_MAX_DEPTH: usize = 8;

/// A value that counts as "absent" for extraction purposes: null, a
/// blank string, or an empty array.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Resolve a dotted path with optional array-index segments, e.g.
/// `statuses[0].errors[0].code`. Returns `None` for missing or empty
/// targets.
#[must_use]
pub fn probe_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        let (name, indices) = split_segment(segment)?;
        if !name.is_empty() {
            current = current.as_object()?.get(name)?;
        }
        for idx in indices {
            current = current.as_array()?.get(idx)?;
        }
    }
    if is_empty_value(current) { None } else { Some(current) }
}

/// Split `name[0][2]` into the bare name and its index list.
fn split_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    match segment.find('[') {
        None => Some((segment, Vec::new())),
        Some(open) => {
            let name = &segment[..open];
            let mut indices = Vec::new();
            let mut rest = &segment[open..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped.find(']')?;
                indices.push(stripped[..close].parse().ok()?);
                rest = &stripped[close + 1..];
            }
            if rest.is_empty() { Some((name, indices)) } else { None }
        }
    }
}

/// Breadth-first search for the first non-empty value stored under any of
/// `keys` (compared case-insensitively; pass the keys lowercased).
/// Bounded by visit count and depth so adversarial payloads terminate.
#[must_use]
pub fn search_keys<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let mut queue: VecDeque<(&Value, usize)> = VecDeque::new();
    queue.push_back((root, 0));
    let mut visited = 0usize;

    while let Some((node, depth)) = queue.pop_front() {
        visited += 1;
        if visited > SEARCH_MAX_VISITS {
            return None;
        }
        match node {
            Value::Object(map) => {
                for (k, v) in map {
                    let lowered = k.to_ascii_lowercase();
                    if keys.contains(&lowered.as_str()) && !is_empty_value(v) {
                        return Some(v);
                    }
                }
                if depth < SEARCH_MAX_DEPTH {
                    for v in map.values() {
                        queue.push_back((v, depth + 1));
                    }
                }
            }
            Value::Array(items) => {
                if depth < SEARCH_MAX_DEPTH {
                    for v in items {
                        queue.push_back((v, depth + 1));
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Render a scalar as a trimmed string. Strings trim, numbers and bools
/// format; containers and null yield `None`.
#[must_use]
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() { None } else { Some(t.to_string()) }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn probe_plain_path() {
        let v = json!({"a": {"b": {"c": 7}}});
        assert_eq!(probe_path(&v, "a.b.c"), Some(&json!(7)));
        assert_eq!(probe_path(&v, "a.b.missing"), None);
    }

    #[test]
    fn probe_array_indices() {
        let v = json!({"statuses": [{"errors": [{"code": "131051"}]}]});
        assert_eq!(
            probe_path(&v, "statuses[0].errors[0].code"),
            Some(&json!("131051"))
        );
        assert_eq!(probe_path(&v, "statuses[1].errors[0].code"), None);
    }

    #[test]
    fn probe_rejects_empty_targets() {
        let v = json!({"a": "", "b": "  ", "c": [], "d": null});
        assert_eq!(probe_path(&v, "a"), None);
        assert_eq!(probe_path(&v, "b"), None);
        assert_eq!(probe_path(&v, "c"), None);
        assert_eq!(probe_path(&v, "d"), None);
    }

    #[test]
    fn probe_through_non_object_fails_cleanly() {
        let v = json!({"a": 5});
        assert_eq!(probe_path(&v, "a.b"), None);
        assert_eq!(probe_path(&v, "a[0]"), None);
    }

    #[test]
    fn segment_with_multiple_indices() {
        let v = json!({"grid": [[1, 2], [3, 4]]});
        assert_eq!(probe_path(&v, "grid[1][0]"), Some(&json!(3)));
    }

    #[test]
    fn malformed_segment_is_none() {
        let v = json!({"a": [1]});
        assert_eq!(probe_path(&v, "a[x]"), None);
        assert_eq!(probe_path(&v, "a[0"), None);
    }

    #[test]
    fn search_matches_case_insensitively() {
        let v = json!({"outer": {"MessageId": "gs-9"}});
        assert_eq!(search_keys(&v, &["messageid"]), Some(&json!("gs-9")));
    }

    #[test]
    fn search_is_breadth_first() {
        let v = json!({
            "deep": {"deeper": {"phone": "+4411"}},
            "shallow": {"phone": "+4422"}
        });
        assert_eq!(search_keys(&v, &["phone"]), Some(&json!("+4422")));
    }

    #[test]
    fn search_skips_empty_hits() {
        let v = json!({"phone": "", "inner": {"phone": "+4433"}});
        assert_eq!(search_keys(&v, &["phone"]), Some(&json!("+4433")));
    }

    #[test]
    fn search_descends_arrays() {
        let v = json!({"entries": [{"msisdn": "15550001111"}]});
        assert_eq!(search_keys(&v, &["msisdn"]), Some(&json!("15550001111")));
    }

    #[test]
    fn search_misses_return_none() {
        let v = json!({"a": 1});
        assert_eq!(search_keys(&v, &["phone"]), None);
    }

    #[test]
    fn value_to_string_renders_scalars() {
        assert_eq!(value_to_string(&json!(" hi ")).as_deref(), Some("hi"));
        assert_eq!(value_to_string(&json!(42)).as_deref(), Some("42"));
        assert_eq!(value_to_string(&json!(true)).as_deref(), Some("true"));
        assert_eq!(value_to_string(&json!([1])), None);
        assert_eq!(value_to_string(&json!({})), None);
        assert_eq!(value_to_string(&json!(null)), None);
    }
}
