//! C3: sanitize/restore/validate values crossing the remote boundary.

use serde_json::{Map, Value};

/// Deepest nesting level a value is allowed to reach before the remainder
/// of the subtree is collapsed to `null`.
const MAX_DEPTH: usize = 50;
const MAX_COLLECTION_SIZE: usize = 20_000;
const MAX_STRING_LEN: usize = 1_000_000;
const MAX_SERIALIZED_LEN: usize = 1_000_000;

/// Marker key wrapping a timestamp that should round-trip as a point in
/// time (there is no native `Date` type once a value crosses into JSON).
pub const DATE_MARKER_KEY: &str = "__date__";

/// Sentinel the remote side persists in place of an explicit `null` write.
/// TODO(ganon#sub001): confirm with the adapter team whether this sentinel
/// is still required by current adapters, or a leftover from an older
/// backend that rejected top-level `null` document fields.
pub const EMPTY_SENTINEL: &str = "__empty__";

/// Prepares a value for remote storage: drops unrepresentable content,
/// collapses over-deep subtrees, and normalizes date markers.
pub fn sanitize(value: &Value) -> Value {
    sanitize_at_depth(value, 0)
}

fn sanitize_at_depth(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::Null;
    }
    match value {
        Value::Object(map) => {
            if is_date_marker(map) {
                return sanitize_date_marker(map);
            }
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), sanitize_at_depth(v, depth + 1));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| sanitize_at_depth(v, depth + 1))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_date_marker(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.contains_key(DATE_MARKER_KEY)
}

fn sanitize_date_marker(map: &Map<String, Value>) -> Value {
    let millis = map.get(DATE_MARKER_KEY).and_then(Value::as_f64);
    match millis {
        Some(m) if m.is_finite() => {
            let mut out = Map::new();
            out.insert(DATE_MARKER_KEY.to_string(), Value::from(m));
            Value::Object(out)
        }
        // An invalid Date (NaN/Infinity) sanitizes to null rather than a
        // marker object the restore side cannot interpret.
        _ => Value::Null,
    }
}

/// Reverses [`sanitize`] for values read back from the remote store:
/// converts date markers back to plain epoch-millisecond numbers and
/// un-wraps the empty-write sentinel.
pub fn restore(value: &Value) -> Value {
    match value {
        Value::String(s) if s == EMPTY_SENTINEL => Value::Null,
        Value::Object(map) if is_date_marker(map) => map
            .get(DATE_MARKER_KEY)
            .cloned()
            .unwrap_or(Value::Null),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), restore(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(restore).collect()),
        other => other.clone(),
    }
}

/// Name produced for input that sanitizes down to nothing.
const INVALID_FIELD_NAME: &str = "invalid_field";

/// Remote-safe field names: leading dots are stripped outright (they'd
/// otherwise address a nested field on most document stores); `.`, `/`,
/// `[`, `]`, `*` are path/query metacharacters on most document stores and
/// are replaced with underscores; a result that collides with the
/// `__*__` pattern reserved for system fields is wrapped so it no longer
/// matches; empty input, or input that sanitizes to nothing, becomes
/// [`INVALID_FIELD_NAME`].
pub fn sanitize_field_name(name: &str) -> String {
    if name.is_empty() {
        return INVALID_FIELD_NAME.to_string();
    }

    let stripped = name.trim_start_matches('.');

    let sanitized: String = stripped
        .chars()
        .map(|c| match c {
            '.' | '/' | '[' | ']' | '*' => '_',
            other => other,
        })
        .collect();

    if sanitized.is_empty() {
        return INVALID_FIELD_NAME.to_string();
    }

    if is_reserved_pattern(&sanitized) {
        return format!("esc_{sanitized}_esc");
    }

    sanitized
}

/// Matches the `__*__` shape reserved for system field names.
fn is_reserved_pattern(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Checks a value against remote-store size/shape limits. Validation
/// failures are warn-only at the call sites that use this (§4.3) - the
/// write still proceeds, degraded, rather than blocking the caller.
pub fn validate(value: &Value) -> ValidationReport {
    let mut errors = Vec::new();
    validate_at_depth(value, 0, &mut errors);

    if let Ok(serialized) = serde_json::to_string(value) {
        if serialized.len() > MAX_SERIALIZED_LEN {
            errors.push(format!(
                "serialized value is {} bytes, exceeds {MAX_SERIALIZED_LEN}",
                serialized.len()
            ));
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

fn validate_at_depth(value: &Value, depth: usize, errors: &mut Vec<String>) {
    if depth > MAX_DEPTH {
        errors.push(format!("nesting exceeds max depth of {MAX_DEPTH}"));
        return;
    }
    match value {
        Value::String(s) if s.len() > MAX_STRING_LEN => {
            errors.push(format!("string exceeds max length of {MAX_STRING_LEN}"));
        }
        Value::Array(items) => {
            if items.len() > MAX_COLLECTION_SIZE {
                errors.push(format!(
                    "array has {} elements, exceeds max of {MAX_COLLECTION_SIZE}",
                    items.len()
                ));
            }
            for item in items {
                validate_at_depth(item, depth + 1, errors);
            }
        }
        Value::Object(map) => {
            if map.len() > MAX_COLLECTION_SIZE {
                errors.push(format!(
                    "object has {} fields, exceeds max of {MAX_COLLECTION_SIZE}",
                    map.len()
                ));
            }
            for v in map.values() {
                validate_at_depth(v, depth + 1, errors);
            }
        }
        _ => {}
    }
}

/// Confirms `restore(sanitize(value)) == value` for a value that does not
/// exercise the lossy paths (over-deep nesting, invalid dates, the empty
/// sentinel) - those are intentional, documented divergences, not bugs.
pub fn test_round_trip(value: &Value) -> bool {
    restore(&sanitize(value)) == *value
}
