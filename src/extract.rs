//! Field Path Extraction
//!
//! Resolves dot-separated field paths such as `battery.voltage` against a decoded
//! telemetry document. Resolution is lenient: a missing key, a non-object
//! intermediate node, an empty segment or a non-numeric leaf all resolve to `None`.
//! Device firmware adds and drops fields between versions, so absence is an
//! ordinary outcome and never an error.

use serde_json::Value;

/// Resolves `path` against `root`, returning the numeric leaf if there is one.
///
/// # Examples
///
/// ```
/// use epever_exporter::extract::extract_value;
/// use serde_json::json;
///
/// let doc = json!({"a": {"b": {"c": 3.5}}});
/// assert_eq!(extract_value(&doc, "a.b.c"), Some(3.5));
/// assert_eq!(extract_value(&doc, "a.b"), None);
/// ```
pub fn extract_value(root: &Value, path: &str) -> Option<f64> {
    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }

    match current {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
