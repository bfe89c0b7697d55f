// crates/form-rules-logic/src/value.rs
// ============================================================================
// Module: Value Snapshot Access
// Description: Dot-path lookup and emptiness checks over value snapshots.
// Purpose: Give every evaluator the same total, non-panicking view of values.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! A value snapshot is a JSON object keyed by field name. Keys may be flat
//! dotted paths (`"address.city"`) or nested objects; lookups accept both.
//! An absent key is *undefined* and is modelled as `None`, while an explicit
//! JSON `null` is `Some(Value::Null)`.

use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Snapshot of current field values keyed by field name or dot-path.
pub type Values = Map<String, Value>;

// ============================================================================
// SECTION: Lookup
// ============================================================================

/// Resolves a dot-path against the snapshot.
///
/// An exact flat key wins over traversal. Otherwise each segment descends
/// into objects by key and into arrays by numeric index. Any missing
/// intermediate segment yields `None`.
#[must_use]
pub fn get_path<'a>(values: &'a Values, path: &str) -> Option<&'a Value> {
    if let Some(value) = values.get(path) {
        return Some(value);
    }
    let mut segments = path.split('.');
    let mut current = values.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

// ============================================================================
// SECTION: Emptiness
// ============================================================================

/// Returns true for undefined, null, blank strings, and empty arrays.
#[must_use]
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}
