// crates/form-rules-core/src/submission.rs
// ============================================================================
// Module: Submission Builder
// Description: Final payload construction from a value snapshot.
// Purpose: Drop non-submitted fields, apply transforms, and nest dotted names.
// Dependencies: form-rules-logic, serde_json
// ============================================================================

//! ## Overview
//! Walks the schema tree rather than the snapshot, so values without a field
//! are never submitted. Groups contribute their children; a `noSubmit` group
//! drops its whole subtree. Undefined values are omitted, and list rows keep
//! only their submitted columns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use form_rules_logic::Values;
use form_rules_logic::get_path;
use serde_json::Map;
use serde_json::Value;

use crate::parser::ParsedSchema;
use crate::schema::ComponentKind;
use crate::schema::FieldSchema;

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds the submission payload.
#[must_use]
pub fn build_submission(parsed: &ParsedSchema, values: &Values) -> Value {
    let mut payload = Map::new();
    collect(parsed.fields(), values, values, &mut payload);
    Value::Object(payload)
}

/// Adds submitted fields read from `source` into `out`.
///
/// `snapshot` is the full form snapshot handed to transforms.
fn collect(fields: &[FieldSchema], source: &Values, snapshot: &Values, out: &mut Map<String, Value>) {
    for field in fields.iter().filter(|field| !field.no_submit) {
        if field.kind() == ComponentKind::Group {
            collect(&field.columns, source, snapshot, out);
            continue;
        }
        let Some(value) = get_path(source, &field.name) else {
            continue;
        };
        let value = match (field.kind(), value) {
            (ComponentKind::List, Value::Array(rows)) => {
                Value::Array(rows.iter().map(|row| submit_row(field, row, snapshot)).collect())
            }
            _ => value.clone(),
        };
        let value = match &field.transform {
            Some(transform) => transform.apply(&value, snapshot),
            None => value,
        };
        insert_nested(out, &field.name, value);
    }
}

/// Filters one list row to its submitted columns.
fn submit_row(list: &FieldSchema, row: &Value, snapshot: &Values) -> Value {
    let Value::Object(cells) = row else {
        return row.clone();
    };
    let mut out = Map::new();
    collect(&list.columns, cells, snapshot, &mut out);
    Value::Object(out)
}

/// Inserts a value at a dotted name, creating objects along the way.
fn insert_nested(out: &mut Map<String, Value>, name: &str, value: Value) {
    let Some((head, rest)) = name.split_once('.') else {
        out.insert(name.to_string(), value);
        return;
    };
    let slot = out.entry(head.to_string()).or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(child) = slot {
        insert_nested(child, rest, value);
    }
}
