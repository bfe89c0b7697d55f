// crates/form-rules-core/src/state.rs
// ============================================================================
// Module: Field-State Engine
// Description: Visibility, disabled, required, and read-only flags per field.
// Purpose: Combine static flags with condition results for a value snapshot.
// Dependencies: form-rules-logic, serde
// ============================================================================

//! ## Overview
//! Field state is a pure function of the schema, the snapshot, and two
//! form-wide flags. The global disabled flag always wins; the global
//! read-only flag only fills in for fields that do not declare their own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use form_rules_logic::Values;
use form_rules_logic::evaluate;
use serde::Serialize;

use crate::parser::ParsedSchema;
use crate::schema::ComponentKind;
use crate::schema::FieldSchema;

// ============================================================================
// SECTION: Field State
// ============================================================================

/// Derived flags for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldState {
    /// Field is rendered and validated.
    pub visible: bool,
    /// Field rejects input.
    pub disabled: bool,
    /// Field must hold a value.
    pub required: bool,
    /// Field shows its value without editing.
    pub readonly: bool,
}

/// Computes the state of one field.
#[must_use]
pub fn compute_field_state(
    field: &FieldSchema,
    values: &Values,
    global_disabled: bool,
    global_readonly: bool,
) -> FieldState {
    let visible = !field.hidden
        && field.kind() != ComponentKind::Hidden
        && evaluate(field.visible_when.as_ref(), values);
    let disabled = global_disabled
        || field.disabled
        || field.disabled_when.as_ref().is_some_and(|condition| condition.eval(values));
    let required = field.has_required_rule()
        || field.required_when.as_ref().is_some_and(|condition| condition.eval(values));
    FieldState {
        visible,
        disabled,
        required,
        readonly: field.readonly.unwrap_or(global_readonly),
    }
}

/// Computes the state of every field, keyed by name.
#[must_use]
pub fn compute_all_field_states(
    parsed: &ParsedSchema,
    values: &Values,
    global_disabled: bool,
    global_readonly: bool,
) -> BTreeMap<String, FieldState> {
    parsed
        .all_fields()
        .iter()
        .map(|field| {
            let state = compute_field_state(field, values, global_disabled, global_readonly);
            (field.name.clone(), state)
        })
        .collect()
}

// ============================================================================
// SECTION: Watch Set
// ============================================================================

/// Returns the sorted set of fields a host must observe.
#[must_use]
pub fn get_watch_fields(parsed: &ParsedSchema) -> Vec<String> {
    let watched: BTreeSet<String> =
        parsed.all_fields().iter().flat_map(FieldSchema::forward_dependencies).collect();
    watched.into_iter().collect()
}
