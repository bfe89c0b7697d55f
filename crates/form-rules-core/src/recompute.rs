// crates/form-rules-core/src/recompute.rs
// ============================================================================
// Module: Reactive Update
// Description: One-shot derivation of state and writes after a value change.
// Purpose: Replace implicit effect scheduling with a deterministic function
//          the host calls whenever it applies a mutation.
// Dependencies: form-rules-logic, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`recompute`] compares two snapshots and returns:
//! - field states for the settled values;
//! - computed-field writes, evaluated in dependency order on a working copy
//!   so chains settle in one call;
//! - auto-clear writes for `clearOnChange` fields downstream of a change.
//!
//! Computed fields are evaluated again after each round of clears, so a
//! computed value never reflects an input that is about to be cleared. At
//! most one computed write is returned per path.
//!
//! Writes are proposals in system mode. The host applies them and calls
//! `recompute` again only if further user input arrives.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use form_rules_logic::Values;
use form_rules_logic::get_path;
use form_rules_logic::is_empty_value;
use serde_json::Value;

use crate::compute::DEFAULT_CHANGE_EPSILON;
use crate::compute::evaluate_compiled;
use crate::compute::has_material_change;
use crate::parser::ParsedSchema;
use crate::parser::get_downstream_fields;
use crate::schema::ComponentKind;
use crate::schema::FieldSchema;
use crate::state::FieldState;
use crate::state::compute_all_field_states;
use crate::store::FormStore;
use crate::store::SetOptions;
use crate::store::Write;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Inputs that are not part of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecomputeOptions {
    /// Disable every field.
    pub global_disabled: bool,
    /// Read-only fallback for fields without their own flag.
    pub global_readonly: bool,
    /// Numbers closer than this are unchanged.
    pub change_epsilon: f64,
}

impl Default for RecomputeOptions {
    fn default() -> Self {
        Self {
            global_disabled: false,
            global_readonly: false,
            change_epsilon: DEFAULT_CHANGE_EPSILON,
        }
    }
}

/// Everything derived from one value change.
#[derive(Debug, Clone, PartialEq)]
pub struct Recompute {
    /// State per field against the settled values.
    pub field_states: BTreeMap<String, FieldState>,
    /// New computed values, in evaluation order.
    pub computed_writes: Vec<Write>,
    /// Downstream selections to clear.
    pub auto_clear_writes: Vec<Write>,
}

impl Recompute {
    /// Returns computed writes followed by auto-clear writes.
    #[must_use]
    pub fn writes(&self) -> Vec<Write> {
        self.computed_writes.iter().chain(&self.auto_clear_writes).cloned().collect()
    }
}

// ============================================================================
// SECTION: Recompute
// ============================================================================

/// Derives state and proposed writes for a transition to `next`.
///
/// With no `previous` snapshot every key counts as changed.
#[must_use]
pub fn recompute(
    parsed: &ParsedSchema,
    previous: Option<&Values>,
    next: &Values,
    options: &RecomputeOptions,
) -> Recompute {
    let changed = changed_fields(parsed, previous, next);
    let mut working = next.clone();

    let mut computed_writes = Vec::new();
    for write in compute_pass(parsed, &mut working, options.change_epsilon) {
        merge_computed(&mut computed_writes, write);
    }

    let mut sources = changed.clone();
    sources.extend(computed_writes.iter().map(|write| write.path.clone()));
    let mut kept = changed;
    let mut auto_clear_writes: Vec<Write> = Vec::new();
    loop {
        let cleared = plan_clears(parsed, &sources, &kept, &mut working);
        if cleared.is_empty() {
            break;
        }
        let recomputed = compute_pass(parsed, &mut working, options.change_epsilon);
        sources = cleared.iter().chain(&recomputed).map(|write| write.path.clone()).collect();
        kept.extend(cleared.iter().map(|write| write.path.clone()));
        auto_clear_writes.extend(cleared);
        for write in recomputed {
            merge_computed(&mut computed_writes, write);
        }
    }

    let field_states = compute_all_field_states(
        parsed,
        &working,
        options.global_disabled,
        options.global_readonly,
    );
    Recompute {
        field_states,
        computed_writes,
        auto_clear_writes,
    }
}

/// Evaluates every computed field and cell against `working`, applying each
/// write before the next field reads it.
fn compute_pass(parsed: &ParsedSchema, working: &mut Values, epsilon: f64) -> Vec<Write> {
    let mut writes = Vec::new();
    for name in parsed.compute_order().iter().filter(|name| !parsed.is_row_scoped(name)) {
        let Some(field) = parsed.field(name) else {
            continue;
        };
        if let Some(write) = compute_write(parsed, field, name, working, epsilon) {
            working.set(&write.path, write.value.clone(), SetOptions::system());
            writes.push(write);
        }
    }
    for list in parsed.fields().iter().flat_map(top_level_lists) {
        recompute_rows(parsed, list, working, epsilon, &mut writes);
    }
    writes
}

/// Keeps one computed write per path; the later value wins.
fn merge_computed(writes: &mut Vec<Write>, write: Write) {
    match writes.iter_mut().find(|existing| existing.path == write.path) {
        Some(existing) => *existing = write,
        None => writes.push(write),
    }
}

/// Clears non-empty `clearOnChange` fields downstream of `sources`.
///
/// Paths in `kept` are never cleared: fields the user changed directly and
/// fields cleared in an earlier round.
fn plan_clears(
    parsed: &ParsedSchema,
    sources: &BTreeSet<String>,
    kept: &BTreeSet<String>,
    working: &mut Values,
) -> Vec<Write> {
    let mut downstream = BTreeSet::new();
    for source in sources {
        downstream.extend(get_downstream_fields(source, parsed.dependency_graph()));
    }

    let mut writes = Vec::new();
    for name in downstream.iter().filter(|name| !kept.contains(*name)) {
        let Some(field) = parsed.field(name).filter(|field| field.clear_on_change) else {
            continue;
        };
        if is_empty_value(get_path(working, name)) {
            continue;
        }
        let cleared = if field.multiple { Some(Value::Array(Vec::new())) } else { None };
        let write = Write::system(name.clone(), cleared);
        tracing::trace!(path = %write.path, "auto-clear proposed");
        working.set(&write.path, write.value.clone(), SetOptions::system());
        writes.push(write);
    }
    writes
}

/// Returns keys and watched paths whose values differ between snapshots.
fn changed_fields(
    parsed: &ParsedSchema,
    previous: Option<&Values>,
    next: &Values,
) -> BTreeSet<String> {
    let Some(previous) = previous else {
        return next.keys().cloned().collect();
    };
    let mut changed: BTreeSet<String> = previous
        .keys()
        .chain(next.keys())
        .filter(|key| previous.get(*key) != next.get(*key))
        .cloned()
        .collect();
    changed.extend(
        parsed
            .dependency_graph()
            .keys()
            .filter(|path| get_path(previous, path) != get_path(next, path))
            .cloned(),
    );
    changed
}

/// Evaluates one computed field and proposes a write on material change.
fn compute_write(
    parsed: &ParsedSchema,
    field: &FieldSchema,
    path: &str,
    scope: &Values,
    epsilon: f64,
) -> Option<Write> {
    let value = evaluate_field(parsed, field, scope);
    let current = get_path(scope, &field.name);
    if !has_material_change(current, value.as_ref(), epsilon) {
        return None;
    }
    tracing::trace!(path, value = ?value, "computed write proposed");
    Some(Write::system(path, value))
}

/// Evaluates a field's compute expression against a scope.
fn evaluate_field(parsed: &ParsedSchema, field: &FieldSchema, scope: &Values) -> Option<Value> {
    let compute = field.compute.as_ref()?;
    let expression = parsed.expression(&compute.expr)?;
    evaluate_compiled(
        expression,
        scope,
        &compute.resolved_dependencies(),
        compute.precision,
        compute.round_mode,
    )
}

/// Yields list fields reachable without entering another list.
fn top_level_lists(field: &FieldSchema) -> Vec<&FieldSchema> {
    match field.kind() {
        ComponentKind::List => vec![field],
        ComponentKind::Group => field.columns.iter().flat_map(top_level_lists).collect(),
        _ => Vec::new(),
    }
}

/// Evaluates computed columns row by row.
fn recompute_rows(
    parsed: &ParsedSchema,
    list: &FieldSchema,
    working: &mut Values,
    epsilon: f64,
    writes: &mut Vec<Write>,
) {
    let columns = list.row_columns();
    let ordered: Vec<&FieldSchema> = parsed
        .compute_order()
        .iter()
        .filter_map(|name| columns.iter().copied().find(|column| &column.name == name))
        .collect();
    if ordered.is_empty() {
        return;
    }
    let row_count = match get_path(working, &list.name) {
        Some(Value::Array(rows)) => rows.len(),
        _ => return,
    };

    for index in 0 .. row_count {
        for column in &ordered {
            let Some(Value::Object(row)) =
                get_path(working, &list.name).and_then(|rows| rows.get(index))
            else {
                break;
            };
            let row = row.clone();
            let mut scope = working.clone();
            scope.extend(row.iter().map(|(key, value)| (key.clone(), value.clone())));
            let value = evaluate_field(parsed, column, &scope);
            if !has_material_change(get_path(&row, &column.name), value.as_ref(), epsilon) {
                continue;
            }
            let path = format!("{}.{index}.{}", list.name, column.name);
            tracing::trace!(path = %path, value = ?value, "computed cell write proposed");
            let write = Write::system(path, value);
            working.set(&write.path, write.value.clone(), SetOptions::system());
            writes.push(write);
        }
    }
}
