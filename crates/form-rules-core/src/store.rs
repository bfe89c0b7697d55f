// crates/form-rules-core/src/store.rs
// ============================================================================
// Module: Host Store Seam
// Description: Write proposals and the interface for applying them.
// Purpose: Let hosts apply engine writes without corrupting dirty tracking.
// Dependencies: form-rules-logic, serde_json
// ============================================================================

//! ## Overview
//! The engine never mutates host state. It returns [`Write`] proposals that
//! the host applies through [`FormStore`]. Engine-originated writes carry
//! [`SetOptions::system`] so they do not mark fields dirty or touched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use form_rules_logic::Values;
use form_rules_logic::get_path;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Write Proposals
// ============================================================================

/// How a host should treat a value write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// Mark the field dirty.
    pub should_dirty: bool,
    /// Mark the field touched.
    pub should_touch: bool,
    /// Revalidate after writing.
    pub should_validate: bool,
}

impl SetOptions {
    /// Options for a write caused by user input.
    #[must_use]
    pub const fn user() -> Self {
        Self {
            should_dirty: true,
            should_touch: true,
            should_validate: true,
        }
    }

    /// Options for a computed or auto-clear write.
    #[must_use]
    pub const fn system() -> Self {
        Self {
            should_dirty: false,
            should_touch: false,
            should_validate: false,
        }
    }
}

/// Proposed value change.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    /// Dot-path of the target field.
    pub path: String,
    /// New value; `None` clears the field.
    pub value: Option<Value>,
    /// Write options.
    pub options: SetOptions,
}

impl Write {
    /// Creates a system-mode write.
    pub fn system(path: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            path: path.into(),
            value,
            options: SetOptions::system(),
        }
    }
}

// ============================================================================
// SECTION: Store Interface
// ============================================================================

/// Host form-state container.
pub trait FormStore {
    /// Reads the value at a dot-path.
    fn get(&self, path: &str) -> Option<Value>;

    /// Writes or clears the value at a dot-path.
    fn set(&mut self, path: &str, value: Option<Value>, options: SetOptions);
}

/// Applies writes in order.
pub fn apply_writes<S>(store: &mut S, writes: &[Write])
where
    S: FormStore + ?Sized,
{
    for write in writes {
        store.set(&write.path, write.value.clone(), write.options);
    }
}

impl FormStore for Values {
    fn get(&self, path: &str) -> Option<Value> {
        get_path(self, path).cloned()
    }

    /// Flat keys are written in place. Other dotted paths descend through
    /// objects and existing array rows, creating objects as needed.
    fn set(&mut self, path: &str, value: Option<Value>, _options: SetOptions) {
        if !path.contains('.') || self.contains_key(path) {
            match value {
                Some(value) => {
                    self.insert(path.to_string(), value);
                }
                None => {
                    self.remove(path);
                }
            }
            return;
        }
        let segments: Vec<&str> = path.split('.').collect();
        set_nested(self, &segments, value);
    }
}

/// Writes through an object.
fn set_nested(map: &mut Map<String, Value>, segments: &[&str], value: Option<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        match value {
            Some(value) => {
                map.insert((*head).to_string(), value);
            }
            None => {
                map.remove(*head);
            }
        }
        return;
    }
    let slot = map.entry((*head).to_string()).or_insert_with(|| Value::Object(Map::new()));
    if !matches!(slot, Value::Object(_) | Value::Array(_)) {
        *slot = Value::Object(Map::new());
    }
    set_in_value(slot, rest, value);
}

/// Writes through an object or array node.
fn set_in_value(node: &mut Value, segments: &[&str], value: Option<Value>) {
    match node {
        Value::Object(map) => set_nested(map, segments, value),
        Value::Array(items) => {
            let Some((head, rest)) = segments.split_first() else {
                return;
            };
            let Some(item) = head.parse::<usize>().ok().and_then(|index| items.get_mut(index))
            else {
                return;
            };
            if rest.is_empty() {
                *item = value.unwrap_or(Value::Null);
            } else {
                if !matches!(item, Value::Object(_) | Value::Array(_)) {
                    *item = Value::Object(Map::new());
                }
                set_in_value(item, rest, value);
            }
        }
        _ => {}
    }
}
