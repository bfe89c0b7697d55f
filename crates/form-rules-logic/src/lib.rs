// crates/form-rules-logic/src/lib.rs
// ============================================================================
// Module: Form Rules Logic Root
// Description: Public API surface for the condition subsystem.
// Purpose: Wire together condition, comparator, and value modules.
// Dependencies: crate::{comparator, condition, value}
// ============================================================================

//! ## Overview
//! `form-rules-logic` evaluates declarative field conditions against a value
//! snapshot and extracts the fields each condition reads. It is the leaf of
//! the form rules workspace and has no knowledge of schemas or components.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod comparator;
pub mod condition;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use comparator::Comparator;
pub use comparator::strict_equals;
pub use condition::Condition;
pub use condition::FieldCondition;
pub use condition::Predicate;
pub use condition::PredicateFn;
pub use condition::evaluate;
pub use condition::extract_dependencies;
pub use value::Values;
pub use value::get_path;
pub use value::is_empty_value;

// ============================================================================
// SECTION: Convenience DSL
// ============================================================================

/// Convenience functions for building conditions in code.
pub mod convenience {
    use serde_json::Value;

    use super::Comparator;
    use super::Condition;

    /// Requires all of the given conditions.
    #[must_use]
    pub fn all(conditions: Vec<Condition>) -> Condition {
        Condition::all(conditions)
    }

    /// Requires any of the given conditions.
    #[must_use]
    pub fn any(conditions: Vec<Condition>) -> Condition {
        Condition::any(conditions)
    }

    /// Inverts a condition.
    #[must_use]
    pub fn not(condition: Condition) -> Condition {
        Condition::negate(condition)
    }

    /// Field equals the operand.
    pub fn eq(field: impl Into<String>, operand: impl Into<Value>) -> Condition {
        Condition::field(field, Comparator::Equals, operand.into())
    }

    /// Field differs from the operand.
    pub fn neq(field: impl Into<String>, operand: impl Into<Value>) -> Condition {
        Condition::field(field, Comparator::NotEquals, operand.into())
    }

    /// Field is one of the listed values.
    pub fn one_of(field: impl Into<String>, options: Vec<Value>) -> Condition {
        Condition::field(field, Comparator::InSet, Value::Array(options))
    }

    /// Field is empty.
    pub fn is_empty(field: impl Into<String>) -> Condition {
        Condition::field(field, Comparator::IsEmpty, Value::Bool(true))
    }

    /// Field is not empty.
    pub fn is_not_empty(field: impl Into<String>) -> Condition {
        Condition::field(field, Comparator::IsNotEmpty, Value::Bool(true))
    }
}
