// crates/form-rules-logic/src/comparator.rs
// ============================================================================
// Module: Field Comparators
// Description: Comparator vocabulary and evaluation for field conditions.
// Purpose: Turn a resolved field value and a literal operand into a boolean.
// Dependencies: bigdecimal, serde_json
// ============================================================================

//! ## Overview
//! Comparators are total: a value that does not fit the comparator (for
//! example a string under `gt`) yields `false` instead of an error. Equality
//! is strict with no type coercion, so `0` never matches `false`. Numbers are
//! compared decimal-aware so `1` and `1.0` are equal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde_json::Number;
use serde_json::Value;

use crate::value::is_empty_value;

// ============================================================================
// SECTION: Comparator
// ============================================================================

/// Operators available to a single-field condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// Strict equality (`eq`).
    Equals,
    /// Strict inequality (`neq`).
    NotEquals,
    /// Numeric `>` (`gt`).
    GreaterThan,
    /// Numeric `>=` (`gte`).
    GreaterThanOrEqual,
    /// Numeric `<` (`lt`).
    LessThan,
    /// Numeric `<=` (`lte`).
    LessThanOrEqual,
    /// Membership in a literal array (`in`).
    InSet,
    /// Non-membership in a literal array (`notIn`).
    NotInSet,
    /// Value is undefined, null, blank, or an empty array (`isEmpty`).
    IsEmpty,
    /// Negation of [`Comparator::IsEmpty`] (`isNotEmpty`).
    IsNotEmpty,
}

impl Comparator {
    /// Every comparator in the order used when reading condition objects.
    pub const ALL: [Self; 10] = [
        Self::Equals,
        Self::NotEquals,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::InSet,
        Self::NotInSet,
        Self::IsEmpty,
        Self::IsNotEmpty,
    ];

    /// Returns the JSON key naming this comparator.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Equals => "eq",
            Self::NotEquals => "neq",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "gte",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "lte",
            Self::InSet => "in",
            Self::NotInSet => "notIn",
            Self::IsEmpty => "isEmpty",
            Self::IsNotEmpty => "isNotEmpty",
        }
    }

    /// Looks up a comparator by its JSON key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|comparator| comparator.key() == key)
    }

    /// Applies the comparator to a resolved field value.
    ///
    /// `actual` is `None` when the field is undefined in the snapshot.
    #[must_use]
    pub fn apply(self, actual: Option<&Value>, operand: &Value) -> bool {
        match self {
            Self::IsEmpty => is_empty_value(actual) == operand.as_bool().unwrap_or(true),
            Self::IsNotEmpty => is_empty_value(actual) != operand.as_bool().unwrap_or(true),
            Self::Equals => actual.is_some_and(|value| strict_equals(value, operand)),
            Self::NotEquals => !actual.is_some_and(|value| strict_equals(value, operand)),
            Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => {
                let Some(ordering) = actual.and_then(|value| numeric_cmp(value, operand)) else {
                    return false;
                };
                match self {
                    Self::GreaterThan => ordering.is_gt(),
                    Self::GreaterThanOrEqual => ordering.is_ge(),
                    Self::LessThan => ordering.is_lt(),
                    _ => ordering.is_le(),
                }
            }
            Self::InSet => in_set(actual, operand).unwrap_or(false),
            Self::NotInSet => in_set(actual, operand).is_some_and(|found| !found),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Strict equality with decimal-aware number handling.
#[must_use]
pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            match (decimal_from_number(left), decimal_from_number(right)) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            }
        }
        _ => left == right,
    }
}

/// Membership check; `None` when the operand is not an array.
fn in_set(actual: Option<&Value>, operand: &Value) -> Option<bool> {
    let Value::Array(candidates) = operand else {
        return None;
    };
    Some(actual.is_some_and(|value| {
        candidates.iter().any(|candidate| strict_equals(value, candidate))
    }))
}

/// Orders two JSON numbers; non-numbers are unordered.
fn numeric_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    let left = decimal_from_number(left.as_number()?)?;
    let right = decimal_from_number(right.as_number()?)?;
    Some(left.cmp(&right))
}

/// Parses a JSON number into `BigDecimal` with a stable string representation.
fn decimal_from_number(number: &Number) -> Option<BigDecimal> {
    BigDecimal::from_str(&number.to_string()).ok()
}
