// crates/form-rules-core/src/compute/mod.rs
// ============================================================================
// Module: Compute Evaluator
// Description: Sandboxed evaluation of computed-field expressions.
// Purpose: Guard incomplete inputs, bind only declared dependencies, sanitize
//          non-finite results, and apply decimal rounding.
// Dependencies: bigdecimal, form-rules-logic, serde, serde_json, thiserror,
//               tracing
// ============================================================================

//! ## Overview
//! A computed field is one expression over the fields it declares. Evaluation
//! is a total function returning `Option<Value>`: `None` means "not computable
//! right now", whether because a dependency is not ready, the expression
//! failed, or the result was not a finite number. Callers must not treat
//! `None` as an error.
//!
//! Only declared dependencies are bound. An identifier that is not declared
//! fails evaluation even if the snapshot holds a value for it.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod interpreter;
mod lexer;
mod parser;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use bigdecimal::RoundingMode;
use form_rules_logic::Values;
use form_rules_logic::get_path;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub use parser::MAX_EXPRESSION_BYTES;
pub use parser::MAX_EXPRESSION_NESTING;

use crate::compute::interpreter::Dynamic;
use crate::compute::interpreter::Scope;
use crate::compute::interpreter::number_to_json;
use crate::compute::parser::Expr;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default tolerance for treating two computed numbers as unchanged.
pub const DEFAULT_CHANGE_EPSILON: f64 = 1e-4;

/// Names never inferred as dependencies: literals, globals, and keywords.
const RESERVED_NAMES: &[&str] = &[
    "true", "false", "null", "undefined", "NaN", "Infinity", "Math", "Number", "String",
    "Boolean", "Array", "Object", "Date", "JSON", "parseInt", "parseFloat", "isNaN", "isFinite",
    "if", "else", "return", "var", "let", "const", "function", "new", "typeof", "instanceof",
    "in", "of", "this", "while", "for", "do", "switch", "case", "break", "continue", "default",
    "throw", "try", "catch", "finally", "void", "delete",
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing or evaluating an expression.
///
/// # Invariants
/// - Never escapes [`evaluate`]; surfaced only by [`Expression::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// Input was empty or whitespace only.
    #[error("expression is empty")]
    EmptyInput,
    /// Input exceeded the size limit.
    #[error("expression exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    InputTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual input length in bytes.
        actual_bytes: usize,
    },
    /// Input exceeded the nesting limit.
    #[error("expression nesting exceeds limit of {max_depth} at {position}")]
    NestingTooDeep {
        /// Maximum allowed depth.
        max_depth: usize,
        /// Byte offset in the input.
        position: usize,
    },
    /// Unexpected token encountered during parsing.
    #[error("unexpected token `{found}` at {position}, expected {expected}")]
    UnexpectedToken {
        /// Human-friendly expectation summary.
        expected: &'static str,
        /// The token that was actually seen.
        found: String,
        /// Byte offset in the input.
        position: usize,
    },
    /// String literal missing its closing quote.
    #[error("unterminated string literal at {position}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },
    /// Numeric literal failed to parse.
    #[error("invalid number `{raw}` at {position}")]
    InvalidNumber {
        /// The raw numeric text.
        raw: String,
        /// Byte offset in the input.
        position: usize,
    },
    /// Call to anything other than a `Math` builtin.
    #[error("unknown function `{name}` at {position}")]
    UnknownFunction {
        /// The rejected callee.
        name: String,
        /// Byte offset in the input.
        position: usize,
    },
    /// Trailing input after a complete expression.
    #[error("unexpected trailing input at {position}")]
    TrailingInput {
        /// Byte offset where trailing input begins.
        position: usize,
    },
    /// Identifier not bound in the evaluation scope.
    #[error("`{name}` is not a declared dependency")]
    UnknownIdentifier {
        /// The unbound name.
        name: String,
    },
    /// Builtin called with the wrong number of arguments.
    #[error("{name} expects {expected} argument(s), got {found}")]
    Arity {
        /// Builtin name.
        name: &'static str,
        /// Expected argument count.
        expected: usize,
        /// Supplied argument count.
        found: usize,
    },
}

// ============================================================================
// SECTION: Rounding
// ============================================================================

/// Rounding applied when a precision is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundMode {
    /// Nearest, ties away from zero.
    #[default]
    Round,
    /// Toward positive infinity.
    Ceil,
    /// Toward negative infinity.
    Floor,
}

/// Rounds to `precision` decimal digits from the shortest decimal rendering.
///
/// Working from the rendered digits rather than scaling in binary keeps
/// `1.005` rounding to `1.01`.
#[must_use]
pub fn apply_precision(value: f64, precision: u32, mode: RoundMode) -> Option<f64> {
    let decimal = BigDecimal::from_str(&value.to_string()).ok()?;
    let rounding = match mode {
        RoundMode::Round => RoundingMode::HalfUp,
        RoundMode::Ceil => RoundingMode::Ceiling,
        RoundMode::Floor => RoundingMode::Floor,
    };
    decimal.with_scale_round(i64::from(precision), rounding).to_string().parse().ok()
}

// ============================================================================
// SECTION: Compiled Expressions
// ============================================================================

/// Parsed expression ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Original expression text.
    source: String,
    /// Parsed syntax tree.
    ast: Expr,
}

impl Expression {
    /// Parses expression text.
    ///
    /// # Errors
    /// Returns [`ExpressionError`] on lexical or syntax errors, or when size
    /// or nesting limits are exceeded.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            source: source.to_string(),
            ast: parser::parse_expression(source)?,
        })
    }

    /// Returns the original expression text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Parses and evaluates an expression in one step.
///
/// Returns `None` when a dependency is not ready, the expression fails to
/// parse or evaluate, or the result is a non-finite number.
#[must_use]
pub fn evaluate(
    expr: &str,
    values: &Values,
    dependencies: &[String],
    precision: Option<u32>,
    round_mode: RoundMode,
) -> Option<Value> {
    match Expression::parse(expr) {
        Ok(expression) => {
            evaluate_compiled(&expression, values, dependencies, precision, round_mode)
        }
        Err(err) => {
            tracing::debug!(expr, error = %err, "compute expression failed to parse");
            None
        }
    }
}

/// Evaluates a pre-parsed expression.
#[must_use]
pub fn evaluate_compiled(
    expression: &Expression,
    values: &Values,
    dependencies: &[String],
    precision: Option<u32>,
    round_mode: RoundMode,
) -> Option<Value> {
    if let Some(pending) =
        dependencies.iter().find(|name| !is_valid_compute_value(get_path(values, name)))
    {
        tracing::trace!(expr = expression.source(), dependency = %pending, "compute dependency not ready");
        return None;
    }

    let scope = bind_dependencies(values, dependencies);
    let result = match interpreter::eval(&expression.ast, &scope) {
        Ok(result) => result,
        Err(err) => {
            tracing::debug!(expr = expression.source(), error = %err, "compute expression failed");
            return None;
        }
    };

    let Dynamic::Number(number) = result else {
        return result.into_json();
    };
    if !number.is_finite() {
        tracing::debug!(expr = expression.source(), "compute result is not finite");
        return None;
    }
    let number = match precision {
        Some(precision) => apply_precision(number, precision, round_mode)?,
        None => number,
    };
    number_to_json(number)
}

/// Returns true when a dependency value may feed a computation.
///
/// Undefined, null, and blank strings are not ready. JSON numbers cannot
/// hold NaN, so every number is ready.
#[must_use]
pub fn is_valid_compute_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(_) => true,
    }
}

/// Parses strings that look like decimal numbers.
#[must_use]
pub fn numeric_string(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty()
        || !trimmed.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|number| number.is_finite())
}

/// Binds declared dependencies into an evaluation scope.
fn bind_dependencies(values: &Values, dependencies: &[String]) -> Scope {
    dependencies
        .iter()
        .map(|name| {
            let bound = match get_path(values, name) {
                None | Some(Value::Null) => Dynamic::Number(0.0),
                Some(Value::String(text)) => {
                    numeric_string(text).map_or_else(|| Dynamic::Str(text.clone()), Dynamic::Number)
                }
                Some(other) => Dynamic::from_json(other),
            };
            (name.clone(), bound)
        })
        .collect()
}

// ============================================================================
// SECTION: Dependency Inference
// ============================================================================

/// Infers the fields an expression reads.
///
/// Scans identifier tokens, skipping string literals, member names after a
/// `.`, digits-led tokens, and reserved names.
#[must_use]
pub fn extract_dependencies(expr: &str) -> BTreeSet<String> {
    let bytes = expr.as_bytes();
    let mut names = BTreeSet::new();
    let mut offset = 0;
    let mut after_dot = false;

    while let Some(&ch) = bytes.get(offset) {
        match ch {
            b'\'' | b'"' => {
                offset = skip_string(bytes, offset);
                after_dot = false;
            }
            b'a' ..= b'z' | b'A' ..= b'Z' | b'_' | b'$' => {
                let start = offset;
                while bytes.get(offset).is_some_and(|&b| is_ident_byte(b)) {
                    offset += 1;
                }
                let name = &expr[start .. offset];
                if !after_dot && !RESERVED_NAMES.contains(&name) {
                    names.insert(name.to_string());
                }
                after_dot = false;
            }
            b'0' ..= b'9' => {
                while bytes.get(offset).is_some_and(|&b| is_ident_byte(b) || b == b'.') {
                    offset += 1;
                }
                after_dot = false;
            }
            b'.' => {
                after_dot = true;
                offset += 1;
            }
            b' ' | b'\t' | b'\n' | b'\r' => offset += 1,
            _ => {
                after_dot = false;
                offset += 1;
            }
        }
    }
    names
}

/// Returns true for bytes that continue an identifier.
const fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Returns the offset just past a quoted string starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut offset = start + 1;
    while let Some(&b) = bytes.get(offset) {
        offset += 1;
        if b == b'\\' {
            offset += 1;
        } else if b == quote {
            break;
        }
    }
    offset
}

// ============================================================================
// SECTION: Change Detection
// ============================================================================

/// Returns true when `next` differs materially from `previous`.
///
/// Numbers within `epsilon` of each other are unchanged; all other values
/// compare structurally.
#[must_use]
pub fn has_material_change(previous: Option<&Value>, next: Option<&Value>, epsilon: f64) -> bool {
    match (previous.and_then(Value::as_f64), next.and_then(Value::as_f64)) {
        (Some(previous), Some(next)) => (previous - next).abs() > epsilon,
        _ => previous != next,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::RoundMode;
    use super::apply_precision;
    use super::numeric_string;

    #[test]
    fn precision_rounds_from_decimal_digits() {
        assert_eq!(apply_precision(1.005, 2, RoundMode::Round), Some(1.01));
        assert_eq!(apply_precision(12.3456, 2, RoundMode::Floor), Some(12.34));
        assert_eq!(apply_precision(12.341, 2, RoundMode::Ceil), Some(12.35));
        assert_eq!(apply_precision(-12.341, 2, RoundMode::Ceil), Some(-12.34));
        assert_eq!(apply_precision(-12.349, 2, RoundMode::Floor), Some(-12.35));
    }

    #[test]
    fn precision_zero_rounds_to_integers() {
        assert_eq!(apply_precision(2.5, 0, RoundMode::Round), Some(3.0));
        assert_eq!(apply_precision(2.4, 0, RoundMode::Round), Some(2.0));
    }

    #[test]
    fn numeric_strings_are_recognised() {
        assert_eq!(numeric_string(" 42 "), Some(42.0));
        assert_eq!(numeric_string("1.5e2"), Some(150.0));
        assert_eq!(numeric_string("inf"), None);
        assert_eq!(numeric_string("12px"), None);
        assert_eq!(numeric_string(""), None);
    }
}
