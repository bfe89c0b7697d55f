// crates/form-rules-core/src/compute/interpreter.rs
// ============================================================================
// Module: Compute Expression Interpreter
// Description: Tree-walking evaluator for compute expressions.
// Purpose: Evaluate a parsed expression against a closed set of bound inputs.
// Dependencies: crate::compute::{parser, ExpressionError}, serde_json
// ============================================================================

//! ## Overview
//! Values follow JavaScript-style dynamic semantics so schemas written for the
//! form library keep their meaning: `+` concatenates when either side is a
//! string, `&&`/`||` return an operand, and arithmetic coerces through
//! `to_number`. Equality is always strict. Identifiers resolve only against
//! the bound inputs; anything else is an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Number;
use serde_json::Value;

use crate::compute::ExpressionError;
use crate::compute::parser::BinaryOp;
use crate::compute::parser::Expr;
use crate::compute::parser::Literal;
use crate::compute::parser::LogicalOp;
use crate::compute::parser::MathFn;
use crate::compute::parser::UnaryOp;

/// Largest integer magnitude that round-trips exactly through `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// ============================================================================
// SECTION: Runtime Values
// ============================================================================

/// Dynamic value produced while evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Dynamic {
    /// IEEE-754 number, possibly non-finite.
    Number(f64),
    /// String value.
    Str(String),
    /// Boolean value.
    Bool(bool),
    /// `null` / `undefined`.
    Null,
    /// Array or object passed through from the inputs.
    Json(Value),
}

impl Dynamic {
    /// Converts a JSON input into a dynamic value.
    pub(crate) fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => number.as_f64().map_or(Self::Null, Self::Number),
            Value::String(text) => Self::Str(text.clone()),
            Value::Array(_) | Value::Object(_) => Self::Json(value.clone()),
        }
    }

    /// Converts the result back to JSON; non-finite numbers and null map to `None`.
    pub(crate) fn into_json(self) -> Option<Value> {
        match self {
            Self::Number(number) => number_to_json(number),
            Self::Str(text) => Some(Value::String(text)),
            Self::Bool(flag) => Some(Value::Bool(flag)),
            Self::Null => None,
            Self::Json(value) => Some(value),
        }
    }

    /// JavaScript-style numeric conversion.
    fn to_number(&self) -> f64 {
        match self {
            Self::Number(number) => *number,
            Self::Bool(flag) => f64::from(u8::from(*flag)),
            Self::Null => 0.0,
            Self::Str(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() { 0.0 } else { trimmed.parse().unwrap_or(f64::NAN) }
            }
            Self::Json(_) => f64::NAN,
        }
    }

    /// JavaScript-style truthiness.
    fn truthy(&self) -> bool {
        match self {
            Self::Number(number) => *number != 0.0 && !number.is_nan(),
            Self::Str(text) => !text.is_empty(),
            Self::Bool(flag) => *flag,
            Self::Null => false,
            Self::Json(_) => true,
        }
    }

    /// String rendering used by concatenation.
    fn render(&self) -> String {
        match self {
            Self::Number(number) if number.is_nan() => "NaN".to_string(),
            Self::Number(number) if number.is_infinite() => {
                let text = if number.is_sign_positive() { "Infinity" } else { "-Infinity" };
                text.to_string()
            }
            Self::Number(number) => number.to_string(),
            Self::Str(text) => text.clone(),
            Self::Bool(flag) => flag.to_string(),
            Self::Null => "null".to_string(),
            Self::Json(value) => value.to_string(),
        }
    }

    /// Strict equality; numbers compare by value.
    fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(left), Self::Number(right)) => left == right,
            _ => self == other,
        }
    }
}

/// Encodes a finite number as JSON, preferring integers when exact.
pub(crate) fn number_to_json(number: f64) -> Option<Value> {
    if !number.is_finite() {
        return None;
    }
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        // Exact: the magnitude fits in 53 bits.
        #[allow(clippy::cast_possible_truncation, reason = "bounded by MAX_SAFE_INTEGER")]
        let integer = number as i64;
        return Some(Value::Number(Number::from(integer)));
    }
    Number::from_f64(number).map(Value::Number)
}

// ============================================================================
// SECTION: Scope
// ============================================================================

/// Closed set of named inputs visible to an expression.
pub(crate) type Scope = BTreeMap<String, Dynamic>;

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates an expression against the scope.
pub(crate) fn eval(expr: &Expr, scope: &Scope) -> Result<Dynamic, ExpressionError> {
    match expr {
        Expr::Literal(literal) => Ok(match literal {
            Literal::Number(number) => Dynamic::Number(*number),
            Literal::Str(text) => Dynamic::Str(text.clone()),
            Literal::Bool(flag) => Dynamic::Bool(*flag),
            Literal::Null => Dynamic::Null,
        }),
        Expr::Ident(name) => scope.get(name).cloned().ok_or_else(|| {
            ExpressionError::UnknownIdentifier {
                name: name.clone(),
            }
        }),
        Expr::Member(object, property) => {
            if let Some(value) = expr.dotted_path().and_then(|path| scope.get(&path)) {
                return Ok(value.clone());
            }
            let target = eval(object, scope)?;
            Ok(member(&target, property))
        }
        Expr::Call(function, args) => {
            let numbers = args
                .iter()
                .map(|arg| eval(arg, scope).map(|value| value.to_number()))
                .collect::<Result<Vec<_>, _>>()?;
            call_math(*function, &numbers)
        }
        Expr::Unary(op, operand) => {
            let value = eval(operand, scope)?;
            Ok(match op {
                UnaryOp::Not => Dynamic::Bool(!value.truthy()),
                UnaryOp::Negate => Dynamic::Number(-value.to_number()),
                UnaryOp::Plus => Dynamic::Number(value.to_number()),
            })
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, scope)?;
            let right = eval(right, scope)?;
            Ok(binary(*op, &left, &right))
        }
        Expr::Logical(op, left, right) => {
            let left = eval(left, scope)?;
            match (op, left.truthy()) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                _ => eval(right, scope),
            }
        }
        Expr::Conditional(condition, consequent, alternate) => {
            if eval(condition, scope)?.truthy() {
                eval(consequent, scope)
            } else {
                eval(alternate, scope)
            }
        }
    }
}

/// Property access; missing properties read as null.
fn member(target: &Dynamic, property: &str) -> Dynamic {
    match (target, property) {
        (Dynamic::Str(text), "length") => Dynamic::Number(usize_to_f64(text.chars().count())),
        (Dynamic::Json(Value::Array(items)), "length") => {
            Dynamic::Number(usize_to_f64(items.len()))
        }
        (Dynamic::Json(Value::Array(items)), index) => index
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index))
            .map_or(Dynamic::Null, Dynamic::from_json),
        (Dynamic::Json(Value::Object(map)), key) => {
            map.get(key).map_or(Dynamic::Null, Dynamic::from_json)
        }
        _ => Dynamic::Null,
    }
}

/// Converts a length into a number.
fn usize_to_f64(length: usize) -> f64 {
    u32::try_from(length).map_or(f64::INFINITY, f64::from)
}

/// Applies a non-short-circuit binary operator.
fn binary(op: BinaryOp, left: &Dynamic, right: &Dynamic) -> Dynamic {
    match op {
        BinaryOp::Add => {
            if matches!(left, Dynamic::Str(_)) || matches!(right, Dynamic::Str(_)) {
                Dynamic::Str(format!("{}{}", left.render(), right.render()))
            } else {
                Dynamic::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Dynamic::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Dynamic::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Dynamic::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Dynamic::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Dynamic::Bool(left.strict_eq(right)),
        BinaryOp::Ne => Dynamic::Bool(!left.strict_eq(right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Dynamic::Str(left), Dynamic::Str(right)) => Some(left.cmp(right)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            Dynamic::Bool(ordering.is_some_and(|ordering| match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
    }
}

/// Invokes a `Math` builtin.
fn call_math(function: MathFn, args: &[f64]) -> Result<Dynamic, ExpressionError> {
    let unary = |apply: fn(f64) -> f64, name: &'static str| match args {
        [value] => Ok(Dynamic::Number(apply(*value))),
        _ => Err(ExpressionError::Arity {
            name,
            expected: 1,
            found: args.len(),
        }),
    };
    match function {
        MathFn::Abs => unary(f64::abs, "Math.abs"),
        MathFn::Ceil => unary(f64::ceil, "Math.ceil"),
        MathFn::Floor => unary(f64::floor, "Math.floor"),
        MathFn::Round => unary(|value| (value + 0.5).floor(), "Math.round"),
        MathFn::Sqrt => unary(f64::sqrt, "Math.sqrt"),
        MathFn::Trunc => unary(f64::trunc, "Math.trunc"),
        MathFn::Sign => unary(
            |value| if value.is_nan() || value == 0.0 { value } else { value.signum() },
            "Math.sign",
        ),
        MathFn::Max => Ok(Dynamic::Number(fold_extreme(args, f64::NEG_INFINITY, f64::max))),
        MathFn::Min => Ok(Dynamic::Number(fold_extreme(args, f64::INFINITY, f64::min))),
        MathFn::Pow => match args {
            [base, exponent] => Ok(Dynamic::Number(base.powf(*exponent))),
            _ => Err(ExpressionError::Arity {
                name: "Math.pow",
                expected: 2,
                found: args.len(),
            }),
        },
    }
}

/// Folds `Math.max`/`Math.min` with NaN propagation.
fn fold_extreme(args: &[f64], initial: f64, pick: fn(f64, f64) -> f64) -> f64 {
    if args.iter().any(|value| value.is_nan()) {
        return f64::NAN;
    }
    args.iter().copied().fold(initial, pick)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
