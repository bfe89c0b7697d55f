// crates/form-rules-core/tests/compute.rs
// ============================================================================
// Module: Compute Evaluator Tests
// Description: Guards, coercion, rounding, and dependency inference.
// Purpose: Pin the sandboxed expression contract.
// ============================================================================

//! Compute evaluator tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;

use form_rules_core::Expression;
use form_rules_core::ExpressionError;
use form_rules_core::RoundMode;
use form_rules_core::Values;
use form_rules_core::compute::evaluate;
use form_rules_core::compute::extract_dependencies;
use form_rules_core::compute::is_valid_compute_value;
use form_rules_core::evaluate_compiled;
use form_rules_core::has_material_change;
use serde_json::Value;
use serde_json::json;

type TestResult = Result<(), String>;

fn values(value: Value) -> Values {
    match value {
        Value::Object(map) => map,
        _ => Values::new(),
    }
}

fn deps(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn eval(expr: &str, snapshot: Value, names: &[&str]) -> Option<Value> {
    evaluate(expr, &values(snapshot), &deps(names), None, RoundMode::Round)
}

fn expect_eq(actual: Option<Value>, expected: Option<Value>, context: &str) -> TestResult {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{context}: expected {expected:?}, got {actual:?}"))
    }
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(ToString::to_string).collect()
}

#[test]
fn multiplies_declared_dependencies() -> TestResult {
    expect_eq(
        eval("price * quantity", json!({"price": 50, "quantity": 3}), &["price", "quantity"]),
        Some(json!(150)),
        "price * quantity",
    )
}

#[test]
fn missing_dependency_short_circuits() -> TestResult {
    expect_eq(
        eval("price * quantity", json!({"price": 10}), &["price", "quantity"]),
        None,
        "missing quantity",
    )?;
    expect_eq(
        eval("price * quantity", json!({"price": 10, "quantity": null}), &["price", "quantity"]),
        None,
        "null quantity",
    )?;
    expect_eq(
        eval("price * quantity", json!({"price": 10, "quantity": "  "}), &["price", "quantity"]),
        None,
        "blank quantity",
    )
}

#[test]
fn readiness_matches_compute_value_rules() -> TestResult {
    let cases = [
        (None, false),
        (Some(json!(null)), false),
        (Some(json!("")), false),
        (Some(json!(" \t")), false),
        (Some(json!(0)), true),
        (Some(json!(false)), true),
        (Some(json!([])), true),
        (Some(json!("x")), true),
    ];
    for (value, expected) in cases {
        if is_valid_compute_value(value.as_ref()) != expected {
            return Err(format!("{value:?} readiness should be {expected}"));
        }
    }
    Ok(())
}

#[test]
fn rounds_with_each_mode() -> TestResult {
    let snapshot = values(json!({"a": 12.3456}));
    let a = deps(&["a"]);
    expect_eq(
        evaluate("a", &snapshot, &a, Some(2), RoundMode::Round),
        Some(json!(12.35)),
        "round",
    )?;
    expect_eq(
        evaluate("a", &snapshot, &a, Some(2), RoundMode::Floor),
        Some(json!(12.34)),
        "floor",
    )?;
    expect_eq(evaluate("a", &snapshot, &a, Some(2), RoundMode::Ceil), Some(json!(12.35)), "ceil")
}

#[test]
fn rounding_avoids_binary_drift() -> TestResult {
    expect_eq(
        evaluate("a * 1", &values(json!({"a": 1.005})), &deps(&["a"]), Some(2), RoundMode::Round),
        Some(json!(1.01)),
        "1.005 half-up",
    )?;
    expect_eq(
        evaluate("a + b", &values(json!({"a": 0.1, "b": 0.2})), &deps(&["a", "b"]), Some(2), RoundMode::Round),
        Some(json!(0.3)),
        "0.1 + 0.2",
    )
}

#[test]
fn non_finite_results_are_dropped() -> TestResult {
    expect_eq(eval("a / b", json!({"a": 1, "b": 0}), &["a", "b"]), None, "1 / 0")?;
    expect_eq(eval("a / b", json!({"a": 0, "b": 0}), &["a", "b"]), None, "0 / 0")?;
    expect_eq(eval("Math.sqrt(a)", json!({"a": -1}), &["a"]), None, "sqrt(-1)")
}

#[test]
fn numeric_strings_are_coerced() -> TestResult {
    expect_eq(eval("a * b", json!({"a": "2.5", "b": 4}), &["a", "b"]), Some(json!(10)), "coerce")?;
    expect_eq(
        eval("first + ' ' + last", json!({"first": "Ada", "last": "Lovelace"}), &["first", "last"]),
        Some(json!("Ada Lovelace")),
        "concatenation",
    )
}

#[test]
fn undeclared_identifiers_are_not_visible() -> TestResult {
    expect_eq(eval("a + secret", json!({"a": 1, "secret": 2}), &["a"]), None, "sandbox")
}

#[test]
fn supports_comparisons_logic_and_ternaries() -> TestResult {
    let snapshot = json!({"age": 20, "member": true});
    expect_eq(
        eval("age >= 18 && member ? 'adult member' : 'other'", snapshot.clone(), &["age", "member"]),
        Some(json!("adult member")),
        "ternary",
    )?;
    expect_eq(eval("age === 20", snapshot.clone(), &["age"]), Some(json!(true)), "strict equality")?;
    expect_eq(eval("!member || age < 3", snapshot, &["age", "member"]), Some(json!(false)), "logic")
}

#[test]
fn math_builtins_are_available() -> TestResult {
    expect_eq(
        eval("Math.max(a, b, 3) + Math.round(c) + Math.PI * 0", json!({"a": 1, "b": 7, "c": 2.5}), &["a", "b", "c"]),
        Some(json!(10)),
        "max + round",
    )?;
    expect_eq(eval("Math.pow(a, 2) % 5", json!({"a": 3}), &["a"]), Some(json!(4)), "pow and rem")
}

#[test]
fn member_access_reads_bound_objects() -> TestResult {
    expect_eq(
        eval("order.qty * 2", json!({"order": {"qty": 4}}), &["order"]),
        Some(json!(8)),
        "member access",
    )
}

#[test]
fn parse_errors_surface_from_expression_parse() -> TestResult {
    match Expression::parse("price * ") {
        Err(ExpressionError::UnexpectedToken { .. }) => {}
        other => return Err(format!("expected unexpected-token error, got {other:?}")),
    }
    match Expression::parse("alert(1)") {
        Err(ExpressionError::UnknownFunction { .. }) => {}
        other => return Err(format!("expected unknown-function error, got {other:?}")),
    }
    expect_eq(eval("price * ", json!({"price": 1}), &["price"]), None, "parse failure")
}

#[test]
fn long_operator_chains_evaluate_to_undefined() -> TestResult {
    let chain = format!("a{}", "+a".repeat(1_000));
    match Expression::parse(&chain) {
        Err(ExpressionError::NestingTooDeep { .. }) => {}
        other => return Err(format!("expected nesting error, got {other:?}")),
    }
    expect_eq(eval(&chain, json!({"a": 1}), &["a"]), None, "1000-operator chain")?;
    let members = format!("a{}", ".b".repeat(1_000));
    expect_eq(eval(&members, json!({"a": {}}), &["a"]), None, "1000-member chain")?;
    expect_eq(eval("a + a + a + a", json!({"a": 1}), &["a"]), Some(json!(4)), "short chain")
}

#[test]
fn compiled_expressions_are_reusable() -> TestResult {
    let expression = Expression::parse("a + 1").map_err(|err| err.to_string())?;
    let a = deps(&["a"]);
    for n in 0 .. 3 {
        expect_eq(
            evaluate_compiled(&expression, &values(json!({"a": n})), &a, None, RoundMode::Round),
            Some(json!(n + 1)),
            "reuse",
        )?;
    }
    Ok(())
}

#[test]
fn infers_identifiers_from_expressions() -> TestResult {
    let cases = [
        ("price * quantity + tax", names(&["price", "quantity", "tax"])),
        ("Math.max(a, b)", names(&["a", "b"])),
        ("flag ? 'yes' : \"no\"", names(&["flag"])),
        ("order.total > 1e3 && true", names(&["order"])),
        ("undefined == x || null", names(&["x"])),
    ];
    for (expr, expected) in cases {
        let actual = extract_dependencies(expr);
        if actual != expected {
            return Err(format!("{expr}: expected {expected:?}, got {actual:?}"));
        }
    }
    Ok(())
}

#[test]
fn material_change_tolerates_jitter() -> TestResult {
    let checks = [
        (has_material_change(Some(&json!(1.0)), Some(&json!(1.00005)), 1e-4), false),
        (has_material_change(Some(&json!(1)), Some(&json!(2)), 1e-4), true),
        (has_material_change(None, Some(&json!(0)), 1e-4), true),
        (has_material_change(Some(&json!(0)), None, 1e-4), true),
        (has_material_change(None, None, 1e-4), false),
        (has_material_change(Some(&json!("a")), Some(&json!("a")), 1e-4), false),
        (has_material_change(Some(&json!("1")), Some(&json!(1)), 1e-4), true),
    ];
    for (index, (actual, expected)) in checks.into_iter().enumerate() {
        if actual != expected {
            return Err(format!("check {index}: expected {expected}"));
        }
    }
    Ok(())
}
