// crates/form-rules-core/tests/validation.rs
// ============================================================================
// Module: Validation Builder Tests
// Description: Category validators, conditional requiredness, and messages.
// Purpose: Ensure validators track the snapshot they were built from.
// ============================================================================

//! Validation builder tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;
use std::io;

use form_rules_core::CustomVerdict;
use form_rules_core::FieldSchema;
use form_rules_core::FormSchema;
use form_rules_core::ParsedSchema;
use form_rules_core::Rule;
use form_rules_core::ValidationOutcome;
use form_rules_core::Values;
use form_rules_core::build;
use form_rules_core::parse;
use form_rules_core::validate;
use serde_json::Value;
use serde_json::json;

type TestResult = Result<(), String>;

fn values(value: Value) -> Values {
    match value {
        Value::Object(map) => map,
        _ => Values::new(),
    }
}

fn parsed(value: Value) -> Result<ParsedSchema, String> {
    let schema = FormSchema::from_json(value).map_err(|err| err.to_string())?;
    parse(&schema).map_err(|err| err.to_string())
}

fn errors(parsed: &ParsedSchema, snapshot: Value) -> BTreeMap<String, String> {
    validate(parsed, &values(snapshot)).errors()
}

fn expect_errors(actual: &BTreeMap<String, String>, expected: &[(&str, &str)]) -> TestResult {
    let expected: BTreeMap<String, String> = expected
        .iter()
        .map(|(path, message)| ((*path).to_string(), (*message).to_string()))
        .collect();
    if *actual == expected { Ok(()) } else { Err(format!("expected {expected:?}, got {actual:?}")) }
}

#[test]
fn required_boolean_must_be_true() -> TestResult {
    let parsed = parsed(json!({
        "fields": [{"name": "agree", "component": "checkbox", "rules": [{"type": "required"}]}]
    }))?;
    expect_errors(&errors(&parsed, json!({"agree": false})), &[("agree", "agree is required")])?;
    expect_errors(&errors(&parsed, json!({})), &[("agree", "agree is required")])?;
    expect_errors(&errors(&parsed, json!({"agree": true})), &[])
}

#[test]
fn invisible_fields_are_exempt() -> TestResult {
    let parsed = parsed(json!({
        "fields": [
            {"name": "hasPet", "component": "switch"},
            {
                "name": "petName",
                "component": "input",
                "visibleWhen": {"field": "hasPet", "eq": true},
                "rules": [{"type": "required"}]
            },
            {"name": "secret", "component": "input", "hidden": true, "rules": [{"type": "required"}]}
        ]
    }))?;
    expect_errors(&errors(&parsed, json!({"hasPet": false})), &[])?;
    expect_errors(&errors(&parsed, json!({"hasPet": true})), &[("petName", "petName is required")])
}

#[test]
fn conditional_requiredness_tracks_values() -> TestResult {
    let parsed = parsed(json!({
        "fields": [
            {"name": "accountType", "component": "radio"},
            {
                "name": "taxId",
                "label": "Tax ID",
                "component": "input",
                "requiredWhen": {"field": "accountType", "eq": "business"}
            }
        ]
    }))?;
    expect_errors(&errors(&parsed, json!({"accountType": "personal"})), &[])?;
    expect_errors(
        &errors(&parsed, json!({"accountType": "business"})),
        &[("taxId", "Tax ID is required")],
    )?;
    expect_errors(&errors(&parsed, json!({"accountType": "business", "taxId": "NO123"})), &[])
}

#[test]
fn validator_keeps_build_time_requiredness() -> TestResult {
    let parsed = parsed(json!({
        "fields": [
            {"name": "mode", "component": "radio"},
            {"name": "detail", "component": "input", "requiredWhen": {"field": "mode", "eq": "full"}}
        ]
    }))?;
    let validator = build(&parsed, &values(json!({"mode": "short"})));
    let outcome = validator.run(&values(json!({"mode": "full"})));
    if !outcome.is_valid() {
        return Err("requiredness is fixed when the validator is built".to_string());
    }
    Ok(())
}

#[test]
fn text_rules_apply_only_to_present_values() -> TestResult {
    let parsed = parsed(json!({
        "fields": [
            {"name": "nick", "label": "Nickname", "component": "input", "rules": [
                {"type": "minLength", "value": 3},
                {"type": "maxLength", "value": 5},
                {"type": "pattern", "value": "/^[a-z]+$/i", "message": "letters only"}
            ]},
            {"name": "email", "component": "email", "rules": [{"type": "email"}]},
            {"name": "site", "component": "url", "rules": [{"type": "url"}]}
        ]
    }))?;
    expect_errors(&errors(&parsed, json!({"nick": ""})), &[])?;
    expect_errors(
        &errors(&parsed, json!({"nick": "ab", "email": "nope", "site": "example"})),
        &[
            ("email", "email must be a valid email address"),
            ("nick", "Nickname must be at least 3 characters"),
            ("site", "site must be a valid URL"),
        ],
    )?;
    expect_errors(&errors(&parsed, json!({"nick": "abcdef"})), &[(
        "nick",
        "Nickname must be at most 5 characters",
    )])?;
    expect_errors(&errors(&parsed, json!({"nick": "AB12"})), &[("nick", "letters only")])?;
    expect_errors(
        &errors(&parsed, json!({"nick": "Abc", "email": "a@b.co", "site": "https://x.io/a"})),
        &[],
    )
}

#[test]
fn text_fields_reject_non_string_values() -> TestResult {
    let parsed = parsed(json!({
        "fields": [
            {"name": "name", "label": "Name", "component": "input", "rules": [{"type": "minLength", "value": 1}]},
            {"name": "note", "component": "textarea"}
        ]
    }))?;
    expect_errors(&errors(&parsed, json!({"name": 42, "note": true})), &[
        ("name", "Name must be text"),
        ("note", "note must be text"),
    ])?;
    expect_errors(&errors(&parsed, json!({"name": "42", "note": null})), &[])
}

#[test]
fn numeric_fields_coerce_and_bound() -> TestResult {
    let parsed = parsed(json!({
        "fields": [{"name": "age", "label": "Age", "component": "number", "rules": [
            {"type": "required"},
            {"type": "min", "value": 18},
            {"type": "max", "value": 130}
        ]}]
    }))?;
    expect_errors(&errors(&parsed, json!({"age": "21"})), &[])?;
    expect_errors(&errors(&parsed, json!({"age": ""})), &[("age", "Age is required")])?;
    expect_errors(&errors(&parsed, json!({"age": "abc"})), &[("age", "Age must be a number")])?;
    expect_errors(&errors(&parsed, json!({"age": 12})), &[("age", "Age must be at least 18")])?;
    expect_errors(&errors(&parsed, json!({"age": 200})), &[("age", "Age must be at most 130")])
}

#[test]
fn enumerated_requiredness_depends_on_multiplicity() -> TestResult {
    let parsed = parsed(json!({
        "fields": [
            {"name": "tags", "component": "select", "multiple": true, "rules": [{"type": "required"}]},
            {"name": "size", "component": "select", "rules": [{"type": "required"}]}
        ]
    }))?;
    expect_errors(
        &errors(&parsed, json!({"tags": [], "size": ""})),
        &[("size", "size is required"), ("tags", "tags is required")],
    )?;
    expect_errors(&errors(&parsed, json!({"tags": ["a"], "size": 0})), &[])
}

#[test]
fn list_rows_are_validated_at_flattened_paths() -> TestResult {
    let parsed = parsed(json!({
        "fields": [
            {"name": "currency", "component": "select"},
            {"name": "items", "label": "Items", "component": "list", "minItems": 1, "maxItems": 3, "columns": [
                {"name": "sku", "component": "input", "rules": [{"type": "required"}]},
                {"name": "pricing", "component": "group", "columns": [
                    {"name": "qty", "component": "number", "rules": [{"type": "min", "value": 1}]},
                    {
                        "name": "rate",
                        "component": "number",
                        "requiredWhen": {"field": "currency", "eq": "EUR"}
                    }
                ]}
            ]}
        ]
    }))?;
    expect_errors(
        &errors(&parsed, json!({
            "currency": "EUR",
            "items": [{"sku": "A", "qty": 2, "rate": 3}, {"sku": "", "qty": 0}]
        })),
        &[
            ("items.1.qty", "qty must be at least 1"),
            ("items.1.rate", "rate is required"),
            ("items.1.sku", "sku is required"),
        ],
    )?;
    expect_errors(&errors(&parsed, json!({"items": []})), &[(
        "items",
        "Items requires at least 1 items",
    )])?;
    expect_errors(&errors(&parsed, json!({"items": [1, 2]})), &[(
        "items",
        "Items must be a list of rows",
    )])?;
    expect_errors(
        &errors(&parsed, json!({"items": [{"sku": "a"}, {"sku": "b"}, {"sku": "c"}, {"sku": "d"}]})),
        &[("items", "Items allows at most 3 items")],
    )
}

#[test]
fn invisible_groups_in_rows_hide_their_cells() -> TestResult {
    let parsed = parsed(json!({
        "fields": [
            {"name": "items", "component": "list", "columns": [
                {"name": "shipped", "component": "switch"},
                {"name": "tracking", "component": "group", "visibleWhen": {"field": "shipped", "eq": true}, "columns": [
                    {"name": "carrier", "component": "input", "rules": [{"type": "required"}]}
                ]},
                {"name": "internal", "component": "group", "hidden": true, "columns": [
                    {"name": "bin", "component": "input", "rules": [{"type": "required"}]}
                ]}
            ]}
        ]
    }))?;
    expect_errors(
        &errors(&parsed, json!({"items": [{"shipped": false}, {"shipped": true}]})),
        &[("items.1.carrier", "carrier is required")],
    )?;
    expect_errors(&errors(&parsed, json!({"items": [{"shipped": true, "carrier": "DHL"}]})), &[])
}

#[test]
fn uploads_check_item_counts_only() -> TestResult {
    let parsed = parsed(json!({
        "fields": [
            {"name": "photos", "component": "upload", "rules": [{"type": "array", "value": 2}]},
            {"name": "cv", "component": "upload", "rules": [{"type": "required"}]}
        ]
    }))?;
    expect_errors(
        &errors(&parsed, json!({"photos": [{"uid": 1}], "cv": []})),
        &[("cv", "cv is required"), ("photos", "photos requires at least 2 items")],
    )?;
    expect_errors(&errors(&parsed, json!({"photos": [{}, {}], "cv": [{}]})), &[])
}

#[test]
fn groups_validate_children_at_their_own_paths() -> TestResult {
    let parsed = parsed(json!({
        "fields": [{"name": "billing", "component": "group", "columns": [
            {"name": "billing.city", "label": "City", "component": "input", "rules": [{"type": "required"}]}
        ]}]
    }))?;
    expect_errors(&errors(&parsed, json!({"billing": {}})), &[("billing.city", "City is required")])?;
    expect_errors(&errors(&parsed, json!({"billing": {"city": "Oslo"}})), &[])
}

#[test]
fn custom_rules_report_messages_and_errors() -> TestResult {
    let username = FieldSchema::new("username", "input").with_rule(Rule::custom(|value, _| {
        Ok(if value.as_str() == Some("admin") {
            CustomVerdict::FailWith("username is taken".to_string())
        } else {
            CustomVerdict::Pass
        })
    }));
    let code = FieldSchema::new("code", "number").with_rule(
        Rule::custom(|value, values| {
            let limit = values.get("limit").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(if value.as_f64().unwrap_or(0.0) <= limit {
                CustomVerdict::Pass
            } else {
                CustomVerdict::Fail
            })
        })
        .with_message("over the limit"),
    );
    let flaky = FieldSchema::new("flaky", "input")
        .with_rule(Rule::custom(|_, _| Err(io::Error::other("backend down").into())));
    let parsed = parse(&FormSchema::new(vec![username, code, flaky])).map_err(|err| err.to_string())?;

    expect_errors(
        &errors(&parsed, json!({"username": "admin", "code": 9, "limit": 5, "flaky": "x"})),
        &[
            ("code", "over the limit"),
            ("flaky", "validation failed"),
            ("username", "username is taken"),
        ],
    )?;
    expect_errors(&errors(&parsed, json!({"username": "ada", "code": 1, "limit": 5})), &[])
}

#[test]
fn first_error_per_path_wins() -> TestResult {
    let parsed = parsed(json!({
        "fields": [{"name": "email", "component": "input", "rules": [
            {"type": "minLength", "value": 10, "message": "too short"},
            {"type": "email", "message": "not an email"}
        ]}]
    }))?;
    expect_errors(&errors(&parsed, json!({"email": "ab"})), &[("email", "too short")])
}

#[test]
fn valid_outcome_returns_values() -> TestResult {
    let parsed = parsed(json!({"fields": [{"name": "name", "component": "input"}]}))?;
    let snapshot = values(json!({"name": "Ada", "extra": 1}));
    match validate(&parsed, &snapshot) {
        ValidationOutcome::Valid {
            data,
        } if data == snapshot => Ok(()),
        other => Err(format!("unexpected outcome: {other:?}")),
    }
}
