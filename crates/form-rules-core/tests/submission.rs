// crates/form-rules-core/tests/submission.rs
// ============================================================================
// Module: Submission Builder Tests
// Description: Payload filtering, transforms, and dotted-name nesting.
// Purpose: Ensure only schema fields reach the payload, shaped as declared.
// ============================================================================

//! Submission builder tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use form_rules_core::FieldSchema;
use form_rules_core::FormSchema;
use form_rules_core::ParsedSchema;
use form_rules_core::Values;
use form_rules_core::build_submission;
use form_rules_core::parse;
use serde_json::Value;
use serde_json::json;

type TestResult = Result<(), String>;

fn values(value: Value) -> Values {
    match value {
        Value::Object(map) => map,
        _ => Values::new(),
    }
}

fn parsed(schema: &FormSchema) -> Result<ParsedSchema, String> {
    parse(schema).map_err(|err| err.to_string())
}

fn expect_payload(actual: &Value, expected: &Value) -> TestResult {
    if actual == expected { Ok(()) } else { Err(format!("expected {expected}, got {actual}")) }
}

#[test]
fn drops_no_submit_and_unknown_values() -> TestResult {
    let schema = FormSchema::from_json(json!({
        "fields": [
            {"name": "email", "component": "email"},
            {"name": "confirm", "component": "email", "noSubmit": true},
            {"name": "note", "component": "textarea"}
        ]
    }))
    .map_err(|err| err.to_string())?;
    let payload = build_submission(
        &parsed(&schema)?,
        &values(json!({"email": "a@b.co", "confirm": "a@b.co", "stray": 1})),
    );
    expect_payload(&payload, &json!({"email": "a@b.co"}))
}

#[test]
fn nests_dotted_names() -> TestResult {
    let schema = FormSchema::new(vec![
        FieldSchema::new("user.name", "input"),
        FieldSchema::new("user.address.city", "input"),
        FieldSchema::new("plan", "select"),
    ]);
    let payload = build_submission(
        &parsed(&schema)?,
        &values(json!({"user": {"name": "Ada", "address": {"city": "Oslo"}}, "plan": "pro"})),
    );
    expect_payload(
        &payload,
        &json!({"user": {"name": "Ada", "address": {"city": "Oslo"}}, "plan": "pro"}),
    )
}

#[test]
fn transforms_see_the_whole_snapshot() -> TestResult {
    let schema = FormSchema::new(vec![
        FieldSchema::new("currency", "select").with_transform(|value, _| {
            Value::String(value.as_str().unwrap_or_default().to_ascii_uppercase())
        }),
        FieldSchema::new("amount", "number").with_transform(|value, snapshot| {
            json!({"value": value, "currency": snapshot.get("currency")})
        }),
    ]);
    let payload =
        build_submission(&parsed(&schema)?, &values(json!({"currency": "nok", "amount": 10})));
    expect_payload(
        &payload,
        &json!({"currency": "NOK", "amount": {"value": 10, "currency": "nok"}}),
    )
}

#[test]
fn groups_contribute_children_only() -> TestResult {
    let schema = FormSchema::new(vec![
        FieldSchema::new("billing", "group").with_columns(vec![
            FieldSchema::new("billing.city", "input"),
            FieldSchema::new("billing.zip", "input"),
        ]),
        FieldSchema::new("internal", "group"),
    ]);
    let payload = build_submission(
        &parsed(&schema)?,
        &values(json!({"billing": {"city": "Oslo", "extra": true}})),
    );
    expect_payload(&payload, &json!({"billing": {"city": "Oslo"}}))
}

#[test]
fn no_submit_group_drops_its_subtree() -> TestResult {
    let schema = FormSchema::from_json(json!({
        "fields": [
            {"name": "meta", "component": "group", "noSubmit": true, "columns": [
                {"name": "draftId", "component": "input"}
            ]},
            {"name": "title", "component": "input"}
        ]
    }))
    .map_err(|err| err.to_string())?;
    let payload =
        build_submission(&parsed(&schema)?, &values(json!({"draftId": "d1", "title": "Hi"})));
    expect_payload(&payload, &json!({"title": "Hi"}))
}

#[test]
fn list_rows_keep_submitted_columns() -> TestResult {
    let schema = FormSchema::new(vec![FieldSchema::new("items", "list").with_columns(vec![
        FieldSchema::new("sku", "input"),
        FieldSchema::new("qty", "number").with_transform(|value, _| {
            value.as_f64().map_or(Value::Null, |qty| json!(qty.round()))
        }),
        serde_json::from_value::<FieldSchema>(json!({
            "name": "ui",
            "component": "switch",
            "noSubmit": true
        }))
        .map_err(|err| err.to_string())?,
    ])]);
    let payload = build_submission(
        &parsed(&schema)?,
        &values(json!({"items": [
            {"sku": "A", "qty": 1.6, "ui": true, "tmp": 1},
            {"qty": 2.0},
            "loose"
        ]})),
    );
    expect_payload(
        &payload,
        &json!({"items": [{"sku": "A", "qty": 2.0}, {"qty": 2.0}, "loose"]}),
    )
}
