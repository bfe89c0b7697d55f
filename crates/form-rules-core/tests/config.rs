// crates/form-rules-core/tests/config.rs
// ============================================================================
// Module: Engine Config Tests
// Description: TOML parsing, limits, file loading, and engine wiring.
// Purpose: Ensure config is strict and reaches every engine call.
// ============================================================================

//! Engine configuration tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::io::Write as _;

use form_rules_core::ConfigError;
use form_rules_core::EngineConfig;
use form_rules_core::EngineError;
use form_rules_core::FormEngine;
use form_rules_core::FormSchema;
use form_rules_core::Values;
use serde_json::Value;
use serde_json::json;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn values(value: Value) -> Values {
    match value {
        Value::Object(map) => map,
        _ => Values::new(),
    }
}

fn assert_invalid(result: Result<EngineConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(ConfigError::Invalid(message)) if message.contains(needle) => Ok(()),
        other => Err(format!("expected invalid config mentioning {needle:?}, got {other:?}")),
    }
}

fn write_config(bytes: &[u8]) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(bytes).map_err(|err| err.to_string())?;
    file.flush().map_err(|err| err.to_string())?;
    Ok(file)
}

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = EngineConfig::from_toml_str("").map_err(|err| err.to_string())?;
    if config != EngineConfig::default() {
        return Err(format!("unexpected config: {config:?}"));
    }
    if config.schema.max_condition_depth != 32 || config.messages.required != "{label} is required"
    {
        return Err("defaults changed".to_string());
    }
    Ok(())
}

#[test]
fn parses_every_section() -> TestResult {
    let config = EngineConfig::from_toml_str(
        r#"
[compute]
change_epsilon = 0.01

[schema]
max_condition_depth = 8

[state]
global_readonly = true

[messages]
required = "Please fill in {label}"
"#,
    )
    .map_err(|err| err.to_string())?;
    if (config.compute.change_epsilon - 0.01).abs() > f64::EPSILON
        || config.schema.max_condition_depth != 8
        || !config.state.global_readonly
        || config.state.global_disabled
        || config.messages.required != "Please fill in {label}"
        || config.messages.email != "{label} must be a valid email address"
    {
        return Err(format!("unexpected config: {config:?}"));
    }
    Ok(())
}

#[test]
fn rejects_out_of_range_values() -> TestResult {
    assert_invalid(
        EngineConfig::from_toml_str("[compute]\nchange_epsilon = -1.0\n"),
        "change_epsilon",
    )?;
    assert_invalid(
        EngineConfig::from_toml_str("[compute]\nchange_epsilon = nan\n"),
        "change_epsilon",
    )?;
    assert_invalid(
        EngineConfig::from_toml_str("[schema]\nmax_condition_depth = 0\n"),
        "max_condition_depth",
    )?;
    assert_invalid(
        EngineConfig::from_toml_str("[schema]\nmax_condition_depth = 300\n"),
        "max_condition_depth",
    )?;
    assert_invalid(EngineConfig::from_toml_str("[messages]\nrequired = \"  \"\n"), "required")?;
    let long = "x".repeat(2000);
    assert_invalid(
        EngineConfig::from_toml_str(&format!("[messages]\nurl = \"{long}\"\n")),
        "url",
    )
}

#[test]
fn rejects_unknown_keys() -> TestResult {
    for content in ["[compute]\nprecision = 2\n", "[logging]\nlevel = \"debug\"\n"] {
        match EngineConfig::from_toml_str(content) {
            Err(ConfigError::Parse(_)) => {}
            other => return Err(format!("expected parse error for {content:?}, got {other:?}")),
        }
    }
    Ok(())
}

#[test]
fn loads_from_disk() -> TestResult {
    let file = write_config(b"[state]\nglobal_disabled = true\n")?;
    let config = EngineConfig::load(file.path()).map_err(|err| err.to_string())?;
    if !config.state.global_disabled {
        return Err("file contents were not applied".to_string());
    }
    Ok(())
}

#[test]
fn load_rejects_missing_oversized_and_binary_files() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    match EngineConfig::load(&dir.path().join("absent.toml")) {
        Err(ConfigError::Io(_)) => {}
        other => return Err(format!("expected io error, got {other:?}")),
    }

    let mut oversized = b"# ".to_vec();
    oversized.resize(1024 * 1024 + 1, b'a');
    let file = write_config(&oversized)?;
    assert_invalid(EngineConfig::load(file.path()), "size limit")?;

    let file = write_config(&[0xff, 0xfe, 0x00])?;
    assert_invalid(EngineConfig::load(file.path()), "utf-8")?;

    let long_name = dir.path().join("c".repeat(300));
    assert_invalid(EngineConfig::load(&long_name), "component too long")
}

#[test]
fn engine_rejects_invalid_config_and_schema() -> TestResult {
    let schema = FormSchema::from_json(json!({"fields": [{"name": "a", "component": "input"}]}))
        .map_err(|err| err.to_string())?;
    let mut config = EngineConfig::default();
    config.compute.change_epsilon = f64::INFINITY;
    if !matches!(FormEngine::new(&schema, config), Err(EngineError::Config(_))) {
        return Err("invalid config should be rejected".to_string());
    }

    let cyclic = FormSchema::from_json(json!({
        "fields": [
            {"name": "a", "component": "number", "compute": {"expr": "b"}},
            {"name": "b", "component": "number", "compute": {"expr": "a"}}
        ]
    }))
    .map_err(|err| err.to_string())?;
    match FormEngine::new(&cyclic, EngineConfig::default()) {
        Err(err @ EngineError::Schema(_)) if err.to_string().contains("cycle") => Ok(()),
        other => Err(format!("expected schema error, got {other:?}")),
    }
}

#[test]
fn engine_applies_configured_limits_and_messages() -> TestResult {
    let config = EngineConfig::from_toml_str(
        r#"
[schema]
max_condition_depth = 1

[messages]
required = "Fyll inn {label}"
"#,
    )
    .map_err(|err| err.to_string())?;
    let nested = FormSchema::from_json(json!({
        "fields": [{"name": "x", "component": "input", "visibleWhen": {"not": {"field": "y", "eq": 1}}}]
    }))
    .map_err(|err| err.to_string())?;
    if FormEngine::new(&nested, config.clone()).is_ok() {
        return Err("depth limit should apply".to_string());
    }

    let schema = FormSchema::from_json(json!({
        "fields": [{"name": "city", "label": "By", "component": "input", "rules": [{"type": "required"}]}]
    }))
    .map_err(|err| err.to_string())?;
    let engine = FormEngine::new(&schema, config).map_err(|err| err.to_string())?;
    match engine.validate(&values(json!({}))).error("city") {
        Some("Fyll inn By") => Ok(()),
        other => Err(format!("unexpected message: {other:?}")),
    }
}

#[test]
fn engine_applies_global_state_flags() -> TestResult {
    let config = EngineConfig::from_toml_str("[state]\nglobal_disabled = true\n")
        .map_err(|err| err.to_string())?;
    let schema = FormSchema::from_json(json!({"fields": [{"name": "a", "component": "input"}]}))
        .map_err(|err| err.to_string())?;
    let engine = FormEngine::new(&schema, config).map_err(|err| err.to_string())?;
    let states = engine.field_states(&Values::new());
    if !states.get("a").is_some_and(|state| state.disabled) {
        return Err("global disabled should reach field states".to_string());
    }
    if !engine.recompute(None, &Values::new()).field_states.get("a").is_some_and(|s| s.disabled) {
        return Err("global disabled should reach recompute".to_string());
    }
    Ok(())
}
