// crates/form-rules-core/src/validation/rules.rs
// ============================================================================
// Module: Validation Rule Checks
// Description: Per-category value checks.
// Purpose: Apply required, length, range, format, item-count, and custom
//          rules to one value and record the first failure per path.
// Dependencies: form-rules-logic, regex, serde_json, tracing, url
// ============================================================================

//! ## Overview
//! Each component category has its own notion of "present". Format rules
//! only apply to present values, so an optional empty field never fails.
//! List rows are checked cell by cell with the row merged over the full
//! snapshot, which lets column conditions read both row and form values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::LazyLock;

use form_rules_logic::Values;
use form_rules_logic::get_path;
use form_rules_logic::is_empty_value;
use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::compute::numeric_string;
use crate::config::MessageTemplates;
use crate::parser::ParsedSchema;
use crate::schema::ComponentKind;
use crate::schema::CustomVerdict;
use crate::schema::FieldSchema;
use crate::schema::Rule;
use crate::schema::RuleKind;
use crate::state::compute_field_state;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Deliberately loose email shape: one `@` and a dotted domain.
static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

// ============================================================================
// SECTION: Checker
// ============================================================================

/// Accumulates errors for one validation pass.
pub(super) struct Checker<'a> {
    /// Schema providing compiled patterns.
    parsed: &'a ParsedSchema,
    /// Default message templates.
    messages: &'a MessageTemplates,
    /// First message per path.
    errors: BTreeMap<String, String>,
}

/// Numeric reading of a field value.
enum NumericInput {
    /// Undefined, null, or blank.
    Absent,
    /// Usable number.
    Number(f64),
    /// Present but not numeric.
    NotANumber,
}

impl<'a> Checker<'a> {
    /// Creates an empty checker.
    pub(super) const fn new(parsed: &'a ParsedSchema, messages: &'a MessageTemplates) -> Self {
        Self {
            parsed,
            messages,
            errors: BTreeMap::new(),
        }
    }

    /// Returns the collected errors.
    pub(super) fn finish(self) -> BTreeMap<String, String> {
        self.errors
    }

    /// Records a message unless the path already failed.
    fn fail(&mut self, path: &str, message: String) {
        self.errors.entry(path.to_string()).or_insert(message);
    }

    /// Checks one field value at `path`.
    pub(super) fn check_field(
        &mut self,
        path: &str,
        field: &FieldSchema,
        value: Option<&Value>,
        required: bool,
        scope: &Values,
    ) {
        let failure = match field.kind() {
            ComponentKind::Text => self.check_text(field, value, required, scope),
            ComponentKind::Numeric => self.check_numeric(field, value, required, scope),
            ComponentKind::Boolean => self.check_boolean(field, value, required, scope),
            ComponentKind::Enumerated => self.check_enumerated(field, value, required, scope),
            ComponentKind::Custom => self.check_custom_kind(field, value, required, scope),
            ComponentKind::Upload => self.check_upload(field, value, required),
            ComponentKind::List => {
                self.check_list(path, field, value, required, scope);
                None
            }
            ComponentKind::Group | ComponentKind::Hidden => None,
        };
        if let Some(message) = failure {
            self.fail(path, message);
        }
    }

    // ------------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------------

    /// Text: only strings are accepted; required means a non-empty string.
    fn check_text(
        &self,
        field: &FieldSchema,
        value: Option<&Value>,
        required: bool,
        scope: &Values,
    ) -> Option<String> {
        let text = match value {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.as_str()),
            Some(Value::Number(_) | Value::Bool(_) | Value::Array(_) | Value::Object(_)) => {
                return Some(self.template(field, &self.messages.text, ""));
            }
        };
        let Some(text) = text.filter(|text| !text.is_empty()) else {
            return required.then(|| self.required_message(field));
        };
        let raw = value.unwrap_or(&Value::Null);

        for rule in &field.rules {
            let failed = match rule.kind {
                RuleKind::MinLength => {
                    rule_count(rule).is_some_and(|min| text.chars().count() < min)
                }
                RuleKind::MaxLength => {
                    rule_count(rule).is_some_and(|max| text.chars().count() > max)
                }
                RuleKind::Pattern => match &rule.value {
                    Some(Value::String(source)) => {
                        self.parsed.pattern(source).is_some_and(|regex| !regex.is_match(text))
                    }
                    _ => false,
                },
                RuleKind::Email => {
                    !EMAIL_PATTERN.as_ref().is_some_and(|regex| regex.is_match(text))
                }
                RuleKind::Url => Url::parse(text).is_err(),
                RuleKind::Custom => {
                    if let Some(message) = self.run_custom(field, rule, raw, scope) {
                        return Some(message);
                    }
                    false
                }
                RuleKind::Required | RuleKind::Min | RuleKind::Max | RuleKind::Array => false,
            };
            if failed {
                return Some(self.rule_message(field, rule));
            }
        }
        None
    }

    /// Numeric: numeric strings are accepted; other present values fail.
    fn check_numeric(
        &self,
        field: &FieldSchema,
        value: Option<&Value>,
        required: bool,
        scope: &Values,
    ) -> Option<String> {
        let number = match numeric_input(value) {
            NumericInput::Absent => return required.then(|| self.required_message(field)),
            NumericInput::NotANumber => {
                return Some(self.template(field, &self.messages.number, ""));
            }
            NumericInput::Number(number) => number,
        };
        let raw = value.unwrap_or(&Value::Null);

        for rule in &field.rules {
            let failed = match rule.kind {
                RuleKind::Min => rule.number().is_some_and(|min| number < min),
                RuleKind::Max => rule.number().is_some_and(|max| number > max),
                RuleKind::Custom => {
                    if let Some(message) = self.run_custom(field, rule, raw, scope) {
                        return Some(message);
                    }
                    false
                }
                _ => false,
            };
            if failed {
                return Some(self.rule_message(field, rule));
            }
        }
        None
    }

    /// Boolean: required means exactly `true`.
    fn check_boolean(
        &self,
        field: &FieldSchema,
        value: Option<&Value>,
        required: bool,
        scope: &Values,
    ) -> Option<String> {
        if required && value != Some(&Value::Bool(true)) {
            return Some(self.required_message(field));
        }
        self.present_custom_rules(field, value, scope)
    }

    /// Enumerated: multi-select needs a non-empty array, single needs a value.
    fn check_enumerated(
        &self,
        field: &FieldSchema,
        value: Option<&Value>,
        required: bool,
        scope: &Values,
    ) -> Option<String> {
        let present = if field.multiple {
            matches!(value, Some(Value::Array(items)) if !items.is_empty())
        } else {
            !matches!(value, None | Some(Value::Null))
                && value.and_then(Value::as_str) != Some("")
        };
        if required && !present {
            return Some(self.required_message(field));
        }
        self.present_custom_rules(field, value, scope)
    }

    /// Host-defined widget: required means not empty.
    fn check_custom_kind(
        &self,
        field: &FieldSchema,
        value: Option<&Value>,
        required: bool,
        scope: &Values,
    ) -> Option<String> {
        if required && is_empty_value(value) {
            return Some(self.required_message(field));
        }
        self.present_custom_rules(field, value, scope)
    }

    /// Upload: only item counts are checked.
    fn check_upload(
        &self,
        field: &FieldSchema,
        value: Option<&Value>,
        required: bool,
    ) -> Option<String> {
        let count = match value {
            None | Some(Value::Null) => 0,
            Some(Value::Array(items)) => items.len(),
            Some(_) => 1,
        };
        match field.rule(RuleKind::Array) {
            Some(rule) => {
                if rule_count(rule).is_some_and(|min| count < min) {
                    return Some(self.rule_message(field, rule));
                }
            }
            None => {
                if required && count == 0 {
                    return Some(self.required_message(field));
                }
            }
        }
        field
            .max_items
            .filter(|&max| count > max)
            .map(|max| self.template(field, &self.messages.max_items, &max.to_string()))
    }

    /// List: array of row objects with item bounds and per-cell checks.
    fn check_list(
        &mut self,
        path: &str,
        field: &FieldSchema,
        value: Option<&Value>,
        required: bool,
        scope: &Values,
    ) {
        let rows: &[Value] = match value {
            None | Some(Value::Null) => &[],
            Some(Value::Array(items)) if items.iter().all(Value::is_object) => items,
            Some(_) => {
                let message = self.template(field, &self.messages.list_type, "");
                self.fail(path, message);
                return;
            }
        };
        if required && rows.is_empty() {
            let message = self.required_message(field);
            self.fail(path, message);
            return;
        }
        if let Some(min) = field.min_items.filter(|&min| rows.len() < min) {
            let message = self.template(field, &self.messages.min_items, &min.to_string());
            self.fail(path, message);
        }
        if let Some(max) = field.max_items.filter(|&max| rows.len() > max) {
            let message = self.template(field, &self.messages.max_items, &max.to_string());
            self.fail(path, message);
        }

        for (index, row) in rows.iter().enumerate() {
            let Value::Object(row) = row else {
                continue;
            };
            let mut merged = scope.clone();
            merged.extend(row.iter().map(|(key, value)| (key.clone(), value.clone())));
            let row_path = format!("{path}.{index}");
            self.check_row(&row_path, &field.columns, row, &merged);
        }
    }

    /// Checks the visible cells of one row; an invisible group hides its
    /// whole subtree.
    fn check_row(
        &mut self,
        row_path: &str,
        columns: &[FieldSchema],
        row: &Values,
        merged: &Values,
    ) {
        for column in columns {
            let state = compute_field_state(column, merged, false, false);
            if !state.visible {
                continue;
            }
            if column.kind() == ComponentKind::Group {
                self.check_row(row_path, &column.columns, row, merged);
                continue;
            }
            let cell_path = format!("{row_path}.{}", column.name);
            let cell = get_path(row, &column.name);
            self.check_field(&cell_path, column, cell, state.required, merged);
        }
    }

    // ------------------------------------------------------------------------
    // Custom Rules
    // ------------------------------------------------------------------------

    /// Runs custom rules when a value is present.
    fn present_custom_rules(
        &self,
        field: &FieldSchema,
        value: Option<&Value>,
        scope: &Values,
    ) -> Option<String> {
        let value = value.filter(|value| !value.is_null())?;
        field
            .rules
            .iter()
            .filter(|rule| rule.kind == RuleKind::Custom)
            .find_map(|rule| self.run_custom(field, rule, value, scope))
    }

    /// Runs one custom rule; validator errors become a generic message.
    fn run_custom(
        &self,
        field: &FieldSchema,
        rule: &Rule,
        value: &Value,
        scope: &Values,
    ) -> Option<String> {
        let validator = rule.validator.as_ref()?;
        match validator.call(value, scope) {
            Ok(CustomVerdict::Pass) => None,
            Ok(CustomVerdict::Fail) => Some(self.rule_message(field, rule)),
            Ok(CustomVerdict::FailWith(message)) => Some(message),
            Err(err) => {
                tracing::warn!(field = %field.name, error = %err, "custom validator failed");
                Some(self.template(field, &self.messages.custom_error, ""))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    /// Message for a missing required value.
    fn required_message(&self, field: &FieldSchema) -> String {
        field.rule(RuleKind::Required).and_then(|rule| rule.message.clone()).unwrap_or_else(
            || self.template(field, &self.messages.required, ""),
        )
    }

    /// Message for a failed rule: its own, or the template for its kind.
    fn rule_message(&self, field: &FieldSchema, rule: &Rule) -> String {
        if let Some(message) = &rule.message {
            return message.clone();
        }
        let template = match rule.kind {
            RuleKind::Required => &self.messages.required,
            RuleKind::MinLength => &self.messages.min_length,
            RuleKind::MaxLength => &self.messages.max_length,
            RuleKind::Min => &self.messages.min,
            RuleKind::Max => &self.messages.max,
            RuleKind::Pattern => &self.messages.pattern,
            RuleKind::Email => &self.messages.email,
            RuleKind::Url => &self.messages.url,
            RuleKind::Array => &self.messages.min_items,
            RuleKind::Custom => &self.messages.custom,
        };
        self.template(field, template, &rule_argument(rule))
    }

    /// Expands a template for a field.
    #[allow(clippy::unused_self, reason = "Keeps message helpers uniform.")]
    fn template(&self, field: &FieldSchema, template: &str, value: &str) -> String {
        MessageTemplates::render(template, field.display_label(), value)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a field value as a number.
fn numeric_input(value: Option<&Value>) -> NumericInput {
    match value {
        None | Some(Value::Null) => NumericInput::Absent,
        Some(Value::Number(number)) => {
            number.as_f64().map_or(NumericInput::NotANumber, NumericInput::Number)
        }
        Some(Value::String(text)) if text.trim().is_empty() => NumericInput::Absent,
        Some(Value::String(text)) => {
            numeric_string(text).map_or(NumericInput::NotANumber, NumericInput::Number)
        }
        Some(_) => NumericInput::NotANumber,
    }
}

/// Reads a non-negative integer rule argument.
fn rule_count(rule: &Rule) -> Option<usize> {
    rule.value.as_ref().and_then(Value::as_u64).and_then(|count| usize::try_from(count).ok())
}

/// Renders a rule argument for `{value}`.
fn rule_argument(rule: &Rule) -> String {
    match &rule.value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
