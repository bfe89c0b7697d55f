// crates/form-rules-core/src/schema.rs
// ============================================================================
// Module: Form Schema Model
// Description: Declarative field descriptions consumed by the engine.
// Purpose: Define fields, rules, compute configs, and code-only hooks.
// Dependencies: form-rules-logic, serde, serde_json
// ============================================================================

//! ## Overview
//! A form schema is a tree of [`FieldSchema`] nodes. Groups and lists carry
//! child fields in `columns`; group children are addressed by their own names
//! while list columns are addressed relative to a row (`items.0.qty`).
//!
//! Everything here deserializes from camelCase JSON except the code-only
//! hooks (custom validators and submit transforms), which are attached with
//! builder methods after loading.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use form_rules_logic::Condition;
use form_rules_logic::Values;
use serde::Deserialize;
use serde_json::Value;

use crate::compute::RoundMode;
use crate::compute::extract_dependencies;

// ============================================================================
// SECTION: Schema Root
// ============================================================================

/// Root of a form description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormSchema {
    /// Top-level fields in display order.
    pub fields: Vec<FieldSchema>,
}

impl FormSchema {
    /// Creates a schema from top-level fields.
    #[must_use]
    pub const fn new(fields: Vec<FieldSchema>) -> Self {
        Self {
            fields,
        }
    }

    /// Reads a schema from a JSON value.
    ///
    /// # Errors
    /// Returns [`serde_json::Error`] when the value does not describe a schema.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

// ============================================================================
// SECTION: Component Categories
// ============================================================================

/// Validation and state category of a component.
///
/// Rendering tags vary between UI kits; the engine only reasons about these
/// categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Free text.
    Text,
    /// Numbers, sliders, ratings.
    Numeric,
    /// Switches and single checkboxes.
    Boolean,
    /// Option pickers.
    Enumerated,
    /// Layout-only container with no value of its own.
    Group,
    /// Repeating rows.
    List,
    /// Opaque file list; only item counts are checked.
    Upload,
    /// Host-defined widget; only presence is checked.
    Custom,
    /// Never rendered or validated.
    Hidden,
}

impl ComponentKind {
    /// Maps a rendering tag to its category. Unknown tags are [`Self::Custom`].
    #[must_use]
    pub fn classify(component: &str) -> Self {
        match component.to_ascii_lowercase().as_str() {
            "input" | "text" | "textarea" | "password" | "email" | "url" | "tel" | "search" => {
                Self::Text
            }
            "number" | "inputnumber" | "input-number" | "numeric" | "slider" | "rate" => {
                Self::Numeric
            }
            "switch" | "checkbox" | "boolean" | "toggle" => Self::Boolean,
            "select" | "radio" | "radiogroup" | "checkboxgroup" | "autocomplete" | "cascader"
            | "treeselect" | "remoteselect" => Self::Enumerated,
            "group" | "fieldset" | "object" => Self::Group,
            "list" | "table" | "array" | "formlist" => Self::List,
            "upload" | "file" | "image" => Self::Upload,
            "hidden" => Self::Hidden,
            _ => Self::Custom,
        }
    }
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Validation rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    /// Value must be present.
    Required,
    /// Minimum character count.
    MinLength,
    /// Maximum character count.
    MaxLength,
    /// Minimum numeric value.
    Min,
    /// Maximum numeric value.
    Max,
    /// Regular expression match.
    Pattern,
    /// Email address shape.
    Email,
    /// Absolute URL.
    Url,
    /// Minimum item count for uploads.
    Array,
    /// Code-only validator.
    Custom,
}

/// Result of a custom validator that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomVerdict {
    /// Value accepted.
    Pass,
    /// Value rejected; the rule or default message applies.
    Fail,
    /// Value rejected with a specific message.
    FailWith(String),
}

/// Error raised by a custom validator.
pub type CustomRuleError = Box<dyn Error + Send + Sync>;

/// Signature of a custom validator: `(value, full snapshot)`.
pub type CustomValidatorFn =
    dyn Fn(&Value, &Values) -> Result<CustomVerdict, CustomRuleError> + Send + Sync;

/// Shareable custom validator.
#[derive(Clone)]
pub struct CustomValidator(Arc<CustomValidatorFn>);

impl CustomValidator {
    /// Wraps a validator closure.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Value, &Values) -> Result<CustomVerdict, CustomRuleError> + Send + Sync + 'static,
    {
        Self(Arc::new(func))
    }

    /// Runs the validator.
    ///
    /// # Errors
    /// Returns whatever error the validator raised.
    pub fn call(&self, value: &Value, values: &Values) -> Result<CustomVerdict, CustomRuleError> {
        (self.0)(value, values)
    }
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomValidator")
    }
}

/// One validation rule.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    /// Rule kind.
    #[serde(rename = "type")]
    pub kind: RuleKind,
    /// Rule argument (length, bound, pattern, item count).
    #[serde(default)]
    pub value: Option<Value>,
    /// Message overriding the configured default.
    #[serde(default)]
    pub message: Option<String>,
    /// Validator for [`RuleKind::Custom`].
    #[serde(skip)]
    pub validator: Option<CustomValidator>,
}

impl Rule {
    /// Creates a rule with an optional argument.
    #[must_use]
    pub const fn new(kind: RuleKind, value: Option<Value>) -> Self {
        Self {
            kind,
            value,
            message: None,
            validator: None,
        }
    }

    /// Creates a `required` rule.
    #[must_use]
    pub const fn required() -> Self {
        Self::new(RuleKind::Required, None)
    }

    /// Creates a custom rule.
    pub fn custom<F>(func: F) -> Self
    where
        F: Fn(&Value, &Values) -> Result<CustomVerdict, CustomRuleError> + Send + Sync + 'static,
    {
        Self {
            validator: Some(CustomValidator::new(func)),
            ..Self::new(RuleKind::Custom, None)
        }
    }

    /// Sets the failure message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns the argument as a number, if it is one.
    #[must_use]
    pub fn number(&self) -> Option<f64> {
        self.value.as_ref().and_then(Value::as_f64)
    }
}

// ============================================================================
// SECTION: Compute
// ============================================================================

/// Computed-value configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComputeConfig {
    /// Expression source.
    pub expr: String,
    /// Fields the expression may read; inferred from `expr` when absent.
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
    /// Decimal digits kept in numeric results.
    #[serde(default)]
    pub precision: Option<u32>,
    /// Rounding applied with `precision`.
    #[serde(default)]
    pub round_mode: RoundMode,
}

impl ComputeConfig {
    /// Creates a config with inferred dependencies.
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            dependencies: None,
            precision: None,
            round_mode: RoundMode::Round,
        }
    }

    /// Returns the declared dependencies, or those inferred from `expr`.
    #[must_use]
    pub fn resolved_dependencies(&self) -> Vec<String> {
        self.dependencies.as_ref().map_or_else(
            || extract_dependencies(&self.expr).into_iter().collect(),
            Clone::clone,
        )
    }
}

// ============================================================================
// SECTION: Transforms
// ============================================================================

/// Signature of a submit-time transform: `(value, full snapshot)`.
pub type ValueTransformFn = dyn Fn(&Value, &Values) -> Value + Send + Sync;

/// Shareable submit-time transform.
#[derive(Clone)]
pub struct ValueTransform(Arc<ValueTransformFn>);

impl ValueTransform {
    /// Wraps a transform closure.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Value, &Values) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(func))
    }

    /// Applies the transform.
    #[must_use]
    pub fn apply(&self, value: &Value, values: &Values) -> Value {
        (self.0)(value, values)
    }
}

impl fmt::Debug for ValueTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueTransform")
    }
}

// ============================================================================
// SECTION: Field Schema
// ============================================================================

/// One field of a form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldSchema {
    /// Dot-path of the field's value.
    pub name: String,
    /// Display label used in messages.
    #[serde(default)]
    pub label: Option<String>,
    /// Rendering tag.
    #[serde(default)]
    pub component: String,
    /// Explicit category, overriding the one derived from `component`.
    #[serde(default)]
    pub kind: Option<ComponentKind>,
    /// Enumerated field holds an array of selections.
    #[serde(default)]
    pub multiple: bool,
    /// Initial value.
    #[serde(default)]
    pub default_value: Option<Value>,
    /// Ordered validation rules.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Field is shown only while this holds.
    #[serde(default)]
    pub visible_when: Option<Condition>,
    /// Field is disabled while this holds.
    #[serde(default)]
    pub disabled_when: Option<Condition>,
    /// Field is required while this holds.
    #[serde(default)]
    pub required_when: Option<Condition>,
    /// Computed-value configuration.
    #[serde(default)]
    pub compute: Option<ComputeConfig>,
    /// Extra fields to watch.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Child fields of groups and lists.
    #[serde(default)]
    pub columns: Vec<Self>,
    /// Minimum list rows.
    #[serde(default)]
    pub min_items: Option<usize>,
    /// Maximum list rows or uploads.
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Statically hidden.
    #[serde(default)]
    pub hidden: bool,
    /// Statically disabled.
    #[serde(default)]
    pub disabled: bool,
    /// Read-only flag; absent inherits the global setting.
    #[serde(default)]
    pub readonly: Option<bool>,
    /// Left out of the submission payload.
    #[serde(default)]
    pub no_submit: bool,
    /// Cleared when any upstream dependency changes.
    #[serde(default)]
    pub clear_on_change: bool,
    /// Submit-time mapper.
    #[serde(skip)]
    pub transform: Option<ValueTransform>,
}

impl FieldSchema {
    /// Creates a field with a name and rendering tag.
    pub fn new(name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
            ..Self::default()
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Appends a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Sets the compute configuration.
    #[must_use]
    pub fn with_compute(mut self, compute: ComputeConfig) -> Self {
        self.compute = Some(compute);
        self
    }

    /// Sets child fields.
    #[must_use]
    pub fn with_columns(mut self, columns: Vec<Self>) -> Self {
        self.columns = columns;
        self
    }

    /// Sets the visibility condition.
    #[must_use]
    pub fn with_visible_when(mut self, condition: Condition) -> Self {
        self.visible_when = Some(condition);
        self
    }

    /// Sets the requiredness condition.
    #[must_use]
    pub fn with_required_when(mut self, condition: Condition) -> Self {
        self.required_when = Some(condition);
        self
    }

    /// Sets the disabled condition.
    #[must_use]
    pub fn with_disabled_when(mut self, condition: Condition) -> Self {
        self.disabled_when = Some(condition);
        self
    }

    /// Sets the submit-time transform.
    pub fn with_transform<F>(mut self, func: F) -> Self
    where
        F: Fn(&Value, &Values) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(ValueTransform::new(func));
        self
    }

    /// Returns the component category.
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.kind.unwrap_or_else(|| ComponentKind::classify(&self.component))
    }

    /// Returns the label, falling back to the name.
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Returns true when a static `required` rule is present.
    #[must_use]
    pub fn has_required_rule(&self) -> bool {
        self.rules.iter().any(|rule| rule.kind == RuleKind::Required)
    }

    /// Returns the first rule of a kind.
    #[must_use]
    pub fn rule(&self, kind: RuleKind) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.kind == kind)
    }

    /// Iterates the declared state conditions.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        [&self.visible_when, &self.disabled_when, &self.required_when].into_iter().flatten()
    }

    /// Returns every field this field reacts to: explicit dependencies,
    /// condition reads, and compute inputs.
    #[must_use]
    pub fn forward_dependencies(&self) -> BTreeSet<String> {
        let mut deps: BTreeSet<String> = self.dependencies.iter().cloned().collect();
        for condition in self.conditions() {
            condition.collect_dependencies(&mut deps);
        }
        if let Some(compute) = &self.compute {
            deps.extend(compute.resolved_dependencies());
        }
        deps
    }

    /// Returns list columns with nested groups flattened into the row.
    #[must_use]
    pub fn row_columns(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        flatten_columns(&self.columns, &mut out);
        out
    }
}

/// Appends columns, replacing groups with their children.
fn flatten_columns<'a>(columns: &'a [FieldSchema], out: &mut Vec<&'a FieldSchema>) {
    for column in columns {
        if column.kind() == ComponentKind::Group {
            flatten_columns(&column.columns, out);
        } else {
            out.push(column);
        }
    }
}
