// crates/form-rules-core/src/validation/mod.rs
// ============================================================================
// Module: Validation Builder
// Description: Snapshot-specific validators built from field rules.
// Purpose: Decide which fields are checked and how, then report the first
//          error per path.
// Dependencies: form-rules-logic
// ============================================================================

//! ## Overview
//! [`build`] evaluates visibility and requiredness against one snapshot and
//! fixes the set of fields to check. Invisible and hidden fields are left
//! out entirely; groups contribute their children at their own paths. The
//! resulting [`FormValidator`] is tied to that snapshot and must be rebuilt
//! when values change, since requiredness can depend on other fields.
//!
//! Errors are keyed by dot-path (`items.0.qty` for list cells). The first
//! message recorded for a path is kept; later failures at the same path are
//! dropped, and a failing field never stops the others from being checked.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod rules;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;
use std::collections::BTreeMap;

use form_rules_logic::Values;
use form_rules_logic::get_path;

use crate::config::MessageTemplates;
use crate::parser::ParsedSchema;
use crate::schema::ComponentKind;
use crate::schema::FieldSchema;
use crate::state::compute_field_state;
use crate::validation::rules::Checker;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Result of running a validator.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Every checked field passed; carries the validated values.
    Valid {
        /// The values that were validated.
        data: Values,
    },
    /// At least one field failed.
    Invalid {
        /// First message per failing path.
        errors: BTreeMap<String, String>,
    },
}

impl ValidationOutcome {
    /// Returns true for [`Self::Valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Returns the error map, empty when valid.
    #[must_use]
    pub fn errors(&self) -> BTreeMap<String, String> {
        match self {
            Self::Valid { .. } => BTreeMap::new(),
            Self::Invalid {
                errors,
            } => errors.clone(),
        }
    }

    /// Returns the message recorded for a path.
    #[must_use]
    pub fn error(&self, path: &str) -> Option<&str> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid {
                errors,
            } => errors.get(path).map(String::as_str),
        }
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Field selected for checking.
#[derive(Debug, Clone, Copy)]
struct PlannedField<'a> {
    /// Field schema.
    field: &'a FieldSchema,
    /// Requiredness resolved at build time.
    required: bool,
}

/// Validator for one value snapshot.
#[derive(Debug, Clone)]
pub struct FormValidator<'a> {
    /// Schema the validator was built from.
    parsed: &'a ParsedSchema,
    /// Default message templates.
    messages: Cow<'a, MessageTemplates>,
    /// Fields to check, in schema order.
    plan: Vec<PlannedField<'a>>,
}

impl FormValidator<'_> {
    /// Returns the paths of the fields this validator checks.
    #[must_use]
    pub fn checked_fields(&self) -> Vec<&str> {
        self.plan.iter().map(|planned| planned.field.name.as_str()).collect()
    }

    /// Checks `values` and reports the outcome.
    #[must_use]
    pub fn run(&self, values: &Values) -> ValidationOutcome {
        let mut checker = Checker::new(self.parsed, &self.messages);
        for planned in &self.plan {
            let name = planned.field.name.as_str();
            checker.check_field(name, planned.field, get_path(values, name), planned.required, values);
        }
        let errors = checker.finish();
        if errors.is_empty() {
            ValidationOutcome::Valid {
                data: values.clone(),
            }
        } else {
            ValidationOutcome::Invalid {
                errors,
            }
        }
    }
}

/// Builds a validator with the default messages.
#[must_use]
pub fn build<'a>(parsed: &'a ParsedSchema, values: &Values) -> FormValidator<'a> {
    plan(parsed, values, Cow::Owned(MessageTemplates::default()))
}

/// Builds a validator with configured messages.
#[must_use]
pub fn build_with_messages<'a>(
    parsed: &'a ParsedSchema,
    values: &Values,
    messages: &'a MessageTemplates,
) -> FormValidator<'a> {
    plan(parsed, values, Cow::Borrowed(messages))
}

/// Builds and runs a validator against the same snapshot.
#[must_use]
pub fn validate(parsed: &ParsedSchema, values: &Values) -> ValidationOutcome {
    build(parsed, values).run(values)
}

/// Resolves the checked fields for a snapshot.
fn plan<'a>(
    parsed: &'a ParsedSchema,
    values: &Values,
    messages: Cow<'a, MessageTemplates>,
) -> FormValidator<'a> {
    let mut planned = Vec::new();
    plan_fields(parsed.fields(), values, &mut planned);
    FormValidator {
        parsed,
        messages,
        plan: planned,
    }
}

/// Appends visible fields, descending into groups.
fn plan_fields<'a>(fields: &'a [FieldSchema], values: &Values, out: &mut Vec<PlannedField<'a>>) {
    for field in fields {
        let state = compute_field_state(field, values, false, false);
        if !state.visible {
            continue;
        }
        if field.kind() == ComponentKind::Group {
            plan_fields(&field.columns, values, out);
        } else {
            out.push(PlannedField {
                field,
                required: state.required,
            });
        }
    }
}
