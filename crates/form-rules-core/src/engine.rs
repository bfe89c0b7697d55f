// crates/form-rules-core/src/engine.rs
// ============================================================================
// Module: Form Engine
// Description: Parsed schema bundled with its configuration.
// Purpose: Give hosts one handle for state, compute, validation, and submit.
// Dependencies: form-rules-logic, thiserror
// ============================================================================

//! ## Overview
//! [`FormEngine`] is immutable after construction and can be shared across
//! threads. Each method is a thin call into the module that owns the
//! behavior, with the configured flags and messages filled in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use form_rules_logic::Values;
use serde_json::Value;
use thiserror::Error;

use crate::config::ConfigError;
use crate::config::EngineConfig;
use crate::parser::ParsedSchema;
use crate::parser::SchemaError;
use crate::parser::merge_default_values;
use crate::parser::parse_with_limits;
use crate::recompute::Recompute;
use crate::recompute::RecomputeOptions;
use crate::recompute::recompute;
use crate::schema::FormSchema;
use crate::state::FieldState;
use crate::state::compute_all_field_states;
use crate::state::get_watch_fields;
use crate::submission::build_submission;
use crate::validation::ValidationOutcome;
use crate::validation::build_with_messages;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while constructing an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Schema was rejected.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Parsed schema plus configuration.
#[derive(Debug, Clone)]
pub struct FormEngine {
    /// Parsed schema.
    parsed: ParsedSchema,
    /// Engine configuration.
    config: EngineConfig,
}

impl FormEngine {
    /// Validates the configuration and parses the schema.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when either input is rejected.
    pub fn new(schema: &FormSchema, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let parsed = parse_with_limits(schema, &config.schema)?;
        tracing::debug!(
            fields = parsed.all_fields().len(),
            computed = parsed.compute_order().len(),
            "form schema parsed"
        );
        Ok(Self {
            parsed,
            config,
        })
    }

    /// Returns the parsed schema.
    #[must_use]
    pub const fn parsed(&self) -> &ParsedSchema {
        &self.parsed
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Computes every field state with the configured global flags.
    #[must_use]
    pub fn field_states(&self, values: &Values) -> BTreeMap<String, FieldState> {
        compute_all_field_states(
            &self.parsed,
            values,
            self.config.state.global_disabled,
            self.config.state.global_readonly,
        )
    }

    /// Returns the fields a host must observe.
    #[must_use]
    pub fn watch_fields(&self) -> Vec<String> {
        get_watch_fields(&self.parsed)
    }

    /// Returns the schema defaults overlaid with `external`.
    #[must_use]
    pub fn defaults(&self, external: &Values) -> Values {
        merge_default_values(&self.parsed, external)
    }

    /// Derives state and writes for a transition to `next`.
    #[must_use]
    pub fn recompute(&self, previous: Option<&Values>, next: &Values) -> Recompute {
        let options = RecomputeOptions {
            global_disabled: self.config.state.global_disabled,
            global_readonly: self.config.state.global_readonly,
            change_epsilon: self.config.compute.change_epsilon,
        };
        recompute(&self.parsed, previous, next, &options)
    }

    /// Validates a snapshot with the configured messages.
    #[must_use]
    pub fn validate(&self, values: &Values) -> ValidationOutcome {
        build_with_messages(&self.parsed, values, &self.config.messages).run(values)
    }

    /// Builds the submission payload.
    #[must_use]
    pub fn submission(&self, values: &Values) -> Value {
        build_submission(&self.parsed, values)
    }
}
