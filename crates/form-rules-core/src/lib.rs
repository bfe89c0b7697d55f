// crates/form-rules-core/src/lib.rs
// ============================================================================
// Module: Form Rules Core Library
// Description: Schema-driven rules engine for forms.
// Purpose: Parse schemas, derive field state, evaluate computed fields,
//          validate snapshots, and build submission payloads.
// Dependencies: form-rules-logic, bigdecimal, regex, serde, serde_json,
//               thiserror, toml, tracing, url
// ============================================================================

//! ## Overview
//! Hosts parse a [`FormSchema`] once, then on each value change call
//! [`recompute`] for field states and proposed writes. On submit they call
//! [`validate`] and [`build_submission`]. [`FormEngine`] bundles these with
//! an [`EngineConfig`].
//!
//! The engine is synchronous and pure. It never mutates host values; it
//! returns [`Write`] proposals for the host to apply through a
//! [`FormStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod compute;
pub mod config;
pub mod engine;
pub mod parser;
pub mod recompute;
pub mod schema;
pub mod state;
pub mod store;
pub mod submission;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use compute::Expression;
pub use compute::ExpressionError;
pub use compute::RoundMode;
pub use compute::evaluate_compiled;
pub use compute::extract_dependencies as extract_expression_dependencies;
pub use compute::has_material_change;
pub use config::ConfigError;
pub use config::EngineConfig;
pub use config::MessageTemplates;
pub use engine::EngineError;
pub use engine::FormEngine;
pub use form_rules_logic::Comparator;
pub use form_rules_logic::Condition;
pub use form_rules_logic::Values;
pub use form_rules_logic::get_path;
pub use parser::DependencyGraph;
pub use parser::ParsedSchema;
pub use parser::SchemaError;
pub use parser::get_downstream_fields;
pub use parser::merge_default_values;
pub use parser::parse;
pub use recompute::Recompute;
pub use recompute::RecomputeOptions;
pub use recompute::recompute;
pub use schema::ComponentKind;
pub use schema::ComputeConfig;
pub use schema::CustomVerdict;
pub use schema::FieldSchema;
pub use schema::FormSchema;
pub use schema::Rule;
pub use schema::RuleKind;
pub use state::FieldState;
pub use state::compute_all_field_states;
pub use state::compute_field_state;
pub use state::get_watch_fields;
pub use store::FormStore;
pub use store::SetOptions;
pub use store::Write;
pub use store::apply_writes;
pub use submission::build_submission;
pub use validation::FormValidator;
pub use validation::ValidationOutcome;
pub use validation::build;
pub use validation::validate;
