// crates/form-rules-core/src/parser.rs
// ============================================================================
// Module: Schema Parser
// Description: Indexes a form schema and builds its dependency graph.
// Purpose: Produce an immutable, cycle-checked `ParsedSchema`.
// Dependencies: form-rules-logic, regex, thiserror, tracing
// ============================================================================

//! ## Overview
//! Parsing walks the field tree once in pre-order. It indexes every field by
//! name, collects defaults, records reverse dependency edges (`dep -> field`),
//! compiles compute expressions and `pattern` rules, and orders computed
//! fields so each is evaluated after the computed fields it reads.
//!
//! A schema is rejected when names are empty or repeated among siblings,
//! when computed fields form a cycle, when a pattern does not compile, or
//! when a condition is nested deeper than the configured limit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use form_rules_logic::Values;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::compute::Expression;
use crate::config::SchemaLimits;
use crate::schema::ComponentKind;
use crate::schema::FieldSchema;
use crate::schema::FormSchema;
use crate::schema::RuleKind;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Reverse dependency edges: a field maps to the fields reacting to it.
pub type DependencyGraph = BTreeMap<String, BTreeSet<String>>;

/// Schema parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A field has an empty name.
    #[error("field name must be non-empty (under {parent})")]
    EmptyName {
        /// Enclosing field, or `<root>`.
        parent: String,
    },
    /// Two siblings share a name.
    #[error("duplicate field name `{name}` under {parent}")]
    DuplicateName {
        /// Repeated name.
        name: String,
        /// Enclosing field, or `<root>`.
        parent: String,
    },
    /// Computed fields depend on each other in a loop.
    #[error("compute dependency cycle: {}", path.join(" -> "))]
    ComputeCycle {
        /// Cycle path; first and last entries are the same field.
        path: Vec<String>,
    },
    /// A `pattern` rule does not compile.
    #[error("invalid pattern `{pattern}` on `{field}`: {reason}")]
    InvalidPattern {
        /// Field carrying the rule.
        field: String,
        /// Pattern source.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
    /// A condition tree is nested too deeply.
    #[error("condition on `{field}` is nested {depth} levels deep (max {max_depth})")]
    ConditionTooDeep {
        /// Field carrying the condition.
        field: String,
        /// Measured depth.
        depth: usize,
        /// Configured limit.
        max_depth: usize,
    },
}

/// Indexed, immutable view of a form schema.
#[derive(Debug, Clone)]
pub struct ParsedSchema {
    /// Top-level fields as declared.
    fields: Vec<FieldSchema>,
    /// Every field in pre-order, nested columns included.
    all_fields: Vec<FieldSchema>,
    /// Name to position in `all_fields`; later declarations win.
    field_map: BTreeMap<String, usize>,
    /// Reverse dependency edges.
    dependency_graph: DependencyGraph,
    /// Declared defaults; later declarations win.
    default_values: Values,
    /// Computed field names, inputs before dependents.
    compute_order: Vec<String>,
    /// Names declared as list columns.
    row_scoped: BTreeSet<String>,
    /// Compiled compute expressions keyed by source.
    expressions: BTreeMap<String, Expression>,
    /// Compiled `pattern` rules keyed by source.
    patterns: BTreeMap<String, Regex>,
}

impl ParsedSchema {
    /// Returns the top-level fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Returns every field in pre-order.
    #[must_use]
    pub fn all_fields(&self) -> &[FieldSchema] {
        &self.all_fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.field_map.get(name).and_then(|&index| self.all_fields.get(index))
    }

    /// Returns the reverse dependency graph.
    #[must_use]
    pub const fn dependency_graph(&self) -> &DependencyGraph {
        &self.dependency_graph
    }

    /// Returns the declared default values.
    #[must_use]
    pub const fn default_values(&self) -> &Values {
        &self.default_values
    }

    /// Returns computed field names in evaluation order.
    #[must_use]
    pub fn compute_order(&self) -> &[String] {
        &self.compute_order
    }

    /// Returns true when `name` is declared as a list column.
    #[must_use]
    pub fn is_row_scoped(&self, name: &str) -> bool {
        self.row_scoped.contains(name)
    }

    /// Returns the compiled expression for a compute source.
    #[must_use]
    pub fn expression(&self, source: &str) -> Option<&Expression> {
        self.expressions.get(source)
    }

    /// Returns the compiled regex for a pattern source.
    #[must_use]
    pub fn pattern(&self, source: &str) -> Option<&Regex> {
        self.patterns.get(source)
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a schema with default limits.
///
/// # Errors
/// Returns [`SchemaError`] when the schema is rejected.
pub fn parse(schema: &FormSchema) -> Result<ParsedSchema, SchemaError> {
    parse_with_limits(schema, &SchemaLimits::default())
}

/// Parses a schema with explicit limits.
///
/// # Errors
/// Returns [`SchemaError`] when the schema is rejected.
pub fn parse_with_limits(
    schema: &FormSchema,
    limits: &SchemaLimits,
) -> Result<ParsedSchema, SchemaError> {
    let mut builder = Builder {
        limits,
        parsed: ParsedSchema {
            fields: schema.fields.clone(),
            all_fields: Vec::new(),
            field_map: BTreeMap::new(),
            dependency_graph: BTreeMap::new(),
            default_values: Values::new(),
            compute_order: Vec::new(),
            row_scoped: BTreeSet::new(),
            expressions: BTreeMap::new(),
            patterns: BTreeMap::new(),
        },
        compute_inputs: BTreeMap::new(),
    };
    builder.walk(&schema.fields, "<root>", false)?;
    let order = topological_order(&builder.compute_inputs)?;
    builder.parsed.compute_order = order;
    Ok(builder.parsed)
}

/// Mutable state for the single parse walk.
struct Builder<'a> {
    /// Active limits.
    limits: &'a SchemaLimits,
    /// Schema under construction.
    parsed: ParsedSchema,
    /// Computed field to its compute inputs.
    compute_inputs: BTreeMap<String, BTreeSet<String>>,
}

impl Builder<'_> {
    /// Visits sibling fields, then their children.
    fn walk(
        &mut self,
        fields: &[FieldSchema],
        parent: &str,
        in_list: bool,
    ) -> Result<(), SchemaError> {
        let mut seen = BTreeSet::new();
        for field in fields {
            if field.name.trim().is_empty() {
                return Err(SchemaError::EmptyName {
                    parent: parent.to_string(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateName {
                    name: field.name.clone(),
                    parent: parent.to_string(),
                });
            }
            self.visit(field, in_list)?;
            if !field.columns.is_empty() {
                let nested = in_list || field.kind() == ComponentKind::List;
                self.walk(&field.columns, &field.name, nested)?;
            }
        }
        Ok(())
    }

    /// Indexes one field.
    fn visit(&mut self, field: &FieldSchema, in_list: bool) -> Result<(), SchemaError> {
        for condition in field.conditions() {
            let depth = condition.depth();
            if depth > self.limits.max_condition_depth {
                return Err(SchemaError::ConditionTooDeep {
                    field: field.name.clone(),
                    depth,
                    max_depth: self.limits.max_condition_depth,
                });
            }
        }

        for rule in field.rules.iter().filter(|rule| rule.kind == RuleKind::Pattern) {
            if let Some(Value::String(source)) = &rule.value {
                self.compile_pattern(&field.name, source)?;
            }
        }

        if let Some(compute) = &field.compute {
            if !self.parsed.expressions.contains_key(&compute.expr) {
                match Expression::parse(&compute.expr) {
                    Ok(expression) => {
                        self.parsed.expressions.insert(compute.expr.clone(), expression);
                    }
                    Err(err) => {
                        tracing::warn!(
                            field = %field.name,
                            expr = %compute.expr,
                            error = %err,
                            "compute expression does not parse; field will stay empty"
                        );
                    }
                }
            }
            self.compute_inputs
                .insert(field.name.clone(), compute.resolved_dependencies().into_iter().collect());
        }

        for dependency in field.forward_dependencies() {
            self.parsed
                .dependency_graph
                .entry(dependency)
                .or_default()
                .insert(field.name.clone());
        }

        if let Some(default) = &field.default_value {
            self.parsed.default_values.insert(field.name.clone(), default.clone());
        }
        if in_list {
            self.parsed.row_scoped.insert(field.name.clone());
        }
        self.parsed.field_map.insert(field.name.clone(), self.parsed.all_fields.len());
        self.parsed.all_fields.push(field.clone());
        Ok(())
    }

    /// Compiles a pattern once per distinct source.
    fn compile_pattern(&mut self, field: &str, source: &str) -> Result<(), SchemaError> {
        if self.parsed.patterns.contains_key(source) {
            return Ok(());
        }
        let regex = Regex::new(&regex_source(source)).map_err(|err| {
            SchemaError::InvalidPattern {
                field: field.to_string(),
                pattern: source.to_string(),
                reason: err.to_string(),
            }
        })?;
        self.parsed.patterns.insert(source.to_string(), regex);
        Ok(())
    }
}

/// Accepts `/body/flags` literals as well as bare pattern sources.
fn regex_source(source: &str) -> String {
    let Some(body) = source.strip_prefix('/') else {
        return source.to_string();
    };
    let Some(end) = body.rfind('/') else {
        return source.to_string();
    };
    let (pattern, flags) = (&body[.. end], &body[end + 1 ..]);
    let inline: String = flags.chars().filter(|flag| matches!(flag, 'i' | 'm' | 's')).collect();
    if inline.is_empty() { pattern.to_string() } else { format!("(?{inline}){pattern}") }
}

// ============================================================================
// SECTION: Compute Ordering
// ============================================================================

/// Visit state during cycle detection.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the current path.
    Active,
    /// Fully ordered.
    Done,
}

/// Orders computed fields so inputs come first; rejects cycles.
fn topological_order(
    inputs: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>, SchemaError> {
    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
    let mut order = Vec::with_capacity(inputs.len());
    let mut path = Vec::new();
    for name in inputs.keys() {
        visit_computed(name, inputs, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

/// Depth-first visit of one computed field.
fn visit_computed<'a>(
    name: &'a str,
    inputs: &'a BTreeMap<String, BTreeSet<String>>,
    marks: &mut BTreeMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    order: &mut Vec<String>,
) -> Result<(), SchemaError> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Active) => {
            let start = path.iter().position(|entry| *entry == name).unwrap_or(0);
            let mut cycle: Vec<String> = path[start ..].iter().map(ToString::to_string).collect();
            cycle.push(name.to_string());
            return Err(SchemaError::ComputeCycle {
                path: cycle,
            });
        }
        None => {}
    }

    marks.insert(name, Mark::Active);
    path.push(name);
    if let Some(deps) = inputs.get(name) {
        for dep in deps.iter().filter(|dep| inputs.contains_key(dep.as_str())) {
            visit_computed(dep, inputs, marks, path, order)?;
        }
    }
    path.pop();
    marks.insert(name, Mark::Done);
    order.push(name.to_string());
    Ok(())
}

// ============================================================================
// SECTION: Graph Queries
// ============================================================================

/// Returns every field transitively affected by a change to `name`.
///
/// Breadth-first over reverse edges; `name` itself is never included.
#[must_use]
pub fn get_downstream_fields(name: &str, graph: &DependencyGraph) -> BTreeSet<String> {
    let mut affected = BTreeSet::new();
    let mut queue = VecDeque::from([name]);
    while let Some(current) = queue.pop_front() {
        let Some(dependents) = graph.get(current) else {
            continue;
        };
        for dependent in dependents {
            if dependent != name && affected.insert(dependent.clone()) {
                queue.push_back(dependent);
            }
        }
    }
    affected
}

/// Overlays caller-supplied values on the schema defaults.
#[must_use]
pub fn merge_default_values(parsed: &ParsedSchema, external: &Values) -> Values {
    let mut merged = parsed.default_values.clone();
    merged.extend(external.iter().map(|(key, value)| (key.clone(), value.clone())));
    merged
}

// ============================================================================
// SECTION: Tests
// ============================================================================
