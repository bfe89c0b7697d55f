// crates/form-rules-logic/src/condition.rs
// ============================================================================
// Module: Condition Tree
// Description: Declarative boolean conditions over a value snapshot.
// Purpose: Define `Condition`, its JSON reading rules, evaluation, and
//          static dependency extraction.
// Dependencies: crate::{comparator, value}, serde, serde_json, smallvec, tracing
// ============================================================================

//! ## Overview
//! A condition is a closed tree: field comparisons at the leaves, combined
//! with `and`/`or`/`not`. Code-only predicates are allowed as leaves but must
//! declare the fields they read so the watch set stays sound. Any JSON shape
//! that cannot be read becomes [`Condition::Invalid`], which evaluates to
//! `false` and reads nothing, keeping evaluation total.
//!
//! ### JSON forms
//! - `{"field": "age", "gte": 18}` (several operator keys are AND-ed)
//! - `{"field": "age", "operator": "gte", "value": 18}`
//! - `{"and": [...]}`, `{"or": [...]}`, `{"not": {...}}`

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Deserializer;
use serde_json::Value;
use smallvec::SmallVec;

use crate::comparator::Comparator;
use crate::value::Values;
use crate::value::get_path;

// ============================================================================
// SECTION: Predicate Leaves
// ============================================================================

/// Signature of a code-only predicate.
pub type PredicateFn = dyn Fn(&Values) -> bool + Send + Sync;

/// Opaque predicate paired with the fields it reads.
///
/// # Invariants
/// - `dependencies` must list every field the closure reads. An incomplete
///   list leaves the host's watch set short and derived state goes stale.
#[derive(Clone)]
pub struct Predicate {
    /// Fields the predicate reads.
    dependencies: Vec<String>,
    /// The predicate body.
    func: Arc<PredicateFn>,
}

impl Predicate {
    /// Creates a predicate with its declared dependency list.
    pub fn new<I, S, F>(dependencies: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Values) -> bool + Send + Sync + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            func: Arc::new(func),
        }
    }

    /// Returns the declared dependencies.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Invokes the predicate against a snapshot.
    #[must_use]
    pub fn call(&self, values: &Values) -> bool {
        (self.func)(values)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func) && self.dependencies == other.dependencies
    }
}

// ============================================================================
// SECTION: Condition Definition
// ============================================================================

/// Comparison of one field against a literal operand.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    /// Dot-path of the field being tested.
    pub field: String,
    /// Comparator applied to the field value.
    pub comparator: Comparator,
    /// Literal operand (array for `in`/`notIn`, bool for emptiness checks).
    pub operand: Value,
}

/// Declarative condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Single field comparison.
    Field(FieldCondition),
    /// Every child must hold; empty is `true`.
    All(SmallVec<[Box<Self>; 4]>),
    /// At least one child must hold; empty is `false`.
    Any(SmallVec<[Box<Self>; 4]>),
    /// Negation of the child.
    Not(Box<Self>),
    /// Code-only predicate with declared dependencies.
    Predicate(Predicate),
    /// Unreadable shape kept for diagnostics; always `false`.
    Invalid(Value),
}

// ============================================================================
// SECTION: Construction
// ============================================================================

impl Condition {
    /// Creates a field comparison.
    pub fn field(field: impl Into<String>, comparator: Comparator, operand: Value) -> Self {
        Self::Field(FieldCondition {
            field: field.into(),
            comparator,
            operand,
        })
    }

    /// Creates a conjunction.
    #[must_use]
    pub fn all(children: Vec<Self>) -> Self {
        Self::All(children.into_iter().map(Box::new).collect())
    }

    /// Creates a disjunction.
    #[must_use]
    pub fn any(children: Vec<Self>) -> Self {
        Self::Any(children.into_iter().map(Box::new).collect())
    }

    /// Creates a negation.
    #[must_use]
    pub fn negate(child: Self) -> Self {
        Self::Not(Box::new(child))
    }

    /// Creates a predicate leaf with declared dependencies.
    pub fn predicate<I, S, F>(dependencies: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Values) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Predicate::new(dependencies, func))
    }

    /// Reads a condition from its JSON form. Never fails.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let condition = read_condition(value);
        if condition.has_invalid() {
            tracing::warn!(shape = %value, "unrecognised condition shape evaluates to false");
        }
        condition
    }

    /// Returns true when this node or any descendant is [`Condition::Invalid`].
    #[must_use]
    pub fn has_invalid(&self) -> bool {
        match self {
            Self::Invalid(_) => true,
            Self::All(children) | Self::Any(children) => {
                children.iter().any(|child| child.has_invalid())
            }
            Self::Not(child) => child.has_invalid(),
            Self::Field(_) | Self::Predicate(_) => false,
        }
    }

    /// Returns the nesting depth of the tree; a leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::All(children) | Self::Any(children) => {
                1 + children.iter().map(|child| child.depth()).max().unwrap_or(0)
            }
            Self::Not(child) => 1 + child.depth(),
            Self::Field(_) | Self::Predicate(_) | Self::Invalid(_) => 1,
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

/// Reads one JSON node without logging.
fn read_condition(value: &Value) -> Condition {
    let Value::Object(map) = value else {
        return Condition::Invalid(value.clone());
    };

    if let Some(children) = map.get("and") {
        return read_children(children)
            .map_or_else(|| Condition::Invalid(value.clone()), Condition::All);
    }
    if let Some(children) = map.get("or") {
        return read_children(children)
            .map_or_else(|| Condition::Invalid(value.clone()), Condition::Any);
    }
    if let Some(child) = map.get("not") {
        return Condition::Not(Box::new(read_condition(child)));
    }

    let Some(Value::String(field)) = map.get("field") else {
        return Condition::Invalid(value.clone());
    };

    if let Some(Value::String(operator)) = map.get("operator") {
        return Comparator::from_key(operator).map_or_else(
            || Condition::Invalid(value.clone()),
            |comparator| {
                let operand = map.get("value").cloned().unwrap_or(Value::Bool(true));
                Condition::field(field.clone(), comparator, operand)
            },
        );
    }

    let mut leaves: Vec<Condition> = Comparator::ALL
        .into_iter()
        .filter_map(|comparator| {
            map.get(comparator.key())
                .map(|operand| Condition::field(field.clone(), comparator, operand.clone()))
        })
        .collect();

    match leaves.len() {
        0 => Condition::Invalid(value.clone()),
        1 => leaves.remove(0),
        _ => Condition::all(leaves),
    }
}

/// Reads a JSON array of child conditions.
fn read_children(value: &Value) -> Option<SmallVec<[Box<Condition>; 4]>> {
    let Value::Array(items) = value else {
        return None;
    };
    Some(items.iter().map(|item| Box::new(read_condition(item))).collect())
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

impl Condition {
    /// Evaluates the condition with short-circuiting.
    #[must_use]
    pub fn eval(&self, values: &Values) -> bool {
        match self {
            Self::Field(leaf) => {
                leaf.comparator.apply(get_path(values, &leaf.field), &leaf.operand)
            }

            // Short-circuit AND: exit on first failure
            Self::All(children) => children.iter().all(|child| child.eval(values)),

            // Short-circuit OR: exit on first success
            Self::Any(children) => children.iter().any(|child| child.eval(values)),

            Self::Not(child) => !child.eval(values),
            Self::Predicate(predicate) => predicate.call(values),
            Self::Invalid(_) => false,
        }
    }

    /// Adds every field this condition reads to `out`.
    pub fn collect_dependencies(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Field(leaf) => {
                out.insert(leaf.field.clone());
            }
            Self::All(children) | Self::Any(children) => {
                for child in children {
                    child.collect_dependencies(out);
                }
            }
            Self::Not(child) => child.collect_dependencies(out),
            Self::Predicate(predicate) => {
                out.extend(predicate.dependencies().iter().cloned());
            }
            Self::Invalid(_) => {}
        }
    }
}

/// Evaluates an optional condition; an absent condition holds.
#[must_use]
pub fn evaluate(condition: Option<&Condition>, values: &Values) -> bool {
    condition.is_none_or(|condition| condition.eval(values))
}

/// Returns the deduplicated set of fields a condition reads.
#[must_use]
pub fn extract_dependencies(condition: &Condition) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    condition.collect_dependencies(&mut out);
    out
}
