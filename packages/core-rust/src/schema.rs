use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::messages::base::{PredicateNode, PredicateOp};
use crate::types::Value;

/// Schema definition for a map: field names, required-ness, and a version
/// for migration compatibility checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSchema {
    /// Schema version for migrations and compatibility checks.
    pub version: u32,
    /// Field definitions that comprise this map's schema.
    pub fields: Vec<FieldDef>,
}

impl MapSchema {
    /// Validates a record's fields against this schema, collecting every
    /// violation rather than failing on the first.
    #[must_use]
    pub fn validate(&self, record: &BTreeMap<String, Value>) -> ValidationResult {
        let mut errors = Vec::new();
        for field in &self.fields {
            if field.required && !record.contains_key(&field.name) {
                errors.push(format!("missing required field `{}`", field.name));
            }
        }
        if errors.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid { errors }
        }
    }
}

/// Single field definition within a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    /// Name of the field.
    pub name: String,
    /// Whether the field must be present in every record.
    pub required: bool,
}

/// Result of validating a value against a schema.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    /// The value conforms to the schema.
    Valid,
    /// The value violates one or more schema constraints.
    Invalid {
        /// Human-readable descriptions of each validation failure.
        errors: Vec<String>,
    },
}

/// Row-level filter predicate for sync shapes, sharing its expression tree
/// with the client query predicate ([`PredicateNode`]) so the same filter
/// language covers both continuous queries and partial replication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predicate {
    pub root: PredicateNode,
}

impl Predicate {
    #[must_use]
    pub fn new(root: PredicateNode) -> Self {
        Self { root }
    }

    /// Evaluates this predicate against a record's fields.
    ///
    /// Missing attributes and type mismatches evaluate to `false` rather
    /// than erroring, consistent with SQL `NULL`-comparison semantics.
    #[must_use]
    pub fn matches(&self, record: &BTreeMap<String, Value>) -> bool {
        eval(&self.root, record)
    }
}

fn eval(node: &PredicateNode, record: &BTreeMap<String, Value>) -> bool {
    match node.op {
        PredicateOp::And => node
            .children
            .as_deref()
            .unwrap_or_default()
            .iter()
            .all(|child| eval(child, record)),
        PredicateOp::Or => node
            .children
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|child| eval(child, record)),
        PredicateOp::Not => node
            .children
            .as_deref()
            .and_then(|children| children.first())
            .is_some_and(|child| !eval(child, record)),
        _ => {
            let Some(attribute) = node.attribute.as_ref() else {
                return false;
            };
            let Some(actual) = record.get(attribute) else {
                return false;
            };
            let Some(expected) = node.value.as_ref() else {
                return false;
            };
            eval_leaf(node.op.clone(), actual, expected)
        }
    }
}

fn eval_leaf(op: PredicateOp, actual: &Value, expected: &rmpv::Value) -> bool {
    match op {
        PredicateOp::Eq => values_equal(actual, expected),
        PredicateOp::Neq => !values_equal(actual, expected),
        PredicateOp::Gt => compare_numeric(actual, expected) == Some(Ordering::Greater),
        PredicateOp::Gte => matches!(
            compare_numeric(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        PredicateOp::Lt => compare_numeric(actual, expected) == Some(Ordering::Less),
        PredicateOp::Lte => matches!(
            compare_numeric(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        PredicateOp::Like => match (actual, expected.as_str()) {
            (Value::String(s), Some(pattern)) => like_match(s, pattern),
            _ => false,
        },
        PredicateOp::Regex => match (actual, expected.as_str()) {
            (Value::String(s), Some(pattern)) => {
                regex::Regex::new(pattern).is_ok_and(|re| re.is_match(s))
            }
            _ => false,
        },
        PredicateOp::And | PredicateOp::Or | PredicateOp::Not => {
            unreachable!("boolean operators are handled in eval(), not eval_leaf()")
        }
    }
}

fn values_equal(actual: &Value, expected: &rmpv::Value) -> bool {
    match (actual, expected) {
        (Value::Null, rmpv::Value::Nil) => true,
        (Value::Bool(a), rmpv::Value::Boolean(b)) => a == b,
        (Value::Int(a), rmpv::Value::Integer(b)) => b.as_i64().is_some_and(|b| *a == b),
        (Value::Float(a), rmpv::Value::F64(b)) => a == b,
        (Value::String(a), rmpv::Value::String(b)) => b.as_str() == Some(a.as_str()),
        (Value::Bytes(a), rmpv::Value::Binary(b)) => a == b,
        _ => false,
    }
}

fn compare_numeric(actual: &Value, expected: &rmpv::Value) -> Option<Ordering> {
    let actual = match actual {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => return None,
    };
    let expected = expected.as_f64()?;
    actual.partial_cmp(&expected)
}

/// Minimal SQL `LIKE` matcher: `%` matches any run of characters, `_`
/// matches exactly one.
fn like_match(value: &str, pattern: &str) -> bool {
    fn matches(value: &[char], pattern: &[char]) -> bool {
        match pattern.first() {
            None => value.is_empty(),
            Some('%') => {
                matches(value, &pattern[1..])
                    || (!value.is_empty() && matches(&value[1..], pattern))
            }
            Some('_') => !value.is_empty() && matches(&value[1..], &pattern[1..]),
            Some(c) => value.first() == Some(c) && matches(&value[1..], &pattern[1..]),
        }
    }
    let value: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    matches(&value, &pattern)
}

/// Defines what subset of a map's data a client receives.
/// Used for partial replication (shapes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncShape {
    /// Name of the map this shape applies to.
    pub map_name: String,
    /// Optional row-level filter to restrict which records are synced.
    pub filter: Option<Predicate>,
    /// Optional column projection to restrict which fields are synced.
    pub fields: Option<Vec<String>>,
    /// Optional maximum number of records to sync.
    pub limit: Option<usize>,
}
