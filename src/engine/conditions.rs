//! Condition evaluation against a submission's data snapshot
//!
//! Conditions are evaluated strictly left-to-right with an implicit `true`
//! accumulator and `and` as the initial combinator. Each condition's own
//! `logical_operator` becomes the combinator for the *next* condition, so
//! the join is attached to the condition that precedes it. This is not
//! conventional operator precedence and must stay this way.

use serde_json::Value;

use crate::model::{Condition, ConditionOperator, LogicalOperator};
use crate::store::DataSnapshot;

/// Evaluate a condition list against a data snapshot.
/// An empty list is true.
pub fn evaluate_conditions(conditions: &[Condition], data: &DataSnapshot) -> bool {
    let mut acc = true;
    let mut pending = LogicalOperator::And;

    for condition in conditions {
        let result = evaluate_one(condition, data);
        acc = match pending {
            LogicalOperator::And => acc && result,
            LogicalOperator::Or => acc || result,
        };
        pending = condition.logical_operator;
    }

    acc
}

/// Evaluate a single condition. A field missing from the snapshot compares
/// false under every operator.
fn evaluate_one(condition: &Condition, data: &DataSnapshot) -> bool {
    let Some(actual) = data.get(&condition.field) else {
        return false;
    };

    match condition.operator {
        ConditionOperator::Equals => loose_eq(actual, &condition.value),
        ConditionOperator::NotEquals => !loose_eq(actual, &condition.value),
        ConditionOperator::Contains => contains(actual, &condition.value),
        ConditionOperator::GreaterThan => numeric_pair(actual, &condition.value)
            .map(|(a, b)| a > b)
            .unwrap_or(false),
        ConditionOperator::LessThan => numeric_pair(actual, &condition.value)
            .map(|(a, b)| a < b)
            .unwrap_or(false),
        // in/not_in require the condition value to be a list; anything else
        // evaluates false.
        ConditionOperator::In => condition
            .value
            .as_array()
            .map(|list| list.iter().any(|v| loose_eq(actual, v)))
            .unwrap_or(false),
        ConditionOperator::NotIn => condition
            .value
            .as_array()
            .map(|list| !list.iter().any(|v| loose_eq(actual, v)))
            .unwrap_or(false),
    }
}

/// Equality with numeric coercion: `5` and `"5"` compare equal, everything
/// else falls back to canonical string comparison.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if let Some((x, y)) = numeric_pair(a, b) {
        return x == y;
    }
    stringify(a) == stringify(b)
}

/// Both values as f64, coercing numeric strings
fn numeric_pair(a: &Value, b: &Value) -> Option<(f64, f64)> {
    Some((as_number(a)?, as_number(b)?))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// String containment for strings, membership for arrays
fn contains(actual: &Value, needle: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|v| loose_eq(v, needle)),
        Value::String(s) => s.contains(&stringify(needle)),
        _ => false,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
