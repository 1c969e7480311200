//! The filter language for bulk queries.
//!
//! A [`Filter`] is a comparison on one field or a boolean combination of
//! other filters, evaluated against a model's field table. A missing
//! field evaluates as JSON `null`. Ordering comparisons are defined for
//! numbers and for strings; everything else orders as "incomparable" and
//! fails the comparison.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use quorum_types::FieldTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Comparison {
        field: String,
        operator: FilterOperator,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Shorthand for a single comparison.
    pub fn field(field: &str, operator: FilterOperator, value: Value) -> Self {
        Filter::Comparison {
            field: field.to_string(),
            operator,
            value,
        }
    }

    pub fn matches(&self, fields: &FieldTable) -> bool {
        match self {
            Filter::Comparison {
                field,
                operator,
                value,
            } => {
                let actual = fields.get(field).unwrap_or(&Value::Null);
                match operator {
                    FilterOperator::Eq => actual == value,
                    FilterOperator::NotEq => actual != value,
                    FilterOperator::Lt => {
                        compare_values(actual, value) == Some(Ordering::Less)
                    }
                    FilterOperator::Gt => {
                        compare_values(actual, value) == Some(Ordering::Greater)
                    }
                    FilterOperator::LtEq => matches!(
                        compare_values(actual, value),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    FilterOperator::GtEq => matches!(
                        compare_values(actual, value),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                }
            }
            Filter::And(parts) => parts.iter().all(|part| part.matches(fields)),
            Filter::Or(parts) => parts.iter().any(|part| part.matches(fields)),
            Filter::Not(inner) => !inner.matches(fields),
        }
    }
}

/// Order two JSON values, where possible: numbers against numbers,
/// strings against strings. Anything else is incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            a.as_f64().and_then(|a| b.as_f64().map(|b| a.total_cmp(&b)))
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
