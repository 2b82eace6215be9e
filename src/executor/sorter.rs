//! In-memory result ordering
//!
//! Used when the chosen strategy does not already yield results in the
//! requested order. The sort is stable; missing fields sort first, then
//! null < bool < number < string.

use std::cmp::Ordering;

use serde_json::Value;

use crate::planner::OrderBy;
use crate::store::DocumentSnapshot;

/// Sorts materialized documents
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts documents by the ordering field; `descending` reverses.
    pub fn sort(docs: &mut [DocumentSnapshot], order: &OrderBy) {
        docs.sort_by(|a, b| {
            let ordering = Self::compare_values(a.get_field(&order.field), b.get_field(&order.field));
            if order.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a_val), Some(b_val)) => {
                let rank = |v: &Value| -> u8 {
                    match v {
                        Value::Null => 0,
                        Value::Bool(_) => 1,
                        Value::Number(_) => 2,
                        Value::String(_) => 3,
                        Value::Array(_) => 4,
                        Value::Object(_) => 5,
                    }
                };

                let a_rank = rank(a_val);
                let b_rank = rank(b_val);
                if a_rank != b_rank {
                    return a_rank.cmp(&b_rank);
                }

                match (a_val, b_val) {
                    (Value::Bool(a_b), Value::Bool(b_b)) => a_b.cmp(b_b),
                    (Value::Number(a_n), Value::Number(b_n)) => {
                        let a_f = a_n.as_f64().unwrap_or(0.0);
                        let b_f = b_n.as_f64().unwrap_or(0.0);
                        a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
                    }
                    (Value::String(a_s), Value::String(b_s)) => a_s.cmp(b_s),
                    _ => Ordering::Equal,
                }
            }
        }
    }
}
