//! Where-clause evaluation on raw values
//!
//! Applied to materialized documents by every strategy, so an index can
//! only narrow a result, never widen it. No type coercion: equality is
//! exact, ordering is the natural order of the stored values, and a
//! missing or null left-hand side makes a clause false, never true.

use std::cmp::Ordering;

use serde_json::Value;

use crate::planner::{Op, WhereClause};

/// Evaluates where-clauses against documents
pub struct ClauseFilter;

impl ClauseFilter {
    /// Checks whether a document satisfies every clause (AND semantics)
    pub fn matches(document: &Value, clauses: &[WhereClause]) -> bool {
        clauses
            .iter()
            .all(|clause| Self::matches_clause(document, clause))
    }

    fn matches_clause(document: &Value, clause: &WhereClause) -> bool {
        let field_value = match document.get(&clause.field) {
            Some(v) if !v.is_null() => v,
            // Missing fields behave as null; null never matches
            _ => return false,
        };

        match clause.op {
            Op::Eq => field_value == &clause.value,
            Op::Gte => Self::compares(field_value, &clause.value, &[Ordering::Greater, Ordering::Equal]),
            Op::Gt => Self::compares(field_value, &clause.value, &[Ordering::Greater]),
            Op::Lte => Self::compares(field_value, &clause.value, &[Ordering::Less, Ordering::Equal]),
            Op::Lt => Self::compares(field_value, &clause.value, &[Ordering::Less]),
            Op::Range => {
                let lower = Self::compares(
                    field_value,
                    &clause.value,
                    &[Ordering::Greater, Ordering::Equal],
                );
                let upper = match &clause.end_value {
                    Some(end) => {
                        Self::compares(field_value, end, &[Ordering::Less, Ordering::Equal])
                    }
                    None => true,
                };
                lower && upper
            }
        }
    }

    fn compares(actual: &Value, bound: &Value, accepted: &[Ordering]) -> bool {
        match Self::compare_raw(actual, bound) {
            Some(ordering) => accepted.contains(&ordering),
            None => false,
        }
    }

    /// Natural order of stored values: numbers with numbers, strings with
    /// strings. Anything else is non-comparable.
    fn compare_raw(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Number(a_n), Value::Number(b_n)) => {
                let a_f = a_n.as_f64()?;
                let b_f = b_n.as_f64()?;
                a_f.partial_cmp(&b_f)
            }
            (Value::String(a_s), Value::String(b_s)) => Some(a_s.cmp(b_s)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equality_no_coercion() {
        let doc = json!({"value": 123});

        assert!(ClauseFilter::matches(&doc, &[WhereClause::eq("value", json!(123))]));
        assert!(!ClauseFilter::matches(&doc, &[WhereClause::eq("value", json!("123"))]));
    }

    #[test]
    fn test_ordering_operators() {
        let doc = json!({"age": 25});

        assert!(ClauseFilter::matches(&doc, &[WhereClause::gte("age", json!(25))]));
        assert!(!ClauseFilter::matches(&doc, &[WhereClause::gt("age", json!(25))]));
        assert!(ClauseFilter::matches(&doc, &[WhereClause::lte("age", json!(25))]));
        assert!(!ClauseFilter::matches(&doc, &[WhereClause::lt("age", json!(25))]));
    }

    #[test]
    fn test_range_operator() {
        let doc = json!({"age": 25});

        assert!(ClauseFilter::matches(
            &doc,
            &[WhereClause::range("age", json!(20), json!(30))]
        ));
        assert!(!ClauseFilter::matches(
            &doc,
            &[WhereClause::range("age", json!(26), json!(30))]
        ));
        assert!(!ClauseFilter::matches(
            &doc,
            &[WhereClause::range("age", json!(10), json!(24))]
        ));
    }

    #[test]
    fn test_string_ordering() {
        let doc = json!({"name": "mira"});
        assert!(ClauseFilter::matches(&doc, &[WhereClause::gte("name", json!("m"))]));
        assert!(!ClauseFilter::matches(&doc, &[WhereClause::lt("name", json!("m"))]));
    }

    #[test]
    fn test_missing_and_null_never_match() {
        let doc = json!({"name": null});

        assert!(!ClauseFilter::matches(&doc, &[WhereClause::eq("name", json!("Ada"))]));
        assert!(!ClauseFilter::matches(&doc, &[WhereClause::gte("age", json!(0))]));
    }

    #[test]
    fn test_non_comparable_is_false() {
        let doc = json!({"age": "not a number"});
        assert!(!ClauseFilter::matches(&doc, &[WhereClause::gte("age", json!(18))]));
    }

    #[test]
    fn test_conjunction() {
        let doc = json!({"age": 25, "city": "oslo"});

        let clauses = vec![
            WhereClause::gte("age", json!(18)),
            WhereClause::eq("city", json!("oslo")),
        ];
        assert!(ClauseFilter::matches(&doc, &clauses));

        let clauses = vec![
            WhereClause::gte("age", json!(18)),
            WhereClause::eq("city", json!("lund")),
        ];
        assert!(!ClauseFilter::matches(&doc, &clauses));
    }
}
