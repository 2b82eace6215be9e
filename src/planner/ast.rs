//! Logical query descriptor
//!
//! A query is a conjunction of where-clauses, an optional single-field
//! ordering, and an optional result limit. The descriptor is purely
//! logical; strategy selection happens in the planner.

use serde_json::Value;

/// Where-clause operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Equality on the raw value
    Eq,
    /// Greater than or equal
    Gte,
    /// Greater than
    Gt,
    /// Less than or equal
    Lte,
    /// Less than
    Lt,
    /// Closed interval between `value` and `end_value`
    Range,
}

impl Op {
    /// Returns true for the equality operator
    pub fn is_equality(&self) -> bool {
        matches!(self, Op::Eq)
    }

    /// Operator name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Gte => ">=",
            Op::Gt => ">",
            Op::Lte => "<=",
            Op::Lt => "<",
            Op::Range => "range",
        }
    }
}

/// One predicate over a document field
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// Field name
    pub field: String,
    /// Operator
    pub op: Op,
    /// Comparison value (range start for `Range`)
    pub value: Value,
    /// Range end for `Range`, unused otherwise
    pub end_value: Option<Value>,
}

impl WhereClause {
    fn new(field: impl Into<String>, op: Op, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
            end_value: None,
        }
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, Op::Eq, value)
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, Op::Gte, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, Op::Gt, value)
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, Op::Lte, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, Op::Lt, value)
    }

    /// `value <= field <= end`
    pub fn range(field: impl Into<String>, start: Value, end: Value) -> Self {
        Self {
            field: field.into(),
            op: Op::Range,
            value: start,
            end_value: Some(end),
        }
    }
}

/// Result ordering over one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field to order by
    pub field: String,
    /// Reverse the natural ascending order
    pub descending: bool,
}

impl OrderBy {
    /// Ascending order on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending order on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Logical query over one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    /// Conjunction of predicates
    pub wheres: Vec<WhereClause>,
    /// Optional result ordering
    pub order_by: Option<OrderBy>,
    /// Optional result cap
    pub limit: Option<usize>,
}

impl QueryDescriptor {
    /// Empty descriptor (matches every document)
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate
    pub fn filter(mut self, clause: WhereClause) -> Self {
        self.wheres.push(clause);
        self
    }

    /// Adds an equality predicate
    pub fn filter_eq(self, field: impl Into<String>, value: Value) -> Self {
        self.filter(WhereClause::eq(field, value))
    }

    /// Sets the ordering
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    /// Sets the result cap
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Fields named by the where-clauses, in clause order
    pub fn clause_fields(&self) -> Vec<&str> {
        self.wheres.iter().map(|c| c.field.as_str()).collect()
    }

    /// Clauses using the equality operator
    pub fn equality_clauses(&self) -> Vec<&WhereClause> {
        self.wheres.iter().filter(|c| c.op.is_equality()).collect()
    }

    /// First clause constraining `field`, if any
    pub fn clause_on(&self, field: &str) -> Option<&WhereClause> {
        self.wheres.iter().find(|c| c.field == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_builder() {
        let qd = QueryDescriptor::new()
            .filter_eq("name", json!("Ada"))
            .filter(WhereClause::gte("age", json!(18)))
            .order_by(OrderBy::asc("age"))
            .with_limit(10);

        assert_eq!(qd.wheres.len(), 2);
        assert_eq!(qd.clause_fields(), vec!["name", "age"]);
        assert_eq!(qd.equality_clauses().len(), 1);
        assert_eq!(qd.limit, Some(10));
        assert!(!qd.order_by.as_ref().unwrap().descending);
    }

    #[test]
    fn test_range_clause_carries_end() {
        let clause = WhereClause::range("age", json!(20), json!(35));
        assert_eq!(clause.op, Op::Range);
        assert_eq!(clause.end_value, Some(json!(35)));
    }

    #[test]
    fn test_clause_on_returns_first_match() {
        let qd = QueryDescriptor::new()
            .filter(WhereClause::gte("age", json!(1)))
            .filter(WhereClause::lte("age", json!(9)));

        assert_eq!(qd.clause_on("age").unwrap().op, Op::Gte);
        assert!(qd.clause_on("name").is_none());
    }
}
