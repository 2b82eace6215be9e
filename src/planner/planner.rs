//! Query planner
//!
//! Selects an index strategy for a logical query descriptor. Strategies
//! are tried in strict order; the first eligible one wins:
//!
//! 1. Composite full match - every field of a registered composite index
//!    appears as a where-clause field
//! 2. Single-field ordered index on the `orderBy` field
//! 3. Equality intersection over single-field indexes, built on demand
//! 4. Full scan
//!
//! Planning may load or build indexes, so it runs against the index
//! manager plus an immutable log snapshot.

use crate::index::{
    canonical_value, composite_key, IndexManager, IndexMeta, KeyType, RANGE_SCAN_MAX,
};
use crate::storage::LogSnapshot;

use super::ast::{Op, QueryDescriptor};
use super::errors::PlannerResult;

/// Chosen execution strategy with its prepared index inputs
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStrategy {
    /// Range scan over a composite index between two composite keys
    CompositePrefix {
        index: String,
        start_key: String,
        end_key: String,
    },
    /// Range scan over the `orderBy` field's index
    SingleFieldOrdered {
        index: String,
        field: String,
        start_key: Option<String>,
        end_key: Option<String>,
        start_inclusive: bool,
        end_inclusive: bool,
        descending: bool,
    },
    /// Exact postings per equality clause, intersected smallest-first
    EqualityIntersection {
        /// `(index name, canonical key)` per equality clause
        lookups: Vec<(String, String)>,
    },
    /// Read every live document and filter in memory
    FullScan,
}

impl PlanStrategy {
    /// Short name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStrategy::CompositePrefix { .. } => "COMPOSITE_PREFIX",
            PlanStrategy::SingleFieldOrdered { .. } => "SINGLE_FIELD_ORDERED",
            PlanStrategy::EqualityIntersection { .. } => "EQUALITY_INTERSECTION",
            PlanStrategy::FullScan => "FULL_SCAN",
        }
    }
}

/// Immutable query plan
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Selected strategy
    pub strategy: PlanStrategy,
    /// Candidate cap: `Some` for indexed strategies, the descriptor's own
    /// limit (possibly unbounded) for a full scan
    pub limit: Option<usize>,
}

/// Planner configured with the store's defaults
pub struct QueryPlanner {
    indexed_limit: usize,
    use_worker: bool,
}

impl QueryPlanner {
    /// Creates a planner with the default candidate cap for indexed
    /// strategies and the rebuild-worker policy
    pub fn new(indexed_limit: usize, use_worker: bool) -> Self {
        Self {
            indexed_limit,
            use_worker,
        }
    }

    /// Plans `qd`, loading or building indexes as needed.
    pub async fn plan(
        &self,
        qd: &QueryDescriptor,
        manager: &mut IndexManager,
        snapshot: &LogSnapshot,
    ) -> PlannerResult<QueryPlan> {
        let indexed_limit = Some(qd.limit.unwrap_or(self.indexed_limit));

        if let Some(strategy) = self.plan_composite(qd, manager, snapshot).await? {
            return Ok(QueryPlan {
                strategy,
                limit: indexed_limit,
            });
        }

        if let Some(strategy) = self.plan_single_field_ordered(qd, manager, snapshot).await? {
            return Ok(QueryPlan {
                strategy,
                limit: indexed_limit,
            });
        }

        if let Some(strategy) = self.plan_equality_intersection(qd, manager, snapshot).await? {
            return Ok(QueryPlan {
                strategy,
                limit: indexed_limit,
            });
        }

        Ok(QueryPlan {
            strategy: PlanStrategy::FullScan,
            limit: qd.limit,
        })
    }

    /// Strategy 1: a composite index whose every field is constrained.
    ///
    /// Per component: `==`/`>=` contribute the canonical value to the
    /// start key, anything else the empty string; `==`/`<=` contribute
    /// the canonical value to the end key, anything else the clause's
    /// `end_value` when supplied, otherwise U+FFFF.
    async fn plan_composite(
        &self,
        qd: &QueryDescriptor,
        manager: &mut IndexManager,
        snapshot: &LogSnapshot,
    ) -> PlannerResult<Option<PlanStrategy>> {
        let fields = qd.clause_fields();
        let Some(meta) = manager.composite_match(&fields) else {
            return Ok(None);
        };
        manager
            .ensure_index(meta.clone(), snapshot.clone(), self.use_worker)
            .await?;

        let mut start_parts = Vec::with_capacity(meta.fields.len());
        let mut end_parts = Vec::with_capacity(meta.fields.len());

        for (field, key_type) in meta.fields.iter().zip(meta.key_types.iter()) {
            let clause = qd
                .clause_on(field)
                .expect("composite match guarantees a clause per field");

            let start = match clause.op {
                Op::Eq | Op::Gte => canonical_value(&clause.value, *key_type)?,
                _ => String::new(),
            };
            let end = match clause.op {
                Op::Eq | Op::Lte => canonical_value(&clause.value, *key_type)?,
                _ => match &clause.end_value {
                    Some(end_value) => canonical_value(end_value, *key_type)?,
                    None => RANGE_SCAN_MAX.to_string(),
                },
            };
            start_parts.push(start);
            end_parts.push(end);
        }

        Ok(Some(PlanStrategy::CompositePrefix {
            index: meta.name(),
            start_key: composite_key(&start_parts),
            end_key: composite_key(&end_parts),
        }))
    }

    /// Strategy 2: an ordered single-field index on the `orderBy` field.
    async fn plan_single_field_ordered(
        &self,
        qd: &QueryDescriptor,
        manager: &mut IndexManager,
        snapshot: &LogSnapshot,
    ) -> PlannerResult<Option<PlanStrategy>> {
        let Some(order) = &qd.order_by else {
            return Ok(None);
        };
        let Some(meta) = manager.single_field_meta(&order.field) else {
            return Ok(None);
        };
        if !meta.ordered {
            return Ok(None);
        }
        manager
            .ensure_index(meta.clone(), snapshot.clone(), self.use_worker)
            .await?;

        let key_type = meta.key_types[0];
        let bounds = match qd.clause_on(&order.field) {
            Some(clause) => {
                let key = canonical_value(&clause.value, key_type)?;
                match clause.op {
                    Op::Eq => (Some(key.clone()), Some(key), true, true),
                    Op::Gte => (Some(key), None, true, true),
                    Op::Gt => (Some(key), None, false, true),
                    Op::Lte => (None, Some(key), true, true),
                    Op::Lt => (None, Some(key), true, false),
                    Op::Range => {
                        let end = match &clause.end_value {
                            Some(end_value) => Some(canonical_value(end_value, key_type)?),
                            None => None,
                        };
                        (Some(key), end, true, true)
                    }
                }
            }
            None => (None, None, true, true),
        };

        Ok(Some(PlanStrategy::SingleFieldOrdered {
            index: meta.name(),
            field: order.field.clone(),
            start_key: bounds.0,
            end_key: bounds.1,
            start_inclusive: bounds.2,
            end_inclusive: bounds.3,
            descending: order.descending,
        }))
    }

    /// Strategy 3: intersect exact postings of every equality clause,
    /// building missing single-field indexes on demand with the `auto`
    /// key type.
    async fn plan_equality_intersection(
        &self,
        qd: &QueryDescriptor,
        manager: &mut IndexManager,
        snapshot: &LogSnapshot,
    ) -> PlannerResult<Option<PlanStrategy>> {
        let equalities = qd.equality_clauses();
        if equalities.is_empty() {
            return Ok(None);
        }

        let mut lookups = Vec::with_capacity(equalities.len());
        for clause in equalities {
            let meta = manager
                .single_field_meta(&clause.field)
                .unwrap_or_else(|| IndexMeta::single(&clause.field, KeyType::Auto));
            manager
                .ensure_index(meta.clone(), snapshot.clone(), self.use_worker)
                .await?;
            let key = canonical_value(&clause.value, meta.key_types[0])?;
            lookups.push((meta.name(), key));
        }

        Ok(Some(PlanStrategy::EqualityIntersection { lookups }))
    }
}
