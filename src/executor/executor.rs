//! Plan execution
//!
//! Materializes a query plan against the record log and the loaded
//! indexes: candidate ids from the strategy, a positioned read per id
//! (stale entries dropped silently), the raw-value residual filter, and
//! in-memory ordering when the strategy does not already provide it.
//!
//! Limit semantics: indexed strategies cap the candidate id set; a full
//! scan filters and sorts first, then truncates.

use std::collections::HashSet;

use crate::index::IndexManager;
use crate::planner::{PlanStrategy, QueryDescriptor, QueryPlan};
use crate::storage::{RecordLog, StorageResult};
use crate::store::{DocumentSnapshot, QuerySnapshot};

use super::filters::ClauseFilter;
use super::sorter::ResultSorter;

/// Executes prepared query plans
pub struct QueryExecutor;

impl QueryExecutor {
    /// Runs `plan` for `qd`, returning materialized documents.
    pub fn execute(
        plan: &QueryPlan,
        qd: &QueryDescriptor,
        log: &RecordLog,
        manager: &IndexManager,
    ) -> StorageResult<QuerySnapshot> {
        let candidates = Self::candidate_ids(plan, log, manager);

        let mut docs = Vec::with_capacity(candidates.len().min(1024));
        for id in candidates {
            let Some(record) = log.get_by_id(&id)? else {
                continue;
            };
            if ClauseFilter::matches(&record, &qd.wheres) {
                docs.push(DocumentSnapshot::new(id, record));
            }
        }

        if let Some(order) = &qd.order_by {
            // A single-field ordered scan already yields key order
            let already_ordered =
                matches!(plan.strategy, PlanStrategy::SingleFieldOrdered { .. });
            if !already_ordered {
                ResultSorter::sort(&mut docs, order);
            }
        }

        if matches!(plan.strategy, PlanStrategy::FullScan) {
            if let Some(limit) = plan.limit {
                docs.truncate(limit);
            }
        }

        Ok(QuerySnapshot::new(docs))
    }

    fn candidate_ids(plan: &QueryPlan, log: &RecordLog, manager: &IndexManager) -> Vec<String> {
        let limit = plan.limit.unwrap_or(usize::MAX);

        match &plan.strategy {
            PlanStrategy::CompositePrefix {
                index,
                start_key,
                end_key,
            } => manager
                .loaded_index(index)
                .map(|idx| idx.get_range(Some(start_key), Some(end_key), true, true, limit))
                .unwrap_or_default(),

            PlanStrategy::SingleFieldOrdered {
                index,
                start_key,
                end_key,
                start_inclusive,
                end_inclusive,
                descending,
                ..
            } => {
                // Descending scans cap after the reversal so the limit
                // keeps the top of the range, not the bottom
                let scan_limit = if *descending { usize::MAX } else { limit };
                let mut ids = manager
                    .loaded_index(index)
                    .map(|idx| {
                        idx.get_range(
                            start_key.as_deref(),
                            end_key.as_deref(),
                            *start_inclusive,
                            *end_inclusive,
                            scan_limit,
                        )
                    })
                    .unwrap_or_default();
                if *descending {
                    ids.reverse();
                    ids.truncate(limit);
                }
                ids
            }

            PlanStrategy::EqualityIntersection { lookups } => {
                let mut lists: Vec<Vec<String>> = lookups
                    .iter()
                    .map(|(index, key)| {
                        manager
                            .loaded_index(index)
                            .map(|idx| idx.get_exact(key))
                            .unwrap_or_default()
                    })
                    .collect();
                lists.sort_by_key(Vec::len);

                let Some((smallest, rest)) = lists.split_first() else {
                    return Vec::new();
                };
                let rest_sets: Vec<HashSet<&String>> =
                    rest.iter().map(|list| list.iter().collect()).collect();

                let mut ids: Vec<String> = smallest
                    .iter()
                    .filter(|id| rest_sets.iter().all(|set| set.contains(*id)))
                    .cloned()
                    .collect();
                ids.truncate(limit);
                ids
            }

            PlanStrategy::FullScan => log.live_ids(),
        }
    }
}
