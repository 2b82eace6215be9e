//! Query execution
//!
//! Turns a prepared plan into materialized documents: candidate
//! selection, residual filtering, and ordering.

#[allow(clippy::module_inception)]
mod executor;
mod filters;
mod sorter;

pub use executor::QueryExecutor;
pub use filters::ClauseFilter;
pub use sorter::ResultSorter;
