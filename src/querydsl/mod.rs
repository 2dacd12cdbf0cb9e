//! Search query DSL.
//!
//! The predicate tree a physical plan filters with. Nodes are immutable
//! and share sub-trees through `Arc`; rewrites return new nodes and hand
//! back the original `Arc` untouched when nothing underneath changed.

mod query;

pub use query::{
    BoolQuery, ExistsQuery, MatchAllQuery, NestedQuery, NotQuery, Query, RangeBound, RangeQuery,
    Scalar, TermQuery,
};

use std::fmt;

use serde_json::Value;

/// Source position of the SQL fragment a query node was derived from.
/// Diagnostics only; never part of node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Sort directive scoped to a nested path, accumulated while translating
/// ORDER BY over nested fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedSortSpec {
    path: String,
    filter: Option<Value>,
}

impl NestedSortSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filter: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn filter(&self) -> Option<&Value> {
        self.filter.as_ref()
    }

    pub fn set_filter(&mut self, filter: Value) {
        self.filter = Some(filter);
    }
}
