//! Execution surface against the document store.
//!
//! The pipeline ends in a [`SearchRequest`]; everything beyond it — the
//! transport, retries, pagination — belongs to the engine implementation.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::catalog::FieldType;

/// Errors reported by the execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("search request failed: {0}")]
    Request(String),

    #[error("search backend unavailable: {0}")]
    Unavailable(String),
}

/// A compiled search request addressed to a single index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub index: String,
    pub query: Value,
    pub size: usize,
    pub sort: Vec<Value>,
    pub source_fields: Vec<String>,
    pub docvalue_fields: Vec<String>,
}

impl SearchRequest {
    /// Request body in the store's search API shape.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query.clone());
        body.insert("size".to_string(), Value::from(self.size));
        if !self.sort.is_empty() {
            body.insert("sort".to_string(), Value::Array(self.sort.clone()));
        }
        if !self.source_fields.is_empty() {
            body.insert(
                "_source".to_string(),
                Value::from(self.source_fields.clone()),
            );
        }
        if !self.docvalue_fields.is_empty() {
            body.insert(
                "docvalue_fields".to_string(),
                Value::from(self.docvalue_fields.clone()),
            );
        }
        Value::Object(body)
    }
}

/// Matching documents, one `_source` object per hit.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub hits: Vec<Value>,
}

/// The document store's search endpoint.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, EngineError>;
}

/// Column-typed result schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<(String, FieldType)>,
}

impl Schema {
    pub fn new(columns: Vec<(String, FieldType)>) -> Self {
        Self { columns }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Schema-tagged result rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    pub schema: Schema,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Engine double that replays canned hits and records every request.
///
/// Useful for embedded tests of the compilation surface.
#[derive(Debug, Default)]
pub struct StaticEngine {
    hits: Vec<Value>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl StaticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(hits: Vec<Value>) -> Self {
        Self {
            hits,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests observed so far.
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().expect("request log poisoned").clone()
    }
}

#[async_trait]
impl SearchEngine for StaticEngine {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, EngineError> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .push(request.clone());
        Ok(SearchResponse {
            hits: self.hits.clone(),
        })
    }
}
