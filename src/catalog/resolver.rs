//! RelationResolver trait definition.
//!
//! Resolution is the one asynchronous step of the pipeline: the resolver
//! may complete on another worker, and the session awaits it between
//! pre-analysis and analysis. Timeout policy belongs to the resolver
//! implementation; failures surface as ordinary [`ResolveError`]s.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::{Catalog, RelationSchema};

/// Result type for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that can occur while discovering a relation's schema.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The store has no relation with this name.
    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    /// Schema discovery did not complete in time.
    #[error("relation resolution timed out after {0:?}")]
    Timeout(Duration),

    /// The discovery backend failed.
    #[error("resolver backend error: {0}")]
    Backend(String),
}

/// Trait for resolving a referenced relation into its discovered schema.
#[async_trait]
pub trait RelationResolver: Send + Sync {
    /// Resolve a single relation name into a catalog holding its schema.
    async fn resolve(&self, relation: &str) -> ResolveResult<Catalog>;
}

/// In-memory resolver over a fixed set of schemas.
///
/// Useful for embedded deployments and as a test fixture.
#[derive(Debug, Default)]
pub struct StaticResolver {
    schemas: HashMap<String, RelationSchema>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: RelationSchema) -> Self {
        self.register(schema);
        self
    }

    pub fn register(&mut self, schema: RelationSchema) {
        self.schemas.insert(schema.name().to_string(), schema);
    }
}

#[async_trait]
impl RelationResolver for StaticResolver {
    async fn resolve(&self, relation: &str) -> ResolveResult<Catalog> {
        tracing::debug!(relation, "resolving against static schema set");
        self.schemas
            .get(relation)
            .cloned()
            .map(|schema| Catalog::from_schemas([schema]))
            .ok_or_else(|| ResolveError::UnknownRelation(relation.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldType;

    #[tokio::test]
    async fn static_resolution() {
        let resolver = StaticResolver::new()
            .with_schema(RelationSchema::new("logs").with_field("level", FieldType::Keyword, true));

        let catalog = resolver.resolve("logs").await.unwrap();
        assert!(catalog.relation("logs").is_some());

        let err = resolver.resolve("metrics").await.unwrap_err();
        assert!(matches!(err, ResolveError::UnknownRelation(name) if name == "metrics"));
    }
}
