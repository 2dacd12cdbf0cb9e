//! End-to-end pipeline behavior: stage ordering, the resolution
//! sub-protocol, context scoping, and execution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use sift::catalog::{
    Catalog, FieldType, RelationResolver, RelationSchema, ResolveError, ResolveResult,
    StaticResolver,
};
use sift::config::Configuration;
use sift::exec::StaticEngine;
use sift::planner::PhysicalPlan;
use sift::{CompilationContext, CompileError, Session};

/// Resolver wrapper that counts resolution attempts.
#[derive(Default)]
struct CountingResolver {
    inner: StaticResolver,
    calls: AtomicUsize,
}

impl CountingResolver {
    fn new(inner: StaticResolver) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelationResolver for CountingResolver {
    async fn resolve(&self, relation: &str) -> ResolveResult<Catalog> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(relation).await
    }
}

/// Resolver that always fails.
struct FailingResolver;

#[async_trait]
impl RelationResolver for FailingResolver {
    async fn resolve(&self, _relation: &str) -> ResolveResult<Catalog> {
        Err(ResolveError::Backend("discovery endpoint down".to_string()))
    }
}

fn orders_schema() -> RelationSchema {
    RelationSchema::new("t")
        .with_field("a", FieldType::Keyword, true)
        .with_field("x", FieldType::Long, true)
        .with_field("y", FieldType::Long, true)
}

fn session_with(
    resolver: Arc<dyn RelationResolver>,
    engine: Arc<dyn sift::exec::SearchEngine>,
) -> Session {
    Session::new(Configuration::default(), resolver, engine)
}

#[tokio::test]
async fn compile_yields_physical_plan() {
    let resolver = Arc::new(StaticResolver::new().with_schema(orders_schema()));
    let session = session_with(resolver, Arc::new(StaticEngine::new()));

    let plan = session
        .compile("SELECT a FROM t WHERE x = 1 AND y = 2")
        .await
        .unwrap();

    let PhysicalPlan::Search(search) = plan else {
        panic!("expected a search plan");
    };
    assert_eq!(search.request.index, "t");
    assert_eq!(
        search.request.query,
        json!({ "bool": { "filter": [
            { "term": { "x": { "value": 1 } } },
            { "term": { "y": { "value": 2 } } }
        ] } })
    );
}

#[tokio::test]
async fn resolution_failure_yields_no_plan() {
    let session = session_with(Arc::new(FailingResolver), Arc::new(StaticEngine::new()));

    let err = session
        .compile("SELECT a FROM t WHERE x = 1 AND y = 2")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Resolution { relation, .. } if relation == "t"
    ));
}

#[tokio::test]
async fn analysis_is_idempotent() {
    let resolver = Arc::new(CountingResolver::new(
        StaticResolver::new().with_schema(orders_schema()),
    ));
    let session = session_with(Arc::clone(&resolver) as Arc<dyn RelationResolver>, Arc::new(StaticEngine::new()));

    let parsed = session.parse("SELECT a FROM t").unwrap();
    let analyzed = session.analyzed_plan(parsed, true).await.unwrap();
    assert!(analyzed.analyzed());
    assert_eq!(resolver.calls(), 1);

    // a second pass short-circuits without touching the resolver
    let again = session.analyzed_plan(analyzed.clone(), true).await.unwrap();
    assert_eq!(again, analyzed);
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test]
async fn multiple_relations_fail_without_resolution() {
    let resolver = Arc::new(CountingResolver::new(
        StaticResolver::new().with_schema(orders_schema()),
    ));
    let session = session_with(Arc::clone(&resolver) as Arc<dyn RelationResolver>, Arc::new(StaticEngine::new()));

    let parsed = session.parse("SELECT a FROM t, u").unwrap();
    let err = session.analyzed_plan(parsed, true).await.unwrap_err();
    assert!(matches!(
        err,
        CompileError::MultipleRelations { relations }
            if relations == vec!["t".to_string(), "u".to_string()]
    ));
    assert_eq!(resolver.calls(), 0);
}

#[tokio::test]
async fn zero_relations_use_empty_catalog() {
    let resolver = Arc::new(CountingResolver::new(StaticResolver::new()));
    let session = session_with(Arc::clone(&resolver) as Arc<dyn RelationResolver>, Arc::new(StaticEngine::new()));

    let parsed = session.parse("SELECT 1 AS one").unwrap();
    let analyzed = session.analyzed_plan(parsed, true).await.unwrap();
    assert!(analyzed.analyzed());
    assert_eq!(resolver.calls(), 0);

    let rows = session.execute("SELECT 1 AS one").await.unwrap();
    assert_eq!(rows.rows, vec![vec![json!(1)]]);
}

#[tokio::test]
async fn context_is_unobservable_outside_stages() {
    assert!(matches!(
        CompilationContext::current(),
        Err(CompileError::ContextUnavailable)
    ));

    let resolver = Arc::new(StaticResolver::new().with_schema(orders_schema()));
    let session = session_with(resolver, Arc::new(StaticEngine::new()));

    // after a successful stage the context is gone again
    session.parse("SELECT a FROM t").unwrap();
    assert!(CompilationContext::current().is_err());

    // and after a failing stage too
    assert!(session.parse("SELEKT").is_err());
    assert!(CompilationContext::current().is_err());
}

#[tokio::test]
async fn execute_shapes_rows_by_schema() {
    let resolver = Arc::new(StaticResolver::new().with_schema(orders_schema()));
    let engine = Arc::new(StaticEngine::with_hits(vec![
        json!({ "a": "first", "x": 1 }),
        json!({ "a": "second", "x": 2 }),
    ]));
    let session = session_with(resolver, Arc::clone(&engine) as Arc<dyn sift::exec::SearchEngine>);

    let rows = session.execute("SELECT a, x FROM t LIMIT 10").await.unwrap();
    assert_eq!(rows.schema.columns.len(), 2);
    assert_eq!(rows.schema.columns[0], ("a".to_string(), FieldType::Keyword));
    assert_eq!(
        rows.rows,
        vec![
            vec![json!("first"), json!(1)],
            vec![json!("second"), json!(2)]
        ]
    );

    // the engine saw exactly one request, with the statement's limit
    let requests = engine.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].size, 10);
}

#[tokio::test]
async fn unresolved_reference_fails_verification() {
    let resolver = Arc::new(StaticResolver::new().with_schema(orders_schema()));
    let session = session_with(resolver, Arc::new(StaticEngine::new()));

    let err = session.compile("SELECT missing FROM t").await.unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnresolvedReference { attributes } if attributes == vec!["missing".to_string()]
    ));
}

#[tokio::test]
async fn debug_analysis_traces_binding() {
    let resolver = Arc::new(StaticResolver::new().with_schema(orders_schema()));
    let session = session_with(resolver, Arc::new(StaticEngine::new()));

    let parsed = session.parse("SELECT a FROM t").unwrap();
    let trace = session.debug_analyzed_plan(parsed.clone()).await.unwrap();
    assert!(!trace.steps.is_empty());
    assert!(trace.steps.iter().any(|step| step.changed));

    // already-analyzed plans yield an empty trace
    let analyzed = session.analyzed_plan(parsed, true).await.unwrap();
    let trace = session.debug_analyzed_plan(analyzed).await.unwrap();
    assert!(trace.steps.is_empty());
}

#[tokio::test]
async fn interleaved_compilations_do_not_share_context() {
    let resolver = Arc::new(StaticResolver::new().with_schema(orders_schema()));
    let session = Arc::new(session_with(resolver, Arc::new(StaticEngine::new())));

    let mut handles = Vec::new();
    for i in 0..8 {
        let session = Arc::clone(&session);
        handles.push(tokio::spawn(async move {
            let sql = format!("SELECT a FROM t WHERE x = {i}");
            session.compile(&sql).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert!(CompilationContext::current().is_err());
}
