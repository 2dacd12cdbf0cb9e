//! Translation of compiled statements into search requests, including
//! nested field fetching and nested sort enrichment.

use std::sync::Arc;

use serde_json::json;

use sift::catalog::{FieldType, RelationSchema, StaticResolver};
use sift::config::Configuration;
use sift::exec::StaticEngine;
use sift::planner::PhysicalPlan;
use sift::{CompileError, Session};

fn orders_schema() -> RelationSchema {
    RelationSchema::new("orders")
        .with_field("id", FieldType::Keyword, true)
        .with_field("status", FieldType::Keyword, true)
        .with_field("total", FieldType::Double, true)
        .with_field("note", FieldType::Text, false)
        .with_field("lines", FieldType::Nested, false)
        .with_field("lines.sku", FieldType::Keyword, true)
        .with_field("lines.qty", FieldType::Long, true)
}

fn session() -> Session {
    Session::new(
        Configuration::default(),
        Arc::new(StaticResolver::new().with_schema(orders_schema())),
        Arc::new(StaticEngine::new()),
    )
}

async fn search_request(sql: &str) -> sift::exec::SearchRequest {
    match session().compile(sql).await.unwrap() {
        PhysicalPlan::Search(plan) => plan.request,
        other => panic!("expected a search plan, got {other:?}"),
    }
}

#[tokio::test]
async fn and_of_terms_is_a_filter_conjunction() {
    let request = search_request("SELECT id FROM orders WHERE status = 'open' AND total > 10").await;
    assert_eq!(
        request.query,
        json!({ "bool": { "filter": [
            { "term": { "status": { "value": "open" } } },
            { "range": { "total": { "gt": 10 } } }
        ] } })
    );
}

#[tokio::test]
async fn or_of_terms_is_a_should_disjunction() {
    let request =
        search_request("SELECT id FROM orders WHERE status = 'open' OR status = 'held'").await;
    assert_eq!(
        request.query,
        json!({ "bool": { "should": [
            { "term": { "status": { "value": "open" } } },
            { "term": { "status": { "value": "held" } } }
        ] } })
    );
}

#[tokio::test]
async fn not_and_is_null_translate() {
    let request = search_request("SELECT id FROM orders WHERE NOT status = 'held'").await;
    assert_eq!(
        request.query,
        json!({ "bool": { "must_not": [
            { "term": { "status": { "value": "held" } } }
        ] } })
    );

    let request = search_request("SELECT id FROM orders WHERE note IS NOT NULL").await;
    assert_eq!(request.query, json!({ "exists": { "field": "note" } }));
}

#[tokio::test]
async fn nested_predicate_is_scoped_to_its_path() {
    let request = search_request("SELECT id FROM orders WHERE lines.qty > 3").await;
    assert_eq!(
        request.query,
        json!({ "nested": {
            "path": "lines",
            "query": { "range": { "lines.qty": { "gt": 3 } } }
        } })
    );
}

#[tokio::test]
async fn nested_projection_enriches_existing_nested_query() {
    let request =
        search_request("SELECT lines.sku FROM orders WHERE lines.qty > 3 AND status = 'open'")
            .await;
    assert_eq!(
        request.query,
        json!({ "bool": { "filter": [
            { "nested": {
                "path": "lines",
                "query": { "range": { "lines.qty": { "gt": 3 } } },
                "inner_hits": { "docvalue_fields": ["lines.sku"] }
            } },
            { "term": { "status": { "value": "open" } } }
        ] } })
    );
}

#[tokio::test]
async fn nested_sort_carries_path_and_filter() {
    let request =
        search_request("SELECT id FROM orders WHERE lines.qty > 3 ORDER BY lines.qty DESC").await;
    assert_eq!(
        request.sort,
        vec![json!({ "lines.qty": {
            "order": "desc",
            "nested": {
                "path": "lines",
                "filter": { "range": { "lines.qty": { "gt": 3 } } }
            }
        } })]
    );
}

#[tokio::test]
async fn plain_sort_has_no_nested_clause() {
    let request = search_request("SELECT id FROM orders ORDER BY total").await;
    assert_eq!(request.sort, vec![json!({ "total": { "order": "asc" } })]);
}

#[tokio::test]
async fn sort_without_doc_values_is_rejected() {
    let err = session()
        .compile("SELECT id FROM orders ORDER BY note")
        .await
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidArgument(_)));
}

#[tokio::test]
async fn fetch_size_defaults_and_limit_overrides() {
    let request = search_request("SELECT id FROM orders").await;
    assert_eq!(request.size, 1000);

    let request = search_request("SELECT id FROM orders LIMIT 25").await;
    assert_eq!(request.size, 25);
}
