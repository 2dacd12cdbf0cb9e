//! Boolean combinator behavior: rewrite identity preservation, structural
//! equality, and translation semantics.

use std::sync::Arc;

use serde_json::json;

use sift::querydsl::{Location, Query, Scalar};

fn loc() -> Location {
    Location::new(1, 1)
}

fn term(field: &str, value: i64) -> Arc<Query> {
    Query::term(loc(), field, Scalar::Int(value))
}

#[test]
fn rewrite_preserves_identity_when_nothing_matches() {
    let tree = Query::and(
        loc(),
        term("x", 1),
        Query::or(loc(), term("y", 2), term("z", 3)),
    );

    let rewritten = Arc::clone(&tree).add_nested_field("addresses", "addresses.city", true);
    assert!(Arc::ptr_eq(&tree, &rewritten));
}

#[test]
fn rewrite_propagates_only_changed_children() {
    let nested = Query::nested(loc(), "lines", term("lines.qty", 5));
    let untouched = term("status", 1);
    let tree = Query::and(loc(), Arc::clone(&nested), Arc::clone(&untouched));

    let rewritten = Arc::clone(&tree).add_nested_field("lines", "lines.sku", true);
    assert!(!Arc::ptr_eq(&tree, &rewritten));

    let Query::Bool(bool_query) = rewritten.as_ref() else {
        panic!("rewrite must keep the combinator shape");
    };
    assert!(bool_query.and);
    // left child was rewritten, right child is the same instance
    assert!(!Arc::ptr_eq(&bool_query.left, &nested));
    assert!(Arc::ptr_eq(&bool_query.right, &untouched));
    assert!(rewritten.contains_nested_field("lines", "lines.sku"));
    assert!(!tree.contains_nested_field("lines", "lines.sku"));
}

#[test]
fn equality_is_order_sensitive() {
    let a = term("a", 1);
    let b = term("b", 2);

    let ab = Query::and(loc(), Arc::clone(&a), Arc::clone(&b));
    let ba = Query::and(loc(), Arc::clone(&b), Arc::clone(&a));
    assert_ne!(ab.as_ref(), ba.as_ref());

    // independently built trees with the same children and flag are equal
    let ab_again = Query::and(Location::new(99, 7), term("a", 1), term("b", 2));
    assert_eq!(ab.as_ref(), ab_again.as_ref());
}

#[test]
fn and_translates_to_non_scoring_filter() {
    let tree = Query::and(loc(), term("x", 1), term("y", 2));
    assert_eq!(
        tree.to_json(),
        json!({ "bool": { "filter": [
            { "term": { "x": { "value": 1 } } },
            { "term": { "y": { "value": 2 } } }
        ] } })
    );
}

#[test]
fn or_translates_to_scoring_should() {
    let tree = Query::or(loc(), term("x", 1), term("y", 2));
    assert_eq!(
        tree.to_json(),
        json!({ "bool": { "should": [
            { "term": { "x": { "value": 1 } } },
            { "term": { "y": { "value": 2 } } }
        ] } })
    );
}

#[test]
fn display_renders_and_or() {
    let tree = Query::or(loc(), term("x", 1), term("y", 2));
    assert_eq!(tree.to_string(), "x:1 OR y:2");
}
