//! Query node types.
//!
//! Every variant participates in the same protocol: nested-field
//! containment, identity-preserving rewrite, nested-sort enrichment,
//! JSON translation, and location-independent equality/hashing.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{Location, NestedSortSpec};

/// Scalar comparison value carried by term and range queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Scalar {
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Int(v) => json!(v),
            Scalar::Float(v) => json!(v),
            Scalar::Str(v) => json!(v),
            Scalar::Bool(v) => json!(v),
        }
    }
}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Scalar::Int(v) => v.hash(state),
            Scalar::Float(v) => v.to_bits().hash(state),
            Scalar::Str(v) => v.hash(state),
            Scalar::Bool(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Str(v) => write!(f, "{v}"),
            Scalar::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Matches every document.
#[derive(Debug, Clone)]
pub struct MatchAllQuery {
    pub location: Location,
}

/// Exact value match on a single field.
#[derive(Debug, Clone)]
pub struct TermQuery {
    pub location: Location,
    pub field: String,
    pub value: Scalar,
}

/// One end of a range comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBound {
    pub value: Scalar,
    pub inclusive: bool,
}

/// Bounded comparison on a single field.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub location: Location,
    pub field: String,
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
}

/// Field existence check.
#[derive(Debug, Clone)]
pub struct ExistsQuery {
    pub location: Location,
    pub field: String,
}

/// Negation of a single child query.
#[derive(Debug, Clone)]
pub struct NotQuery {
    pub location: Location,
    pub child: Arc<Query>,
}

/// Query scoped to a nested object path, also carrying the nested fields
/// the plan fetches from matching inner documents.
#[derive(Debug, Clone)]
pub struct NestedQuery {
    pub location: Location,
    pub path: String,
    /// Fetched nested fields, each with its doc-values flag.
    pub fields: BTreeMap<String, bool>,
    pub inner: Arc<Query>,
}

/// Boolean AND or boolean OR over two child queries.
#[derive(Debug, Clone)]
pub struct BoolQuery {
    pub location: Location,
    /// `true` for boolean AND, `false` for boolean OR.
    pub and: bool,
    pub left: Arc<Query>,
    pub right: Arc<Query>,
}

/// A predicate tree node.
#[derive(Debug, Clone)]
pub enum Query {
    MatchAll(MatchAllQuery),
    Term(TermQuery),
    Range(RangeQuery),
    Exists(ExistsQuery),
    Not(NotQuery),
    Nested(NestedQuery),
    Bool(BoolQuery),
}

impl Query {
    pub fn match_all(location: Location) -> Arc<Query> {
        Arc::new(Query::MatchAll(MatchAllQuery { location }))
    }

    pub fn term(location: Location, field: impl Into<String>, value: Scalar) -> Arc<Query> {
        Arc::new(Query::Term(TermQuery {
            location,
            field: field.into(),
            value,
        }))
    }

    pub fn range(
        location: Location,
        field: impl Into<String>,
        lower: Option<RangeBound>,
        upper: Option<RangeBound>,
    ) -> Arc<Query> {
        Arc::new(Query::Range(RangeQuery {
            location,
            field: field.into(),
            lower,
            upper,
        }))
    }

    pub fn exists(location: Location, field: impl Into<String>) -> Arc<Query> {
        Arc::new(Query::Exists(ExistsQuery {
            location,
            field: field.into(),
        }))
    }

    pub fn not(location: Location, child: Arc<Query>) -> Arc<Query> {
        Arc::new(Query::Not(NotQuery { location, child }))
    }

    pub fn nested(location: Location, path: impl Into<String>, inner: Arc<Query>) -> Arc<Query> {
        Arc::new(Query::Nested(NestedQuery {
            location,
            path: path.into(),
            fields: BTreeMap::new(),
            inner,
        }))
    }

    pub fn and(location: Location, left: Arc<Query>, right: Arc<Query>) -> Arc<Query> {
        Arc::new(Query::Bool(BoolQuery {
            location,
            and: true,
            left,
            right,
        }))
    }

    pub fn or(location: Location, left: Arc<Query>, right: Arc<Query>) -> Arc<Query> {
        Arc::new(Query::Bool(BoolQuery {
            location,
            and: false,
            left,
            right,
        }))
    }

    pub fn location(&self) -> Location {
        match self {
            Query::MatchAll(q) => q.location,
            Query::Term(q) => q.location,
            Query::Range(q) => q.location,
            Query::Exists(q) => q.location,
            Query::Not(q) => q.location,
            Query::Nested(q) => q.location,
            Query::Bool(q) => q.location,
        }
    }

    /// Whether this tree already fetches `field` under the nested `path`.
    pub fn contains_nested_field(&self, path: &str, field: &str) -> bool {
        match self {
            Query::Bool(q) => {
                q.left.contains_nested_field(path, field)
                    || q.right.contains_nested_field(path, field)
            }
            Query::Not(q) => q.child.contains_nested_field(path, field),
            Query::Nested(q) => q.path == path && q.fields.contains_key(field),
            _ => false,
        }
    }

    /// Rewrite the tree so the nested query at `path` also fetches `field`.
    ///
    /// Returns the receiver's own `Arc` when no node changed, so rewriting
    /// a tree without the nested path costs no allocation beyond the
    /// traversal.
    pub fn add_nested_field(self: Arc<Self>, path: &str, field: &str, doc_values: bool) -> Arc<Query> {
        match self.as_ref() {
            Query::Bool(q) => {
                let left = Arc::clone(&q.left).add_nested_field(path, field, doc_values);
                let right = Arc::clone(&q.right).add_nested_field(path, field, doc_values);
                if Arc::ptr_eq(&left, &q.left) && Arc::ptr_eq(&right, &q.right) {
                    self
                } else {
                    Arc::new(Query::Bool(BoolQuery {
                        location: q.location,
                        and: q.and,
                        left,
                        right,
                    }))
                }
            }
            Query::Not(q) => {
                let child = Arc::clone(&q.child).add_nested_field(path, field, doc_values);
                if Arc::ptr_eq(&child, &q.child) {
                    self
                } else {
                    Arc::new(Query::Not(NotQuery {
                        location: q.location,
                        child,
                    }))
                }
            }
            Query::Nested(q) => {
                if q.path != path || q.fields.contains_key(field) {
                    return self;
                }
                let mut fields = q.fields.clone();
                fields.insert(field.to_string(), doc_values);
                Arc::new(Query::Nested(NestedQuery {
                    location: q.location,
                    path: q.path.clone(),
                    fields,
                    inner: Arc::clone(&q.inner),
                }))
            }
            _ => self,
        }
    }

    /// Contribute this tree's nested filters to a sort directive.
    /// Children are visited left to right; purely additive.
    pub fn enrich_nested_sort(&self, sort: &mut NestedSortSpec) {
        match self {
            Query::Bool(q) => {
                q.left.enrich_nested_sort(sort);
                q.right.enrich_nested_sort(sort);
            }
            Query::Not(q) => q.child.enrich_nested_sort(sort),
            Query::Nested(q) => {
                if q.path == sort.path() && sort.filter().is_none() {
                    sort.set_filter(q.inner.to_json());
                }
            }
            _ => {}
        }
    }

    /// Translate into the target search query representation.
    ///
    /// AND combines its children in filter context, so their score
    /// contribution is discarded; OR combines them as scoring `should`
    /// clauses.
    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll(_) => json!({ "match_all": {} }),
            Query::Term(q) => single(
                "term",
                single(&q.field, json!({ "value": q.value.to_json() })),
            ),
            Query::Range(q) => {
                let mut bounds = Map::new();
                if let Some(lower) = &q.lower {
                    let key = if lower.inclusive { "gte" } else { "gt" };
                    bounds.insert(key.to_string(), lower.value.to_json());
                }
                if let Some(upper) = &q.upper {
                    let key = if upper.inclusive { "lte" } else { "lt" };
                    bounds.insert(key.to_string(), upper.value.to_json());
                }
                single("range", single(&q.field, Value::Object(bounds)))
            }
            Query::Exists(q) => json!({ "exists": { "field": q.field } }),
            Query::Not(q) => json!({ "bool": { "must_not": [q.child.to_json()] } }),
            Query::Nested(q) => {
                let mut nested = Map::new();
                nested.insert("path".to_string(), json!(q.path));
                nested.insert("query".to_string(), q.inner.to_json());
                if !q.fields.is_empty() {
                    let docvalue: Vec<&str> = q
                        .fields
                        .iter()
                        .filter(|(_, dv)| **dv)
                        .map(|(name, _)| name.as_str())
                        .collect();
                    let source: Vec<&str> = q
                        .fields
                        .iter()
                        .filter(|(_, dv)| !**dv)
                        .map(|(name, _)| name.as_str())
                        .collect();
                    let mut inner_hits = Map::new();
                    if !docvalue.is_empty() {
                        inner_hits.insert("docvalue_fields".to_string(), json!(docvalue));
                    }
                    if !source.is_empty() {
                        inner_hits.insert("_source".to_string(), json!({ "includes": source }));
                    }
                    nested.insert("inner_hits".to_string(), Value::Object(inner_hits));
                }
                single("nested", Value::Object(nested))
            }
            Query::Bool(q) => {
                let children = vec![q.left.to_json(), q.right.to_json()];
                if q.and {
                    json!({ "bool": { "filter": children } })
                } else {
                    json!({ "bool": { "should": children } })
                }
            }
        }
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

// Equality and hashing are structural and ignore `Location`: two nodes
// derived from different source positions still compare equal. Bool
// children compare in left/right order; the tree is not normalized, so
// `a AND b` and `b AND a` are distinct nodes.
impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Query::MatchAll(_), Query::MatchAll(_)) => true,
            (Query::Term(a), Query::Term(b)) => a.field == b.field && a.value == b.value,
            (Query::Range(a), Query::Range(b)) => {
                a.field == b.field && a.lower == b.lower && a.upper == b.upper
            }
            (Query::Exists(a), Query::Exists(b)) => a.field == b.field,
            (Query::Not(a), Query::Not(b)) => a.child == b.child,
            (Query::Nested(a), Query::Nested(b)) => {
                a.path == b.path && a.fields == b.fields && a.inner == b.inner
            }
            (Query::Bool(a), Query::Bool(b)) => {
                a.and == b.and && a.left == b.left && a.right == b.right
            }
            _ => false,
        }
    }
}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Query::MatchAll(_) => {}
            Query::Term(q) => {
                q.field.hash(state);
                q.value.hash(state);
            }
            Query::Range(q) => {
                q.field.hash(state);
                for bound in [&q.lower, &q.upper] {
                    match bound {
                        Some(b) => {
                            b.inclusive.hash(state);
                            b.value.hash(state);
                        }
                        None => false.hash(state),
                    }
                }
            }
            Query::Exists(q) => q.field.hash(state),
            Query::Not(q) => q.child.hash(state),
            Query::Nested(q) => {
                q.path.hash(state);
                q.fields.hash(state);
                q.inner.hash(state);
            }
            Query::Bool(q) => {
                q.and.hash(state);
                q.left.hash(state);
                q.right.hash(state);
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::MatchAll(_) => write!(f, "*"),
            Query::Term(q) => write!(f, "{}:{}", q.field, q.value),
            Query::Range(q) => {
                if let Some(lower) = &q.lower {
                    write!(f, "{} {} ", lower.value, if lower.inclusive { "<=" } else { "<" })?;
                }
                write!(f, "{}", q.field)?;
                if let Some(upper) = &q.upper {
                    write!(f, " {} {}", if upper.inclusive { "<=" } else { "<" }, upper.value)?;
                }
                Ok(())
            }
            Query::Exists(q) => write!(f, "EXISTS {}", q.field),
            Query::Not(q) => write!(f, "NOT {}", q.child),
            Query::Nested(q) => write!(f, "{}[{}]", q.path, q.inner),
            Query::Bool(q) => {
                write!(f, "{} {} {}", q.left, if q.and { "AND" } else { "OR" }, q.right)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;

    fn loc(line: u32) -> Location {
        Location::new(line, 1)
    }

    fn hash_of(query: &Query) -> u64 {
        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equality_ignores_location() {
        let a = Query::term(loc(1), "status", Scalar::Str("open".into()));
        let b = Query::term(loc(42), "status", Scalar::Str("open".into()));
        assert_eq!(a.as_ref(), b.as_ref());
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn bool_equality_is_order_sensitive() {
        let a = Query::term(loc(1), "x", Scalar::Int(1));
        let b = Query::term(loc(1), "y", Scalar::Int(2));
        let ab = Query::and(loc(1), Arc::clone(&a), Arc::clone(&b));
        let ba = Query::and(loc(1), b, a);
        assert_ne!(ab.as_ref(), ba.as_ref());
    }

    #[test]
    fn and_or_flag_distinguishes() {
        let a = Query::term(loc(1), "x", Scalar::Int(1));
        let b = Query::term(loc(1), "y", Scalar::Int(2));
        let and = Query::and(loc(1), Arc::clone(&a), Arc::clone(&b));
        let or = Query::or(loc(1), a, b);
        assert_ne!(and.as_ref(), or.as_ref());
        assert_ne!(hash_of(&and), hash_of(&or));
    }

    #[test]
    fn nested_field_containment() {
        let inner = Query::term(loc(2), "lines.sku", Scalar::Str("A-1".into()));
        let nested = Query::nested(loc(2), "lines", inner);
        let enriched = nested.add_nested_field("lines", "lines.qty", true);
        assert!(enriched.contains_nested_field("lines", "lines.qty"));
        assert!(!enriched.contains_nested_field("lines", "lines.price"));
        assert!(!enriched.contains_nested_field("shipments", "lines.qty"));
    }

    #[test]
    fn add_nested_field_is_idempotent_per_field() {
        let nested = Query::nested(loc(1), "lines", Query::match_all(loc(1)));
        let once = nested.add_nested_field("lines", "lines.qty", true);
        let twice = Arc::clone(&once).add_nested_field("lines", "lines.qty", true);
        assert!(Arc::ptr_eq(&once, &twice));
    }

    #[test]
    fn translation_shapes() {
        let term = Query::term(loc(1), "status", Scalar::Str("open".into()));
        assert_eq!(
            term.to_json(),
            json!({ "term": { "status": { "value": "open" } } })
        );

        let range = Query::range(
            loc(1),
            "total",
            Some(RangeBound {
                value: Scalar::Int(10),
                inclusive: false,
            }),
            None,
        );
        assert_eq!(range.to_json(), json!({ "range": { "total": { "gt": 10 } } }));

        let not = Query::not(loc(1), Query::exists(loc(1), "deleted_at"));
        assert_eq!(
            not.to_json(),
            json!({ "bool": { "must_not": [{ "exists": { "field": "deleted_at" } }] } })
        );
    }

    #[test]
    fn display_renders_infix() {
        let q = Query::and(
            loc(1),
            Query::term(loc(1), "x", Scalar::Int(1)),
            Query::term(loc(1), "y", Scalar::Int(2)),
        );
        assert_eq!(q.to_string(), "x:1 AND y:2");
    }
}
