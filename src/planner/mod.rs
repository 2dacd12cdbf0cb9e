//! Physical planning.
//!
//! Folds a verified, optimized logical plan into an executable
//! [`PhysicalPlan`]: either a search request against the store or a fully
//! local row evaluation for FROM-less statements. Columns and sorts over
//! nested structures are routed through the query DSL's nested-field
//! rewrite protocol.

use std::sync::Arc;

use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::catalog::{FieldBinding, FieldType};
use crate::error::{CompileError, CompileResult};
use crate::exec::{RowSet, Schema, SearchEngine, SearchRequest};
use crate::plan::{BinaryOperator, Expr, Literal, LogicalPlan, PlanNode, SortKey, UnaryOperator};
use crate::querydsl::{Location, NestedSortSpec, Query, RangeBound, Scalar};

/// Executable form of a compiled statement.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalPlan {
    /// Query shipped to the document store.
    Search(SearchPlan),
    /// Local evaluation, no store round trip.
    Local(LocalPlan),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPlan {
    pub request: SearchRequest,
    pub schema: Schema,
    /// Output columns in schema order, with their store bindings.
    pub columns: Vec<OutputColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlan {
    pub schema: Schema,
    pub rows: Vec<Vec<Value>>,
}

/// One projected column of a search plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub alias: String,
    pub binding: FieldBinding,
}

impl PhysicalPlan {
    pub fn schema(&self) -> &Schema {
        match self {
            PhysicalPlan::Search(plan) => &plan.schema,
            PhysicalPlan::Local(plan) => &plan.schema,
        }
    }

    /// Run the plan against the engine and shape hits into rows.
    pub async fn execute(&self, engine: &dyn SearchEngine) -> CompileResult<RowSet> {
        match self {
            PhysicalPlan::Local(plan) => Ok(RowSet {
                schema: plan.schema.clone(),
                rows: plan.rows.clone(),
            }),
            PhysicalPlan::Search(plan) => {
                let response = engine
                    .search(&plan.request)
                    .await
                    .map_err(|err| CompileError::Execution(err.to_string()))?;
                let rows = response
                    .hits
                    .iter()
                    .map(|hit| {
                        plan.columns
                            .iter()
                            .map(|column| lookup_path(hit, &column.binding.field))
                            .collect()
                    })
                    .collect();
                Ok(RowSet {
                    schema: plan.schema.clone(),
                    rows,
                })
            }
        }
    }
}

/// Extract a dotted path from a hit, descending through objects and
/// mapping over arrays. Missing values become `null`.
fn lookup_path(doc: &Value, path: &str) -> Value {
    if let Some(direct) = doc.get(path) {
        return direct.clone();
    }
    match path.split_once('.') {
        None => Value::Null,
        Some((head, rest)) => match doc.get(head) {
            Some(Value::Array(items)) => {
                Value::Array(items.iter().map(|item| lookup_path(item, rest)).collect())
            }
            Some(next) => lookup_path(next, rest),
            None => Value::Null,
        },
    }
}

/// Turns logical plans into physical ones.
#[derive(Debug, Clone, Copy)]
pub struct Planner {
    /// Page size used when the statement has no LIMIT.
    fetch_size: usize,
}

impl Planner {
    pub fn new(fetch_size: usize) -> Self {
        Self { fetch_size }
    }

    pub fn plan(&self, plan: LogicalPlan, verify: bool) -> CompileResult<PhysicalPlan> {
        let mut parts = decompose(&plan.node)?;

        let Some(relation) = parts.relation.take() else {
            return self.plan_local(&parts);
        };

        let columns = parts
            .projections
            .iter()
            .map(|(expr, alias)| output_column(expr, alias))
            .collect::<CompileResult<Vec<_>>>()?;

        let mut query = match &parts.predicate {
            Some(predicate) => translate_predicate(predicate)?,
            None => Query::match_all(Location::default()),
        };

        // Nested columns must be fetched through the nested query for
        // their path; insert one when the predicate did not produce it.
        for column in &columns {
            let binding = &column.binding;
            if let Some(path) = &binding.nested_path {
                if query.contains_nested_field(path, &binding.field) {
                    continue;
                }
                let rewritten =
                    Arc::clone(&query).add_nested_field(path, &binding.field, binding.doc_values);
                query = if Arc::ptr_eq(&rewritten, &query) {
                    let fetch = Query::nested(
                        Location::default(),
                        path.clone(),
                        Query::match_all(Location::default()),
                    )
                    .add_nested_field(path, &binding.field, binding.doc_values);
                    Query::and(Location::default(), query, fetch)
                } else {
                    rewritten
                };
            }
        }

        let sort = parts
            .sort
            .iter()
            .map(|key| sort_value(key, &query))
            .collect::<CompileResult<Vec<_>>>()?;

        let schema = Schema::new(
            columns
                .iter()
                .map(|column| (column.alias.clone(), column.binding.field_type))
                .collect(),
        );

        let (docvalue_fields, source_fields) = columns
            .iter()
            .filter(|column| column.binding.nested_path.is_none())
            .map(|column| column.binding.clone())
            .partition::<Vec<_>, _>(|binding| binding.doc_values);

        let request = SearchRequest {
            index: relation,
            query: query.to_json(),
            size: parts.limit.unwrap_or(self.fetch_size),
            sort,
            source_fields: source_fields.into_iter().map(|b| b.field).collect(),
            docvalue_fields: docvalue_fields.into_iter().map(|b| b.field).collect(),
        };

        let physical = PhysicalPlan::Search(SearchPlan {
            request,
            schema,
            columns,
        });
        if verify {
            verify_executable(&physical, &parts)?;
        }
        debug!("planned search request");
        Ok(physical)
    }

    fn plan_local(&self, parts: &PlanParts) -> CompileResult<PhysicalPlan> {
        let mut columns = Vec::new();
        let mut row = Vec::new();
        for (expr, alias) in &parts.projections {
            let Expr::Literal(literal) = expr else {
                return Err(CompileError::InvalidArgument(format!(
                    "cannot evaluate '{expr}' without a relation"
                )));
            };
            columns.push((alias.clone(), literal_type(literal)));
            row.push(literal_value(literal)?);
        }
        Ok(PhysicalPlan::Local(LocalPlan {
            schema: Schema::new(columns),
            rows: vec![row],
        }))
    }
}

/// Executability checks beyond translation: sorting needs doc values.
fn verify_executable(plan: &PhysicalPlan, parts: &PlanParts) -> CompileResult<()> {
    let PhysicalPlan::Search(_) = plan else {
        return Ok(());
    };
    for key in &parts.sort {
        let binding = column_binding(&key.expr)?;
        if !binding.doc_values {
            return Err(CompileError::InvalidArgument(format!(
                "sorting on '{}' requires doc values",
                binding.field
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct PlanParts {
    relation: Option<String>,
    predicate: Option<Expr>,
    projections: Vec<(Expr, String)>,
    sort: Vec<SortKey>,
    limit: Option<usize>,
}

fn decompose(node: &PlanNode) -> CompileResult<PlanParts> {
    let mut parts = PlanParts::default();
    collect(node, &mut parts)?;
    Ok(parts)
}

fn collect(node: &PlanNode, parts: &mut PlanParts) -> CompileResult<()> {
    match node {
        PlanNode::Relation { name } => {
            parts.relation = Some(name.clone());
            Ok(())
        }
        PlanNode::OneRow => Ok(()),
        PlanNode::Join { .. } => Err(CompileError::InvalidArgument(
            "joins are not supported".to_string(),
        )),
        PlanNode::Filter { predicate, input } => {
            parts.predicate = Some(match parts.predicate.take() {
                Some(outer) => predicate.clone().and(outer),
                None => predicate.clone(),
            });
            collect(input, parts)
        }
        PlanNode::Projection { exprs, input } => {
            if parts.projections.is_empty() {
                parts.projections = exprs.clone();
            }
            collect(input, parts)
        }
        PlanNode::Sort { keys, input } => {
            if parts.sort.is_empty() {
                parts.sort = keys.clone();
            }
            collect(input, parts)
        }
        PlanNode::Limit { fetch, input } => {
            parts.limit = Some(parts.limit.map_or(*fetch, |outer| outer.min(*fetch)));
            collect(input, parts)
        }
    }
}

fn output_column(expr: &Expr, alias: &str) -> CompileResult<OutputColumn> {
    let binding = column_binding(expr)?;
    Ok(OutputColumn {
        alias: alias.to_string(),
        binding,
    })
}

fn column_binding(expr: &Expr) -> CompileResult<FieldBinding> {
    match expr {
        Expr::Column {
            binding: Some(binding),
            ..
        } => Ok(binding.clone()),
        Expr::Column { name, .. } => Err(CompileError::InvalidArgument(format!(
            "unresolved column '{name}'"
        ))),
        other => Err(CompileError::InvalidArgument(format!(
            "expected a column reference, got '{other}'"
        ))),
    }
}

/// Translate a boolean expression into the query DSL. Predicates over
/// nested fields are wrapped in a nested query for their path.
fn translate_predicate(expr: &Expr) -> CompileResult<Arc<Query>> {
    let location = Location::default();
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => Ok(Query::and(
            location,
            translate_predicate(left)?,
            translate_predicate(right)?,
        )),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => Ok(Query::or(
            location,
            translate_predicate(left)?,
            translate_predicate(right)?,
        )),
        Expr::BinaryOp { left, op, right } => translate_comparison(left, *op, right),
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => Ok(Query::not(location, translate_predicate(expr)?)),
        Expr::IsNull { expr, negated } => {
            let binding = column_binding(expr)?;
            let exists = Query::exists(location, binding.field.clone());
            let query = if *negated {
                exists
            } else {
                Query::not(location, exists)
            };
            Ok(scope_nested(query, &binding))
        }
        Expr::Column { .. } => {
            let binding = column_binding(expr)?;
            if binding.field_type != FieldType::Boolean {
                return Err(CompileError::InvalidArgument(format!(
                    "'{}' is not a boolean predicate",
                    binding.field
                )));
            }
            Ok(scope_nested(
                Query::term(location, binding.field.clone(), Scalar::Bool(true)),
                &binding,
            ))
        }
        Expr::Literal(Literal::Bool(true)) => Ok(Query::match_all(location)),
        Expr::Literal(Literal::Bool(false)) => {
            Ok(Query::not(location, Query::match_all(location)))
        }
        other => Err(CompileError::InvalidArgument(format!(
            "predicate '{other}' is not translatable"
        ))),
    }
}

fn translate_comparison(
    left: &Expr,
    op: BinaryOperator,
    right: &Expr,
) -> CompileResult<Arc<Query>> {
    // normalize to column-on-the-left
    let (column, op, literal) = match (left, right) {
        (Expr::Column { .. }, _) => (left, op, right),
        (_, Expr::Column { .. }) => (right, flip(op), left),
        _ => {
            return Err(CompileError::InvalidArgument(format!(
                "comparison '{left} {op} {right}' needs a column operand"
            )))
        }
    };
    let binding = column_binding(column)?;
    let Expr::Literal(literal) = literal else {
        return Err(CompileError::InvalidArgument(format!(
            "comparison against '{literal}' is not translatable"
        )));
    };
    let value = scalar_value(literal)?;
    let location = Location::default();
    let field = binding.field.clone();

    let query = match op {
        BinaryOperator::Eq => Query::term(location, field, value),
        BinaryOperator::Ne => Query::not(location, Query::term(location, field, value)),
        BinaryOperator::Gt => Query::range(
            location,
            field,
            Some(RangeBound {
                value,
                inclusive: false,
            }),
            None,
        ),
        BinaryOperator::Gte => Query::range(
            location,
            field,
            Some(RangeBound {
                value,
                inclusive: true,
            }),
            None,
        ),
        BinaryOperator::Lt => Query::range(
            location,
            field,
            None,
            Some(RangeBound {
                value,
                inclusive: false,
            }),
        ),
        BinaryOperator::Lte => Query::range(
            location,
            field,
            None,
            Some(RangeBound {
                value,
                inclusive: true,
            }),
        ),
        BinaryOperator::And | BinaryOperator::Or => unreachable!("handled by translate_predicate"),
    };
    Ok(scope_nested(query, &binding))
}

fn flip(op: BinaryOperator) -> BinaryOperator {
    match op {
        BinaryOperator::Lt => BinaryOperator::Gt,
        BinaryOperator::Gt => BinaryOperator::Lt,
        BinaryOperator::Lte => BinaryOperator::Gte,
        BinaryOperator::Gte => BinaryOperator::Lte,
        other => other,
    }
}

fn scope_nested(query: Arc<Query>, binding: &FieldBinding) -> Arc<Query> {
    match &binding.nested_path {
        Some(path) => Query::nested(query.location(), path.clone(), query),
        None => query,
    }
}

fn scalar_value(literal: &Literal) -> CompileResult<Scalar> {
    match literal {
        Literal::Int(v) => Ok(Scalar::Int(*v)),
        Literal::Float(v) => Ok(Scalar::Float(*v)),
        Literal::String(v) => Ok(Scalar::Str(v.clone())),
        Literal::Bool(v) => Ok(Scalar::Bool(*v)),
        Literal::Timestamp(v) => v
            .format(&Rfc3339)
            .map(Scalar::Str)
            .map_err(|err| CompileError::InvalidArgument(format!("unformattable timestamp: {err}"))),
        Literal::Null => Err(CompileError::InvalidArgument(
            "NULL is not comparable; use IS NULL".to_string(),
        )),
    }
}

fn literal_type(literal: &Literal) -> FieldType {
    match literal {
        Literal::Int(_) => FieldType::Long,
        Literal::Float(_) => FieldType::Double,
        Literal::String(_) | Literal::Null => FieldType::Keyword,
        Literal::Bool(_) => FieldType::Boolean,
        Literal::Timestamp(_) => FieldType::Date,
    }
}

fn literal_value(literal: &Literal) -> CompileResult<Value> {
    Ok(match literal {
        Literal::Int(v) => Value::from(*v),
        Literal::Float(v) => Value::from(*v),
        Literal::String(v) => Value::from(v.clone()),
        Literal::Bool(v) => Value::from(*v),
        Literal::Timestamp(v) => Value::from(v.format(&Rfc3339).map_err(|err| {
            CompileError::InvalidArgument(format!("unformattable timestamp: {err}"))
        })?),
        Literal::Null => Value::Null,
    })
}

/// ORDER BY entry, with nested scoping when the key lives under a nested
/// path. The query tree contributes the path filter through the
/// enrichment hook.
fn sort_value(key: &SortKey, query: &Arc<Query>) -> CompileResult<Value> {
    let binding = column_binding(&key.expr)?;
    let mut options = Map::new();
    options.insert(
        "order".to_string(),
        Value::from(if key.ascending { "asc" } else { "desc" }),
    );
    if let Some(path) = &binding.nested_path {
        let mut spec = NestedSortSpec::new(path.clone());
        query.enrich_nested_sort(&mut spec);
        let mut nested = Map::new();
        nested.insert("path".to_string(), Value::from(spec.path()));
        if let Some(filter) = spec.filter() {
            nested.insert("filter".to_string(), filter.clone());
        }
        options.insert("nested".to_string(), Value::Object(nested));
    }
    let mut sort = Map::new();
    sort.insert(binding.field, Value::Object(options));
    Ok(Value::Object(sort))
}
