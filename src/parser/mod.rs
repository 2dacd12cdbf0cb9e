//! SQL frontend.
//!
//! Converts the `sqlparser` AST into the logical plan tree, binding only
//! syntax; all reference resolution happens later in analysis. Date and
//! timestamp literals are interpreted in the session time zone, read from
//! the compilation context the session installs around the parse call.

use sqlparser::ast::{
    BinaryOperator as SqlBinaryOp, DataType, Expr as SqlExpr, GroupByExpr, Ident, ObjectName,
    OrderByExpr, Query as SqlQuery, Select, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins, UnaryOperator as SqlUnaryOp, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

use crate::error::{CompileError, CompileResult};
use crate::plan::{BinaryOperator, Expr, Literal, LogicalPlan, PlanNode, SortKey, UnaryOperator};
use crate::session::CompilationContext;

/// Statement and expression parser over the generic SQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlParser;

impl SqlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a single SQL statement into an unbound logical plan.
    pub fn create_statement(&self, sql: &str) -> CompileResult<LogicalPlan> {
        let statements = Parser::parse_sql(&GenericDialect {}, sql)
            .map_err(|err| CompileError::Syntax(err.to_string()))?;
        match statements.as_slice() {
            [statement] => statement_to_plan(statement),
            _ => Err(CompileError::Syntax(
                "expected exactly one statement".to_string(),
            )),
        }
    }

    /// Parse a standalone scalar expression.
    pub fn create_expression(&self, text: &str) -> CompileResult<Expr> {
        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(text)
            .map_err(|err| CompileError::Syntax(err.to_string()))?;
        let expr = parser
            .parse_expr()
            .map_err(|err| CompileError::Syntax(err.to_string()))?;
        convert_expr(&expr)
    }
}

fn statement_to_plan(statement: &Statement) -> CompileResult<LogicalPlan> {
    match statement {
        Statement::Query(query) => query_to_plan(query),
        _ => Err(CompileError::Syntax(
            "only SELECT statements are supported".to_string(),
        )),
    }
}

fn query_to_plan(query: &SqlQuery) -> CompileResult<LogicalPlan> {
    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select.as_ref(),
        _ => {
            return Err(CompileError::Syntax(
                "only plain SELECT is supported (no UNION/EXCEPT/INTERSECT)".to_string(),
            ))
        }
    };

    let mut node = from_to_node(&select.from)?;

    if let Some(selection) = &select.selection {
        node = PlanNode::Filter {
            predicate: convert_expr(selection)?,
            input: Box::new(node),
        };
    }

    reject_grouping(select)?;

    node = PlanNode::Projection {
        exprs: projection_exprs(&select.projection)?,
        input: Box::new(node),
    };

    if let Some(order_by) = &query.order_by {
        node = PlanNode::Sort {
            keys: order_by
                .exprs
                .iter()
                .map(convert_order_key)
                .collect::<CompileResult<_>>()?,
            input: Box::new(node),
        };
    }

    if let Some(limit) = &query.limit {
        node = PlanNode::Limit {
            fetch: convert_limit(limit)?,
            input: Box::new(node),
        };
    }

    Ok(LogicalPlan::new(node))
}

fn reject_grouping(select: &Select) -> CompileResult<()> {
    let grouped = match &select.group_by {
        GroupByExpr::Expressions(exprs, _) => !exprs.is_empty(),
        GroupByExpr::All(_) => true,
    };
    if grouped || select.having.is_some() {
        return Err(CompileError::Syntax(
            "GROUP BY / HAVING are not supported".to_string(),
        ));
    }
    Ok(())
}

/// Zero sources become a one-row scan; joins and comma-separated sources
/// parse into a Join tree that resolution later rejects.
fn from_to_node(from: &[TableWithJoins]) -> CompileResult<PlanNode> {
    let mut sources = Vec::new();
    for table in from {
        sources.push(table_factor_to_node(&table.relation)?);
        for join in &table.joins {
            sources.push(table_factor_to_node(&join.relation)?);
        }
    }

    let mut sources = sources.into_iter();
    let first = match sources.next() {
        Some(node) => node,
        None => return Ok(PlanNode::OneRow),
    };
    Ok(sources.fold(first, |left, right| PlanNode::Join {
        left: Box::new(left),
        right: Box::new(right),
    }))
}

fn table_factor_to_node(factor: &TableFactor) -> CompileResult<PlanNode> {
    match factor {
        TableFactor::Table { name, .. } => Ok(PlanNode::Relation {
            name: object_name_to_string(name),
        }),
        _ => Err(CompileError::Syntax(
            "only plain relation names are supported in FROM".to_string(),
        )),
    }
}

fn projection_exprs(projection: &[SelectItem]) -> CompileResult<Vec<(Expr, String)>> {
    let mut exprs = Vec::with_capacity(projection.len());
    for item in projection {
        match item {
            SelectItem::UnnamedExpr(sql_expr) => {
                let expr = convert_expr(sql_expr)?;
                let name = expr.to_string();
                exprs.push((expr, name));
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                exprs.push((convert_expr(expr)?, alias.value.clone()));
            }
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(_, _) => {
                return Err(CompileError::Syntax(
                    "SELECT * is not supported (use explicit columns)".to_string(),
                ))
            }
        }
    }
    Ok(exprs)
}

fn convert_order_key(order: &OrderByExpr) -> CompileResult<SortKey> {
    let expr = convert_expr(&order.expr)?;
    if !matches!(expr, Expr::Column { .. }) {
        return Err(CompileError::Syntax(
            "ORDER BY supports column references only".to_string(),
        ));
    }
    Ok(SortKey {
        expr,
        ascending: order.asc.unwrap_or(true),
    })
}

fn convert_limit(limit: &SqlExpr) -> CompileResult<usize> {
    match convert_expr(limit)? {
        Expr::Literal(Literal::Int(value)) if value >= 0 => Ok(value as usize),
        _ => Err(CompileError::Syntax(
            "LIMIT must be a non-negative integer literal".to_string(),
        )),
    }
}

fn convert_expr(expr: &SqlExpr) -> CompileResult<Expr> {
    match expr {
        SqlExpr::Identifier(ident) => Ok(column(&[ident.clone()])),
        SqlExpr::CompoundIdentifier(parts) => Ok(column(parts)),
        SqlExpr::Value(value) => convert_value(value),
        SqlExpr::TypedString { data_type, value } => convert_temporal(data_type, value),
        SqlExpr::Nested(inner) => convert_expr(inner),
        SqlExpr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
            left: Box::new(convert_expr(left)?),
            op: convert_binop(op)?,
            right: Box::new(convert_expr(right)?),
        }),
        SqlExpr::UnaryOp {
            op: SqlUnaryOp::Not,
            expr,
        } => Ok(Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(convert_expr(expr)?),
        }),
        SqlExpr::IsNull(inner) => Ok(Expr::IsNull {
            expr: Box::new(convert_expr(inner)?),
            negated: false,
        }),
        SqlExpr::IsNotNull(inner) => Ok(Expr::IsNull {
            expr: Box::new(convert_expr(inner)?),
            negated: true,
        }),
        other => Err(CompileError::Syntax(format!(
            "unsupported SQL expression: {other}"
        ))),
    }
}

fn column(parts: &[Ident]) -> Expr {
    let name = parts
        .iter()
        .map(|ident| ident.value.clone())
        .collect::<Vec<_>>()
        .join(".");
    Expr::Column {
        name,
        binding: None,
    }
}

fn convert_value(value: &SqlValue) -> CompileResult<Expr> {
    match value {
        SqlValue::Number(raw, _) => {
            if raw.contains('.') {
                let parsed: f64 = raw
                    .parse()
                    .map_err(|_| CompileError::Syntax(format!("bad number: {raw}")))?;
                Ok(Expr::Literal(Literal::Float(parsed)))
            } else {
                let parsed: i64 = raw
                    .parse()
                    .map_err(|_| CompileError::Syntax(format!("bad number: {raw}")))?;
                Ok(Expr::Literal(Literal::Int(parsed)))
            }
        }
        SqlValue::SingleQuotedString(s) => Ok(Expr::Literal(Literal::String(s.clone()))),
        SqlValue::Boolean(b) => Ok(Expr::Literal(Literal::Bool(*b))),
        SqlValue::Null => Ok(Expr::Literal(Literal::Null)),
        other => Err(CompileError::Syntax(format!(
            "unsupported SQL literal: {other}"
        ))),
    }
}

/// `DATE '...'` / `TIMESTAMP '...'` literals. The naive value is assumed
/// to be in the session time zone, taken from the current compilation
/// context.
fn convert_temporal(data_type: &DataType, raw: &str) -> CompileResult<Expr> {
    let offset = CompilationContext::current()?.configuration().time_zone();
    let trimmed = raw.trim();
    let timestamp = match data_type {
        DataType::Date => Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
            .map_err(|_| CompileError::Syntax(format!("bad DATE literal: {raw}")))?
            .midnight()
            .assume_offset(offset),
        DataType::Timestamp(_, _) | DataType::Datetime(_) => PrimitiveDateTime::parse(
            trimmed,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        )
        .map_err(|_| CompileError::Syntax(format!("bad TIMESTAMP literal: {raw}")))?
        .assume_offset(offset),
        other => {
            return Err(CompileError::Syntax(format!(
                "unsupported typed literal: {other}"
            )))
        }
    };
    Ok(Expr::Literal(Literal::Timestamp(timestamp)))
}

fn convert_binop(op: &SqlBinaryOp) -> CompileResult<BinaryOperator> {
    Ok(match op {
        SqlBinaryOp::Eq => BinaryOperator::Eq,
        SqlBinaryOp::NotEq => BinaryOperator::Ne,
        SqlBinaryOp::Lt => BinaryOperator::Lt,
        SqlBinaryOp::Gt => BinaryOperator::Gt,
        SqlBinaryOp::LtEq => BinaryOperator::Lte,
        SqlBinaryOp::GtEq => BinaryOperator::Gte,
        SqlBinaryOp::And => BinaryOperator::And,
        SqlBinaryOp::Or => BinaryOperator::Or,
        other => {
            return Err(CompileError::Syntax(format!(
                "unsupported binary operator: {other}"
            )))
        }
    })
}

fn object_name_to_string(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}
