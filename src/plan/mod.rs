//! Logical plan tree.
//!
//! Produced by the parser, bound by the analyzer, rewritten by the
//! optimizer. The tree is a plain owned structure; rewrite passes consume
//! and rebuild it.

use std::fmt;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::catalog::FieldBinding;

/// A parsed statement, tracking whether analysis has bound its references.
///
/// `analyzed` is true only when every column reference carries a binding;
/// re-analyzing such a plan is a no-op short-circuit in the session.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalPlan {
    pub node: PlanNode,
    analyzed: bool,
}

impl LogicalPlan {
    pub fn new(node: PlanNode) -> Self {
        Self {
            node,
            analyzed: false,
        }
    }

    pub(crate) fn bound(node: PlanNode, analyzed: bool) -> Self {
        Self { node, analyzed }
    }

    pub fn analyzed(&self) -> bool {
        self.analyzed
    }
}

/// Relational operator tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    /// Scan of a single relation by name.
    Relation { name: String },
    /// Single-row source for FROM-less statements.
    OneRow,
    /// Cross product of two sources. Parsed, but rejected during relation
    /// resolution: the pipeline enforces a single-relation limit.
    Join {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    Filter {
        predicate: Expr,
        input: Box<PlanNode>,
    },
    Projection {
        exprs: Vec<(Expr, String)>,
        input: Box<PlanNode>,
    },
    Sort {
        keys: Vec<SortKey>,
        input: Box<PlanNode>,
    },
    Limit {
        fetch: usize,
        input: Box<PlanNode>,
    },
}

impl PlanNode {
    /// Pre-order traversal.
    pub fn visit(&self, f: &mut dyn FnMut(&PlanNode)) {
        f(self);
        match self {
            PlanNode::Relation { .. } | PlanNode::OneRow => {}
            PlanNode::Join { left, right } => {
                left.visit(f);
                right.visit(f);
            }
            PlanNode::Filter { input, .. }
            | PlanNode::Projection { input, .. }
            | PlanNode::Sort { input, .. }
            | PlanNode::Limit { input, .. } => input.visit(f),
        }
    }

    /// Rebuild the tree with every expression mapped through `f`.
    /// Expressions are themselves mapped bottom-up (see [`Expr::map`]).
    pub fn map_exprs(self, f: &mut dyn FnMut(Expr) -> Expr) -> PlanNode {
        match self {
            PlanNode::Relation { .. } | PlanNode::OneRow => self,
            PlanNode::Join { left, right } => PlanNode::Join {
                left: Box::new(left.map_exprs(f)),
                right: Box::new(right.map_exprs(f)),
            },
            PlanNode::Filter { predicate, input } => PlanNode::Filter {
                predicate: predicate.map(f),
                input: Box::new(input.map_exprs(f)),
            },
            PlanNode::Projection { exprs, input } => PlanNode::Projection {
                exprs: exprs
                    .into_iter()
                    .map(|(expr, name)| (expr.map(f), name))
                    .collect(),
                input: Box::new(input.map_exprs(f)),
            },
            PlanNode::Sort { keys, input } => PlanNode::Sort {
                keys: keys
                    .into_iter()
                    .map(|key| SortKey {
                        expr: key.expr.map(f),
                        ascending: key.ascending,
                    })
                    .collect(),
                input: Box::new(input.map_exprs(f)),
            },
            PlanNode::Limit { fetch, input } => PlanNode::Limit {
                fetch,
                input: Box::new(input.map_exprs(f)),
            },
        }
    }

    /// Visit every expression in the tree.
    pub fn visit_exprs(&self, f: &mut dyn FnMut(&Expr)) {
        self.visit(&mut |node| match node {
            PlanNode::Filter { predicate, .. } => predicate.visit(f),
            PlanNode::Projection { exprs, .. } => {
                for (expr, _) in exprs {
                    expr.visit(f);
                }
            }
            PlanNode::Sort { keys, .. } => {
                for key in keys {
                    key.expr.visit(f);
                }
            }
            _ => {}
        });
    }
}

/// An ORDER BY key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
}

/// Scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference; `binding` is filled in by the analyzer.
    Column {
        name: String,
        binding: Option<FieldBinding>,
    },
    Literal(Literal),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    /// Date/time literal, already shifted into the session time zone.
    Timestamp(OffsetDateTime),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
}

impl Expr {
    /// Bottom-up rewrite: children are rebuilt first, then `f` is applied
    /// to the reconstructed node.
    pub fn map(self, f: &mut dyn FnMut(Expr) -> Expr) -> Expr {
        let node = match self {
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: Box::new(left.map(f)),
                op,
                right: Box::new(right.map(f)),
            },
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op,
                expr: Box::new(expr.map(f)),
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: Box::new(expr.map(f)),
                negated,
            },
            other => other,
        };
        f(node)
    }

    /// Pre-order traversal.
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::BinaryOp { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } => expr.visit(f),
            Expr::Column { .. } | Expr::Literal(_) => {}
        }
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self),
            op: BinaryOperator::And,
            right: Box::new(other),
        }
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self),
            op: BinaryOperator::Or,
            right: Box::new(other),
        }
    }

    pub fn eq(self, other: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self),
            op: BinaryOperator::Eq,
            right: Box::new(other),
        }
    }

    pub fn not(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(self),
        }
    }
}

// Constructors

pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column {
        name: name.into(),
        binding: None,
    }
}

pub fn lit_int(value: i64) -> Expr {
    Expr::Literal(Literal::Int(value))
}

pub fn lit_float(value: f64) -> Expr {
    Expr::Literal(Literal::Float(value))
}

pub fn lit_str(value: impl Into<String>) -> Expr {
    Expr::Literal(Literal::String(value.into()))
}

pub fn lit_bool(value: bool) -> Expr {
    Expr::Literal(Literal::Bool(value))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Lte => "<=",
            BinaryOperator::Gte => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        };
        write!(f, "{symbol}")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "'{v}'"),
            Literal::Bool(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            Literal::Timestamp(v) => match v.format(&Rfc3339) {
                Ok(formatted) => write!(f, "{formatted}"),
                Err(_) => write!(f, "{v:?}"),
            },
            Literal::Null => write!(f, "NULL"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column { name, .. } => write!(f, "{name}"),
            Expr::Literal(literal) => write!(f, "{literal}"),
            Expr::BinaryOp { left, op, right } => write!(f, "{left} {op} {right}"),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => write!(f, "NOT {expr}"),
            Expr::IsNull { expr, negated } => {
                write!(f, "{expr} IS {}NULL", if *negated { "NOT " } else { "" })
            }
        }
    }
}
