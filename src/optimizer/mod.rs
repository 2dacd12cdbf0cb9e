//! Rule-based rewrites of analyzed plans.
//!
//! The implementation is intentionally conservative: a rewrite is applied
//! only when it cannot change the plan's meaning; otherwise the original
//! shape is preserved. Pass order is fixed:
//!
//! 1. boolean constant folding
//! 2. double-negation elimination
//! 3. adjacent filter merge

use tracing::debug;

use crate::error::CompileResult;
use crate::plan::{BinaryOperator, Expr, Literal, LogicalPlan, PlanNode, UnaryOperator};

#[derive(Debug, Clone, Copy, Default)]
pub struct Optimizer;

impl Optimizer {
    pub fn new() -> Self {
        Self
    }

    pub fn optimize(&self, plan: LogicalPlan) -> CompileResult<LogicalPlan> {
        let analyzed = plan.analyzed();
        let node = plan.node.map_exprs(&mut fold_boolean_constants);
        let node = node.map_exprs(&mut eliminate_double_negation);
        let node = merge_filters(node);
        debug!("applied rewrite passes");
        Ok(LogicalPlan::bound(node, analyzed))
    }
}

fn is_bool(expr: &Expr, value: bool) -> bool {
    matches!(expr, Expr::Literal(Literal::Bool(b)) if *b == value)
}

/// `TRUE AND x` → `x`, `FALSE OR x` → `x`, `NOT TRUE` → `FALSE`, and the
/// symmetric cases.
fn fold_boolean_constants(expr: Expr) -> Expr {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            if is_bool(&left, true) {
                *right
            } else if is_bool(&right, true) {
                *left
            } else if is_bool(&left, false) || is_bool(&right, false) {
                Expr::Literal(Literal::Bool(false))
            } else {
                Expr::BinaryOp {
                    left,
                    op: BinaryOperator::And,
                    right,
                }
            }
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => {
            if is_bool(&left, false) {
                *right
            } else if is_bool(&right, false) {
                *left
            } else if is_bool(&left, true) || is_bool(&right, true) {
                Expr::Literal(Literal::Bool(true))
            } else {
                Expr::BinaryOp {
                    left,
                    op: BinaryOperator::Or,
                    right,
                }
            }
        }
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => match *expr {
            Expr::Literal(Literal::Bool(b)) => Expr::Literal(Literal::Bool(!b)),
            inner => inner.not(),
        },
        other => other,
    }
}

/// `NOT (NOT x)` → `x`. Runs after constant folding so folded negations
/// collapse too.
fn eliminate_double_negation(expr: Expr) -> Expr {
    match expr {
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => match *expr {
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: inner,
            } => *inner,
            inner => inner.not(),
        },
        other => other,
    }
}

/// `Filter(p1, Filter(p2, input))` → `Filter(p2 AND p1, input)`.
fn merge_filters(node: PlanNode) -> PlanNode {
    match node {
        PlanNode::Filter { predicate, input } => match merge_filters(*input) {
            PlanNode::Filter {
                predicate: inner_predicate,
                input: inner_input,
            } => PlanNode::Filter {
                predicate: inner_predicate.and(predicate),
                input: inner_input,
            },
            merged => PlanNode::Filter {
                predicate,
                input: Box::new(merged),
            },
        },
        PlanNode::Projection { exprs, input } => PlanNode::Projection {
            exprs,
            input: Box::new(merge_filters(*input)),
        },
        PlanNode::Sort { keys, input } => PlanNode::Sort {
            keys,
            input: Box::new(merge_filters(*input)),
        },
        PlanNode::Limit { fetch, input } => PlanNode::Limit {
            fetch,
            input: Box::new(merge_filters(*input)),
        },
        PlanNode::Join { left, right } => PlanNode::Join {
            left: Box::new(merge_filters(*left)),
            right: Box::new(merge_filters(*right)),
        },
        leaf => leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{col, lit_bool, lit_int};

    fn optimize_expr(expr: Expr) -> Expr {
        let plan = LogicalPlan::new(PlanNode::Filter {
            predicate: expr,
            input: Box::new(PlanNode::Relation {
                name: "t".to_string(),
            }),
        });
        let optimized = Optimizer::new().optimize(plan).unwrap();
        match optimized.node {
            PlanNode::Filter { predicate, .. } => predicate,
            other => panic!("expected Filter, got {other:?}"),
        }
    }

    #[test]
    fn folds_boolean_constants() {
        let expr = lit_bool(true).and(col("x").eq(lit_int(1)));
        assert_eq!(optimize_expr(expr), col("x").eq(lit_int(1)));

        let expr = col("x").eq(lit_int(1)).or(lit_bool(true));
        assert_eq!(optimize_expr(expr), lit_bool(true));
    }

    #[test]
    fn eliminates_double_negation() {
        let expr = col("x").eq(lit_int(1)).not().not();
        assert_eq!(optimize_expr(expr), col("x").eq(lit_int(1)));
    }

    #[test]
    fn merges_adjacent_filters() {
        let plan = LogicalPlan::new(PlanNode::Filter {
            predicate: col("a").eq(lit_int(1)),
            input: Box::new(PlanNode::Filter {
                predicate: col("b").eq(lit_int(2)),
                input: Box::new(PlanNode::Relation {
                    name: "t".to_string(),
                }),
            }),
        });
        let optimized = Optimizer::new().optimize(plan).unwrap();
        let PlanNode::Filter { predicate, input } = optimized.node else {
            panic!("expected a single Filter");
        };
        assert_eq!(predicate, col("b").eq(lit_int(2)).and(col("a").eq(lit_int(1))));
        assert!(matches!(*input, PlanNode::Relation { .. }));
    }

    #[test]
    fn optimization_preserves_analyzed_flag() {
        let plan = LogicalPlan::new(PlanNode::OneRow);
        let optimized = Optimizer::new().optimize(plan).unwrap();
        assert!(!optimized.analyzed());
    }
}
