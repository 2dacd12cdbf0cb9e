//! Attribute binding and verification.

use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::plan::{Expr, LogicalPlan};
use crate::session::CompilationContext;

/// Binds column references to catalog fields.
///
/// `analyze` reads the catalog from the current compilation context; the
/// session installs that context before calling in. A plan becomes
/// `analyzed` once every column reference is bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer;

/// Record of one analyzer rule execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep {
    pub rule: String,
    pub changed: bool,
}

/// Rule-execution trace, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisTrace {
    pub steps: Vec<TraceStep>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self
    }

    /// Bind column references against the context catalog.
    pub fn analyze(&self, plan: LogicalPlan) -> CompileResult<LogicalPlan> {
        let context = CompilationContext::current()?;
        Ok(bind_references(plan, &context))
    }

    /// Fail when any column reference is still unbound.
    pub fn verify(&self, plan: LogicalPlan) -> CompileResult<LogicalPlan> {
        let attributes = unresolved_attributes(&plan);
        if attributes.is_empty() {
            Ok(plan)
        } else {
            Err(CompileError::UnresolvedReference { attributes })
        }
    }

    /// Run analysis while recording which rules changed the plan.
    pub fn debug_analyze(&self, plan: LogicalPlan) -> CompileResult<AnalysisTrace> {
        let context = CompilationContext::current()?;
        let before = plan.clone();
        let bound = bind_references(plan, &context);
        Ok(AnalysisTrace {
            steps: vec![TraceStep {
                rule: "bind_references".to_string(),
                changed: bound != before,
            }],
        })
    }
}

fn bind_references(plan: LogicalPlan, context: &CompilationContext) -> LogicalPlan {
    let schema = context.catalog().single_relation();
    let mut all_bound = true;
    let node = plan.node.map_exprs(&mut |expr| match expr {
        Expr::Column { name, binding } => {
            let binding = binding.or_else(|| {
                schema.and_then(|schema| schema.resolve_field(&name))
            });
            if binding.is_none() {
                all_bound = false;
            }
            Expr::Column { name, binding }
        }
        other => other,
    });
    debug!(analyzed = all_bound, "bound column references");
    LogicalPlan::bound(node, all_bound)
}

fn unresolved_attributes(plan: &LogicalPlan) -> Vec<String> {
    let mut attributes = Vec::new();
    plan.node.visit_exprs(&mut |expr| {
        if let Expr::Column { name, binding: None } = expr {
            if !attributes.iter().any(|seen| seen == name) {
                attributes.push(name.clone());
            }
        }
    });
    attributes
}
