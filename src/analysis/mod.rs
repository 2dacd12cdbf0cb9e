//! Pre-analysis and analysis of parsed statements.
//!
//! Pre-analysis extracts *what* a statement references; it never resolves
//! anything. Analysis binds those references against the catalog carried
//! by the compilation context.

mod analyzer;

pub use analyzer::{AnalysisTrace, Analyzer, TraceStep};

use crate::plan::{LogicalPlan, PlanNode};

/// Relations referenced by a parsed statement, in first-appearance order.
///
/// Ordered for stable diagnostics, deduplicated — semantically a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreAnalysis {
    pub relations: Vec<String>,
}

/// Extracts the set of relation names a statement references.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreAnalyzer;

impl PreAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn pre_analyze(&self, plan: &LogicalPlan) -> PreAnalysis {
        let mut relations: Vec<String> = Vec::new();
        plan.node.visit(&mut |node| {
            if let PlanNode::Relation { name } = node {
                if !relations.iter().any(|seen| seen == name) {
                    relations.push(name.clone());
                }
            }
        });
        PreAnalysis { relations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlParser;

    fn pre_analyze(sql: &str) -> Vec<String> {
        let plan = SqlParser::new().create_statement(sql).unwrap();
        PreAnalyzer::new().pre_analyze(&plan).relations
    }

    #[test]
    fn single_relation() {
        assert_eq!(pre_analyze("SELECT a FROM t"), vec!["t".to_string()]);
    }

    #[test]
    fn no_relations() {
        assert!(pre_analyze("SELECT 1").is_empty());
    }

    #[test]
    fn multiple_relations_deduplicated_in_order() {
        assert_eq!(
            pre_analyze("SELECT a FROM t2, t1, t2"),
            vec!["t2".to_string(), "t1".to_string()]
        );
    }
}
