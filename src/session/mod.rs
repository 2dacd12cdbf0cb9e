//! Pipeline orchestration.
//!
//! A [`Session`] sequences parse → pre-analyze → resolve → analyze/verify
//! → optimize → plan → execute for one configuration and one set of
//! collaborators. Stages run strictly in order within a compilation;
//! compilations sharing a session may interleave freely, which is why the
//! compilation context lives in per-task scoped storage rather than on
//! the session itself.

mod context;

pub use context::CompilationContext;

use std::sync::Arc;

use tracing::debug;

use crate::analysis::{AnalysisTrace, Analyzer, PreAnalyzer};
use crate::catalog::{Catalog, RelationResolver};
use crate::config::Configuration;
use crate::error::{CompileError, CompileResult};
use crate::exec::{RowSet, SearchEngine};
use crate::optimizer::Optimizer;
use crate::parser::SqlParser;
use crate::plan::{Expr, LogicalPlan};
use crate::planner::{PhysicalPlan, Planner};

/// One compilation session: a configuration plus the stage collaborators.
pub struct Session {
    configuration: Configuration,
    parser: SqlParser,
    pre_analyzer: PreAnalyzer,
    analyzer: Analyzer,
    optimizer: Optimizer,
    planner: Planner,
    resolver: Arc<dyn RelationResolver>,
    engine: Arc<dyn SearchEngine>,
}

impl Session {
    pub fn new(
        configuration: Configuration,
        resolver: Arc<dyn RelationResolver>,
        engine: Arc<dyn SearchEngine>,
    ) -> Self {
        let planner = Planner::new(configuration.fetch_size());
        Self {
            configuration,
            parser: SqlParser::new(),
            pre_analyzer: PreAnalyzer::new(),
            analyzer: Analyzer::new(),
            optimizer: Optimizer::new(),
            planner,
            resolver,
            engine,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn resolver(&self) -> &Arc<dyn RelationResolver> {
        &self.resolver
    }

    /// Parse SQL text into an unbound logical plan.
    ///
    /// Parsing runs under a context with an empty catalog: it needs the
    /// configuration (time-zone-aware literals) but never resolved schema.
    pub fn parse(&self, sql: &str) -> CompileResult<LogicalPlan> {
        debug!(sql, "parsing statement");
        CompilationContext::scope(self.configuration.clone(), Catalog::empty(), || {
            self.parser.create_statement(sql)
        })
    }

    /// Parse a standalone scalar expression.
    pub fn expression(&self, text: &str) -> CompileResult<Expr> {
        CompilationContext::scope(self.configuration.clone(), Catalog::empty(), || {
            self.parser.create_expression(text)
        })
    }

    /// Analyze a parsed plan, resolving its referenced relation first.
    ///
    /// Already-analyzed plans complete immediately, untouched. The context
    /// installed here covers only the synchronous analysis body, never the
    /// resolution wait.
    pub async fn analyzed_plan(&self, parsed: LogicalPlan, verify: bool) -> CompileResult<LogicalPlan> {
        if parsed.analyzed() {
            return Ok(parsed);
        }
        let catalog = self.pre_analyze(&parsed).await?;
        CompilationContext::scope(self.configuration.clone(), catalog, || {
            let analyzed = self.analyzer.analyze(parsed)?;
            if verify {
                self.analyzer.verify(analyzed)
            } else {
                Ok(analyzed)
            }
        })
    }

    /// Analysis variant returning the rule-execution trace instead of the
    /// plan. Already-analyzed plans yield an empty trace.
    pub async fn debug_analyzed_plan(&self, parsed: LogicalPlan) -> CompileResult<AnalysisTrace> {
        if parsed.analyzed() {
            return Ok(AnalysisTrace::default());
        }
        let catalog = self.pre_analyze(&parsed).await?;
        CompilationContext::scope(self.configuration.clone(), catalog, || {
            self.analyzer.debug_analyze(parsed)
        })
    }

    /// Relation resolution sub-protocol: zero referenced relations use the
    /// empty catalog with no asynchronous step; exactly one goes through
    /// the resolver; more than one fails before any resolution attempt.
    async fn pre_analyze(&self, parsed: &LogicalPlan) -> CompileResult<Catalog> {
        let pre_analysis = self.pre_analyzer.pre_analyze(parsed);
        if pre_analysis.relations.len() > 1 {
            return Err(CompileError::MultipleRelations {
                relations: pre_analysis.relations,
            });
        }
        match pre_analysis.relations.into_iter().next() {
            None => Ok(Catalog::empty()),
            Some(relation) => {
                debug!(%relation, "resolving referenced relation");
                self.resolver
                    .resolve(&relation)
                    .await
                    .map_err(|source| CompileError::Resolution { relation, source })
            }
        }
    }

    /// Verified analysis followed by the optimizer's rewrite passes.
    pub async fn optimized_plan(&self, parsed: LogicalPlan) -> CompileResult<LogicalPlan> {
        let verified = self.analyzed_plan(parsed, true).await?;
        self.optimizer.optimize(verified)
    }

    /// Full logical pipeline plus physical planning.
    pub async fn physical_plan(&self, parsed: LogicalPlan, verify: bool) -> CompileResult<PhysicalPlan> {
        let optimized = self.optimized_plan(parsed).await?;
        self.planner.plan(optimized, verify)
    }

    /// Compile SQL text into an executable plan. The top-level entry point.
    pub async fn compile(&self, sql: &str) -> CompileResult<PhysicalPlan> {
        let parsed = self.parse(sql)?;
        self.physical_plan(parsed, true).await
    }

    /// Compile and run against the session's execution engine.
    pub async fn execute(&self, sql: &str) -> CompileResult<RowSet> {
        let plan = self.compile(sql).await?;
        plan.execute(self.engine.as_ref()).await
    }
}
