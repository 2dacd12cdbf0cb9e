//! # Sift
//!
//! A SQL frontend that compiles to document-search queries against a
//! schemaless store. Relation schemas are not declared up front; they are
//! discovered per-statement through an asynchronous resolver and carried
//! through the pipeline as a [`catalog::Catalog`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       SQL text                          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [parser]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  LogicalPlan (unbound)                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [pre-analysis → async resolver]
//! ┌─────────────────────────────────────────────────────────┐
//! │            Catalog (discovered relation schema)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [analyzer + verifier, optimizer]
//! ┌─────────────────────────────────────────────────────────┐
//! │               LogicalPlan (bound, verified)             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │        PhysicalPlan (search request + result schema)    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`session::Session`] drives the stages, installing a scoped
//! [`session::CompilationContext`] (configuration + catalog) around each
//! synchronous stage body. The only asynchronous suspension point is
//! relation resolution.

pub mod analysis;
pub mod catalog;
pub mod config;
pub mod error;
pub mod exec;
pub mod optimizer;
pub mod parser;
pub mod plan;
pub mod planner;
pub mod querydsl;
pub mod session;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::analysis::{AnalysisTrace, Analyzer, PreAnalysis, PreAnalyzer};
    pub use crate::catalog::{
        Catalog, FieldBinding, FieldDef, FieldType, RelationResolver, RelationSchema,
        ResolveError, StaticResolver,
    };
    pub use crate::config::{Configuration, Settings};
    pub use crate::error::{CompileError, CompileResult};
    pub use crate::exec::{RowSet, Schema, SearchEngine, SearchRequest, SearchResponse, StaticEngine};
    pub use crate::plan::{
        col, lit_bool, lit_float, lit_int, lit_null, lit_str, BinaryOperator, Expr, Literal,
        LogicalPlan, PlanNode, SortKey, UnaryOperator,
    };
    pub use crate::planner::{PhysicalPlan, Planner};
    pub use crate::querydsl::{Location, NestedSortSpec, Query};
    pub use crate::session::{CompilationContext, Session};
}

pub use error::{CompileError, CompileResult};
pub use session::{CompilationContext, Session};
