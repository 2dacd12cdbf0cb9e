//! Crate-level compilation errors.
//!
//! Each pipeline stage reports failure through the same `Result` channel as
//! success; a failed stage aborts the compilation and no partial plan is
//! ever returned. Stage-local error types ([`crate::catalog::ResolveError`],
//! [`crate::exec::EngineError`], [`crate::config::SettingsError`]) are
//! wrapped here where they cross the session boundary.

use thiserror::Error;

use crate::catalog::ResolveError;

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors surfaced by the compilation pipeline.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The current compilation context was queried outside a stage scope.
    /// An integration error, not a user-facing one.
    #[error("compilation context is only accessible during a pipeline stage")]
    ContextUnavailable,

    /// The statement references more than one relation.
    #[error("queries with multiple relations are not supported: {}", .relations.join(", "))]
    MultipleRelations { relations: Vec<String> },

    /// The parser rejected the input text.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Verification found attributes that resolution could not satisfy.
    #[error("unresolved references: {}", .attributes.join(", "))]
    UnresolvedReference { attributes: Vec<String> },

    /// The external resolver failed to produce a catalog. Retryable by the
    /// caller; the pipeline itself never retries.
    #[error("failed to resolve relation '{relation}'")]
    Resolution {
        relation: String,
        #[source]
        source: ResolveError,
    },

    /// A structural invariant was violated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The execution engine rejected or failed the compiled request.
    #[error("execution failed: {0}")]
    Execution(String),
}
