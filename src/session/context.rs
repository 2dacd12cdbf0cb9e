//! Call-scoped compilation context.
//!
//! The context pairs the session configuration with the catalog resolved
//! for the statement at hand. It lives in task-local storage, keyed per
//! logical compilation, so interleaved compilations on the same worker
//! never observe each other's context. The session installs it
//! immediately before each synchronous stage body and the scope removes
//! it on exit — success, error, or unwind alike. A scope never spans an
//! `.await`; the resolution wait happens outside any installed context.

use crate::catalog::Catalog;
use crate::config::Configuration;
use crate::error::{CompileError, CompileResult};

tokio::task_local! {
    static CURRENT_CONTEXT: CompilationContext;
}

/// Configuration + resolved catalog, scoped to one stage invocation.
#[derive(Debug, Clone)]
pub struct CompilationContext {
    configuration: Configuration,
    catalog: Catalog,
}

impl CompilationContext {
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Context of the stage currently executing on this task.
    ///
    /// Querying outside any stage scope is an integration error and fails
    /// with [`CompileError::ContextUnavailable`] rather than falling back
    /// to a default.
    pub fn current() -> CompileResult<CompilationContext> {
        CURRENT_CONTEXT
            .try_with(CompilationContext::clone)
            .map_err(|_| CompileError::ContextUnavailable)
    }

    /// Install a context for the duration of `stage`.
    ///
    /// Stages never re-enter installation; nesting is unsupported.
    pub(crate) fn scope<T>(
        configuration: Configuration,
        catalog: Catalog,
        stage: impl FnOnce() -> T,
    ) -> T {
        CURRENT_CONTEXT.sync_scope(
            Self {
                configuration,
                catalog,
            },
            stage,
        )
    }
}
