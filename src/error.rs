//! Error types for chain composition and execution.

use thiserror::Error;

/// Errors surfaced while composing or running a chain.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage was used without overriding its required operation.
    ///
    /// This is a programming contract violation, not a data error: it
    /// fails at the stage's first invocation.
    #[error("stage `{stage}` does not implement its required operation")]
    Unimplemented { stage: String },

    /// Incompatible components were combined. Raised at composition
    /// time, never deferred to iteration.
    #[error("invalid chain composition: {0}")]
    InvalidComposition(String),

    /// A failure raised by a source's underlying sequence or by a
    /// stage's own logic, passed through unmodified.
    #[error(transparent)]
    Upstream(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl PipelineError {
    /// Wrap an arbitrary error as an upstream failure.
    pub fn upstream<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        PipelineError::Upstream(err.into())
    }
}
