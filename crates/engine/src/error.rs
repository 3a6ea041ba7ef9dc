//! Engine-level error type.

use replyflow_core::types::DbId;

/// Errors surfaced by the engine's persistence seam and lifecycle operations.
///
/// Provider failures never appear here -- they are classified
/// [`replyflow_instagram::ProviderError`]s handled inside the poll and
/// dispatch paths.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The durable store rejected or failed an operation.
    #[error("Store error: {0}")]
    Store(String),

    /// A workflow referenced by id does not exist.
    #[error("Workflow {0} not found")]
    WorkflowNotFound(DbId),

    /// No credential exists for the referenced account.
    #[error("Account {0} not found")]
    AccountNotFound(DbId),
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Store(err.to_string())
    }
}
