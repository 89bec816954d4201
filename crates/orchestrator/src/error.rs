//! Error types for orchestrator operations.

use thiserror::Error;

/// Errors surfaced by orchestrator entry points.
///
/// Model failures inside a running turn are not part of this enum's public
/// life: they are caught at the turn boundary, logged, and reported to
/// clients as a generic `error` event instead of propagating.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Persistence failed.
    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),

    /// A model gateway call failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] chat_core::GatewayError),

    /// The caller's tenant does not own the addressed session.
    #[error("caller tenant does not own this session")]
    Unauthorized,
}
