use crate::state::StateId;
use thiserror::Error;

/// Errors raised by graph operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsmError {
    /// Removal target is a sentinel or is not in the graph.
    #[error("state not found: {0}")]
    StateNotFound(StateId),

    /// A label has no entry in the emission-index map.
    #[error("no emission index for label {0:?}")]
    LabelNotFound(String),

    /// A guarded projection expanded more non-emitting states than allowed.
    #[error("projection from {start} exceeded {limit} expansions (non-emitting cycle?)")]
    ExpansionLimit { start: StateId, limit: usize },
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, FsmError>;
