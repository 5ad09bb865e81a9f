use thiserror::Error;

use crate::types::VertexId;

/// Caller misuse surfaced by the integration engine and the diagram builder.
///
/// Degenerate geometry never ends up here: it is absorbed locally and simply
/// contributes nothing to the accumulated result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OffsetError {
    #[error("integration radius must be finite and positive, got {0}")]
    InvalidRadius(f64),

    #[error("arc tolerance must be finite and positive, got {0}")]
    InvalidTolerance(f64),

    #[error("vertex {0} is not part of the triangulation")]
    UnknownVertex(VertexId),

    #[error("diagram bound must be finite and positive, got {0}")]
    InvalidBound(f64),

    #[error("point {index} is invalid: {reason}")]
    InvalidPoint { index: usize, reason: &'static str },

    #[error("field holds {found} values for {expected} points")]
    FieldLength { expected: usize, found: usize },

    #[error("{0} values cannot be convolved")]
    NotConvolvable(&'static str),
}
