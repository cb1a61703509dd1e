//! Crate-local error type.
//!
//! Every fallible operation in `sctrace-core` returns [`TraceError`]. The
//! variants keep "bad request shape" apart from "out of range" and from
//! "misconfigured containers" so callers can branch on them without parsing
//! messages.

use thiserror::Error;

/// Errors raised by containers, the index map and the concatenation layer.
#[derive(Debug, Error)]
pub enum TraceError {
    /// A global index or range endpoint lies outside the container.
    #[error("index {index} out of bounds for a container of {len} traces")]
    OutOfBounds {
        /// Offending position.
        index: usize,
        /// Number of traces in the container that was addressed.
        len: usize,
    },

    /// A range with a non-unit step, or an index list with gaps.
    #[error("selection must be contiguous: {0}")]
    NonContiguous(String),

    /// A request that is neither an index, a unit-step range, nor a
    /// non-empty contiguous list.
    #[error("unsupported selection: {0}")]
    ArgumentKind(String),

    /// A concatenation was requested over zero containers.
    #[error("cannot concatenate an empty list of containers")]
    EmptyContainerList,

    /// Sub-containers disagree on the per-trace shape, or a fetched batch
    /// does not fit the buffer it is merged into.
    #[error("inconsistent containers: {0}")]
    Inconsistent(String),

    /// A section selector does not fit the sample it applies to.
    #[error("invalid section: {0}")]
    Section(String),

    /// Array construction failed on mismatched shapes.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl TraceError {
    /// True for [`TraceError::OutOfBounds`].
    #[must_use]
    pub const fn is_out_of_bounds(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. })
    }

    /// True for [`TraceError::NonContiguous`].
    #[must_use]
    pub const fn is_non_contiguous(&self) -> bool {
        matches!(self, Self::NonContiguous(_))
    }
}

/// Shorthand used throughout the crate.
pub type Result<T, E = TraceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_position() {
        let e = TraceError::OutOfBounds { index: 9, len: 7 };
        assert_eq!(
            e.to_string(),
            "index 9 out of bounds for a container of 7 traces"
        );
        assert!(e.is_out_of_bounds());
        assert!(!e.is_non_contiguous());
    }
}
