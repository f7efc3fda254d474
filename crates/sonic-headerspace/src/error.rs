//! Error types for header space operations.

use thiserror::Error;

/// Errors raised by bounded header space operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpaceError {
    /// A subtraction produced more cubes than the caller allowed.
    #[error("header space grew to {reached} cubes, exceeding the limit of {limit}")]
    SpaceLimitExceeded {
        /// Configured maximum cube count.
        limit: usize,
        /// Cube count at the point the limit was hit.
        reached: usize,
    },
}
