//! Error types returned by the matcher.

use thiserror::Error;

use crate::projection::ProjectionError;

/// Failure of a matching operation.
///
/// Every fallible session operation aborts on the first error and leaves the
/// previously committed session state untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    /// A caller-supplied value was rejected before any work began
    /// (non-positive radius, image source without a pixel position, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The pipeline ran to completion but no correspondence survived.
    #[error("no matching objects found ({image} image sources, {catalog} catalog sources)")]
    NoMatchFound { image: usize, catalog: usize },
    /// The coordinate projector failed; passed through unchanged.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}
