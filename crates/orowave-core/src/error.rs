use thiserror::Error;

/// Errors raised while processing a single quad.
///
/// A failing quad aborts atomically: the batch driver records a skipped
/// diagnostics entry and moves on to the next quad.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Triangle with no area, or a mask selecting no grid points.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The vertex bounding box maps to fewer than two samples on an axis.
    #[error("terrain window too small: {0}")]
    EmptyWindow(String),

    /// An elevation override does not match the window it is applied to.
    #[error("field of {found} samples does not match a {nlat}x{nlon} window")]
    DimensionMismatch {
        found: usize,
        nlat: usize,
        nlon: usize,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
