#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when an estimator is constructed with no reference points.
    #[error("reference set must contain at least one point")]
    EmptyReferenceSet,

    /// Returned when a tree is built with a zero leaf capacity.
    #[error("invalid leaf_max: must be at least 1")]
    InvalidLeafMax,

    /// Returned when the adaptive sensitivity is outside [0, 1].
    #[error("invalid alpha: {0} must be in [0.0, 1.0]")]
    InvalidAlpha(f64),

    /// Returned when a kernel bandwidth is not positive and finite.
    #[error("invalid bandwidth: {0} must be positive")]
    InvalidBandwidth(f64),

    /// Returned when a numerical-integration grid has zero steps.
    #[error("invalid grid: steps_x ({steps_x}) and steps_y ({steps_y}) must be positive")]
    InvalidGridSteps {
        /// Requested steps along the first axis.
        steps_x: usize,
        /// Requested steps along the second axis.
        steps_y: usize,
    },

    /// Returned when array input columns do not match the compile-time dimension.
    #[error("dimension mismatch: expected {expected} columns, got {got}")]
    DimensionMismatch {
        /// The dimensionality the estimator was compiled for.
        expected: usize,
        /// The number of columns in the supplied array.
        got: usize,
    },

    /// Returned when a halfspace split value falls outside the edge being split.
    #[error("split value {value} lies outside the rectangle edge on axis {axis}")]
    SplitOutOfRange {
        /// The axis the split was attempted on.
        axis: usize,
        /// The offending split value.
        value: f64,
    },
}

pub type Result<T> = core::result::Result<T, Error>;
