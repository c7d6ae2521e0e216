//! Error types for the rating engine
//!
//! This module defines all error types using anyhow for consistent error
//! handling throughout the crate.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("need multiple rating groups")]
    NeedMultipleGroups,

    #[error("each rating group must contain at least one rating")]
    EmptyRatingGroup,

    #[error("got {got} ranks for {expected} rating groups")]
    RankCountMismatch { expected: usize, got: usize },

    #[error("weights do not match the shape of the rating groups")]
    WeightShapeMismatch,

    #[error("min_delta must be greater than 0 (got {0})")]
    NonPositiveMinDelta(f64),

    #[error("sigma must be greater than 0 (got {0})")]
    NonPositiveSigma(f64),

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("w function produced {w}, outside the open interval (0, 1)")]
    WOutOfRange { w: f64 },

    #[error("draw margin collapsed both cdf terms to the same value")]
    DrawMarginCollapse,

    #[error("match quality matrix is singular")]
    SingularMatrix,
}
