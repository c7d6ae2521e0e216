//! Standard normal distribution helpers
//!
//! Thin wrappers over statrs exposing the three functions the rating
//! algorithm needs: density, cumulative distribution, and quantile.

use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::sync::LazyLock;

static STANDARD_NORMAL: LazyLock<Normal> =
    LazyLock::new(|| Normal::new(0.0, 1.0).expect("standard normal parameters are valid"));

/// Probability density of the standard normal at `x`.
pub fn pdf(x: f64) -> f64 {
    STANDARD_NORMAL.pdf(x)
}

/// Cumulative distribution of the standard normal at `x`.
pub fn cdf(x: f64) -> f64 {
    STANDARD_NORMAL.cdf(x)
}

/// Quantile (percent point) of the standard normal at probability `p`.
pub fn ppf(p: f64) -> f64 {
    STANDARD_NORMAL.inverse_cdf(p)
}
