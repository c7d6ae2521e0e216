//! Rating presentation type
//!
//! A `Rating` is the conventional (mu, sigma) view of a player's skill
//! belief. The factor graph works in natural parameters internally; ratings
//! are what callers hand in and get back.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::environment::{DEFAULT_MU, DEFAULT_SIGMA};
use crate::gaussian::Gaussian;

/// Unique identifier for players in keyed rating groups
pub type PlayerId = String;

/// A player's skill belief as (mean, standard deviation)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// Estimated skill mean
    pub mu: f64,
    /// Uncertainty of the estimate
    pub sigma: f64,
}

impl Rating {
    /// Create a rating with explicit mean and deviation
    pub fn new(mu: f64, sigma: f64) -> Self {
        Self { mu, sigma }
    }

    /// Variance of the rating (sigma squared)
    pub fn variance(&self) -> f64 {
        self.sigma * self.sigma
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self {
            mu: DEFAULT_MU,
            sigma: DEFAULT_SIGMA,
        }
    }
}

impl From<Gaussian> for Rating {
    fn from(g: Gaussian) -> Self {
        Self {
            mu: g.mu(),
            sigma: g.sigma(),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rating(mu={:.3}, sigma={:.3})", self.mu, self.sigma)
    }
}
