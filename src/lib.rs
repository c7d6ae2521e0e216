//! Skillgraph - TrueSkill-style Bayesian skill ratings
//!
//! This crate computes skill ratings for players and teams from match
//! outcomes. Each competitor's skill is a Gaussian belief; every `rate`
//! call builds a fresh factor graph over those beliefs and runs approximate
//! belief propagation to fold the observed outcome back into them. A
//! closed-form `quality` score estimates how fair a proposed match is.
//!
//! ```
//! use skillgraph::{Rating, TrueSkill, DEFAULT_MIN_DELTA};
//!
//! let env = TrueSkill::default();
//! let (winner, loser) = env
//!     .rate_1vs1(Rating::default(), Rating::default(), false, DEFAULT_MIN_DELTA)
//!     .unwrap();
//! assert!(winner.mu > loser.mu);
//! ```

pub mod environment;
pub mod error;
pub mod gaussian;
pub mod graph;
pub mod normal;
pub mod quality;
pub mod rating;

// Re-export commonly used types
pub use environment::{
    TrueSkill, DEFAULT_BETA, DEFAULT_DRAW_PROBABILITY, DEFAULT_MIN_DELTA, DEFAULT_MU,
    DEFAULT_SIGMA, DEFAULT_TAU,
};
pub use error::{RatingError, Result};
pub use gaussian::Gaussian;
pub use rating::{PlayerId, Rating};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
