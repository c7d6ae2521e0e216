//! Gaussian distributions in natural (precision) parameterization
//!
//! Beliefs and messages are stored as (pi, tau) = (precision,
//! precision-weighted mean) because belief-propagation updates reduce to
//! componentwise addition and subtraction in these coordinates.

use crate::error::{RatingError, Result};
use std::fmt;

/// A one-dimensional Gaussian in natural parameters.
///
/// `pi` is the precision (1 / sigma^2) and `tau` is the precision-weighted
/// mean (pi * mu). The default value (0, 0) is the fully uninformative
/// flat belief.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Gaussian {
    /// Precision, the inverse of the variance.
    pub pi: f64,
    /// Precision-adjusted mean, the precision multiplied by the mean.
    pub tau: f64,
}

impl Gaussian {
    /// Create a Gaussian directly from natural parameters.
    pub fn from_precision(pi: f64, tau: f64) -> Self {
        Self { pi, tau }
    }

    /// Create a Gaussian from conventional (mean, standard deviation)
    /// parameters. Fails if `sigma` is not strictly positive.
    pub fn from_mu_sigma(mu: f64, sigma: f64) -> Result<Self> {
        if sigma <= 0.0 {
            return Err(RatingError::NonPositiveSigma(sigma).into());
        }
        let pi = sigma.powi(-2);
        Ok(Self { pi, tau: pi * mu })
    }

    /// The mean. Defined as 0 for the flat belief (pi == 0).
    pub fn mu(&self) -> f64 {
        if self.pi == 0.0 {
            0.0
        } else {
            self.tau / self.pi
        }
    }

    /// The standard deviation. Defined as infinity for the flat belief.
    pub fn sigma(&self) -> f64 {
        if self.pi == 0.0 {
            f64::INFINITY
        } else {
            (1.0 / self.pi).sqrt()
        }
    }

    /// Exact product of two Gaussian densities.
    pub fn mul(&self, other: &Gaussian) -> Gaussian {
        Gaussian {
            pi: self.pi + other.pi,
            tau: self.tau + other.tau,
        }
    }

    /// Exact quotient of two Gaussian densities.
    pub fn div(&self, other: &Gaussian) -> Gaussian {
        Gaussian {
            pi: self.pi - other.pi,
            tau: self.tau - other.tau,
        }
    }
}

impl fmt::Display for Gaussian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N(mu={:.3}, sigma={:.3})", self.mu(), self.sigma())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_flat() {
        let g = Gaussian::default();
        assert_eq!(g.pi, 0.0);
        assert_eq!(g.tau, 0.0);
        assert_eq!(g.mu(), 0.0);
        assert_eq!(g.sigma(), f64::INFINITY);
    }

    #[test]
    fn test_from_mu_sigma() {
        let g = Gaussian::from_mu_sigma(25.0, 8.0).unwrap();
        assert!((g.mu() - 25.0).abs() < 1e-12);
        assert!((g.sigma() - 8.0).abs() < 1e-12);
        assert!((g.pi - 1.0 / 64.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_sigma_rejected() {
        assert!(Gaussian::from_mu_sigma(25.0, 0.0).is_err());
        assert!(Gaussian::from_mu_sigma(25.0, -1.0).is_err());
    }

    #[test]
    fn test_mul_div_roundtrip() {
        let a = Gaussian::from_mu_sigma(25.0, 8.0).unwrap();
        let b = Gaussian::from_mu_sigma(30.0, 5.0).unwrap();
        let product = a.mul(&b);
        assert!((product.pi - (a.pi + b.pi)).abs() < 1e-12);
        assert!((product.tau - (a.tau + b.tau)).abs() < 1e-12);
        let back = product.div(&b);
        assert!((back.pi - a.pi).abs() < 1e-12);
        assert!((back.tau - a.tau).abs() < 1e-12);
    }

    #[test]
    fn test_mul_with_flat_is_identity() {
        let a = Gaussian::from_mu_sigma(25.0, 8.0).unwrap();
        let flat = Gaussian::default();
        let product = a.mul(&flat);
        assert_eq!(product.pi, a.pi);
        assert_eq!(product.tau, a.tau);
    }

    #[test]
    fn test_display() {
        let g = Gaussian::from_mu_sigma(25.0, 8.0).unwrap();
        assert_eq!(g.to_string(), "N(mu=25.000, sigma=8.000)");
    }
}
