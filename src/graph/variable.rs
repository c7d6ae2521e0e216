//! Belief nodes of the factor graph
//!
//! A `Variable` holds its current Gaussian belief plus the last message
//! received from every factor attached to it, keyed by factor handle.
//! Updates return the `delta` convergence signal consumed by the schedule.

use std::collections::HashMap;

use crate::gaussian::Gaussian;
use crate::graph::FactorId;

/// A Gaussian belief node
#[derive(Debug, Clone, Default)]
pub struct Variable {
    value: Gaussian,
    messages: HashMap<FactorId, Gaussian>,
}

impl Variable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current combined belief
    pub fn value(&self) -> Gaussian {
        self.value
    }

    /// Last message received from `factor` (flat until the factor speaks)
    pub fn message(&self, factor: FactorId) -> Gaussian {
        self.messages.get(&factor).copied().unwrap_or_default()
    }

    /// Register `factor` as a connection with an initial flat message
    pub(crate) fn attach(&mut self, factor: FactorId) {
        self.messages.insert(factor, Gaussian::default());
    }

    /// Replace the belief, returning the magnitude of the change.
    pub fn set(&mut self, val: Gaussian) -> f64 {
        let delta = self.delta(&val);
        self.value = val;
        delta
    }

    /// Convergence signal between the current belief and `other`.
    ///
    /// Zero when the precision difference is infinite (replacing a flat
    /// belief), otherwise max(|delta tau|, sqrt(|delta pi|)). The square
    /// root applies to the precision term only; the schedule's termination
    /// depends on this exact formula.
    pub fn delta(&self, other: &Gaussian) -> f64 {
        let pi_delta = (self.value.pi - other.pi).abs();
        if pi_delta.is_infinite() {
            return 0.0;
        }
        (self.value.tau - other.tau).abs().max(pi_delta.sqrt())
    }

    /// Fold a replacement message from `factor` into the belief: retract
    /// the factor's previous contribution, then apply the new one.
    pub fn update_message(&mut self, factor: FactorId, message: Gaussian) -> f64 {
        let old = self.message(factor);
        self.messages.insert(factor, message);
        let updated = self.value.div(&old).mul(&message);
        self.set(updated)
    }

    /// Accept a fully replaced belief pushed by `factor`, deriving the
    /// implied message so later retractions stay consistent.
    pub fn update_value(&mut self, factor: FactorId, value: Gaussian) -> f64 {
        let old = self.message(factor);
        self.messages.insert(factor, value.mul(&old).div(&self.value));
        self.set(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_reports_change_magnitude() {
        let mut var = Variable::new();
        let informative = Gaussian::from_mu_sigma(25.0, 8.0).unwrap();
        let delta = var.set(informative);
        assert!((delta - informative.tau.abs().max(informative.pi.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn test_infinite_precision_delta_is_zero() {
        let mut var = Variable::new();
        var.set(Gaussian::from_precision(f64::INFINITY, 0.0));
        // An infinite precision difference is treated as no change so the
        // schedule never spins on it.
        assert_eq!(var.delta(&Gaussian::from_precision(1.0, 0.0)), 0.0);
        assert_eq!(var.set(Gaussian::from_precision(1.0, 0.0)), 0.0);
    }

    #[test]
    fn test_delta_formula() {
        let mut var = Variable::new();
        var.set(Gaussian::from_precision(1.0, 2.0));
        let delta = var.delta(&Gaussian::from_precision(1.09, 2.1));
        // |delta tau| = 0.1, sqrt(|delta pi|) = 0.3
        assert!((delta - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_update_message_retracts_old_contribution() {
        let mut var = Variable::new();
        let factor = FactorId(0);
        var.attach(factor);

        let first = Gaussian::from_precision(0.5, 1.0);
        var.update_message(factor, first);
        assert_eq!(var.value().pi, 0.5);
        assert_eq!(var.value().tau, 1.0);

        // A second message from the same factor supersedes the first
        // instead of stacking on top of it.
        let second = Gaussian::from_precision(0.25, 2.0);
        var.update_message(factor, second);
        assert!((var.value().pi - 0.25).abs() < 1e-12);
        assert!((var.value().tau - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_update_value_derives_message() {
        let mut var = Variable::new();
        let prior = FactorId(0);
        let other = FactorId(1);
        var.attach(prior);
        var.attach(other);

        var.update_message(other, Gaussian::from_precision(0.5, 1.0));
        let value = Gaussian::from_mu_sigma(25.0, 8.0).unwrap();
        var.update_value(prior, value);
        assert_eq!(var.value(), value);

        // The derived message is exactly what combines with the other
        // factor's message to reproduce the pushed value.
        let reconstructed = var.message(prior).mul(&var.message(other));
        assert!((reconstructed.pi - value.pi).abs() < 1e-12);
        assert!((reconstructed.tau - value.tau).abs() < 1e-12);
    }
}
