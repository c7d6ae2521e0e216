//! Gaussian factor graph and its message-passing engine
//!
//! Variables and factors live in flat arenas owned by `FactorGraph` and
//! refer to each other through small integer handles, so there are no
//! ownership cycles. A graph is built fresh for every rating calculation
//! and discarded once the updated beliefs have been read out.

pub mod factor;
pub mod variable;

pub use factor::{Factor, TruncateKind};
pub use variable::Variable;

use crate::error::Result;
use crate::gaussian::Gaussian;

/// Handle to a variable in the graph's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub(crate) usize);

/// Handle to a factor in the graph's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactorId(pub(crate) usize);

/// Arena-allocated factor graph
#[derive(Debug, Default)]
pub struct FactorGraph {
    vars: Vec<Variable>,
    factors: Vec<Factor>,
}

impl FactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh variable with a flat belief
    pub fn add_variable(&mut self) -> VarId {
        self.vars.push(Variable::new());
        VarId(self.vars.len() - 1)
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.vars[id.0]
    }

    /// Add a factor, seeding a flat message slot on every variable it
    /// touches
    pub fn add_factor(&mut self, factor: Factor) -> FactorId {
        let id = FactorId(self.factors.len());
        for var in factor.vars() {
            self.vars[var.0].attach(id);
        }
        self.factors.push(factor);
        id
    }

    /// Push this factor's message toward its leaf-ward variable, returning
    /// the resulting delta
    pub fn down(&mut self, id: FactorId) -> Result<f64> {
        let factor = self.factors[id.0].clone();
        match factor {
            Factor::Prior {
                var,
                mean,
                sigma,
                dynamic,
            } => {
                // Dynamics are added in variance before the square root.
                let inflated = (sigma * sigma + dynamic * dynamic).sqrt();
                let value = Gaussian::from_mu_sigma(mean, inflated)?;
                Ok(self.vars[var.0].update_value(id, value))
            }
            Factor::Likelihood {
                mean,
                value,
                variance,
            } => {
                let msg = self.vars[mean.0].value().div(&self.vars[mean.0].message(id));
                let a = likelihood_gain(variance, &msg);
                let message = Gaussian::from_precision(a * msg.pi, a * msg.tau);
                Ok(self.vars[value.0].update_message(id, message))
            }
            Factor::Sum { sum, terms, coeffs } => Ok(self.sum_update(id, sum, &terms, &coeffs)),
            Factor::Truncate { .. } => Ok(0.0),
        }
    }

    /// Push this factor's message toward its root-ward variable. For sum
    /// factors `index` selects which term receives the message; the other
    /// kinds ignore it.
    pub fn up(&mut self, id: FactorId, index: usize) -> Result<f64> {
        let factor = self.factors[id.0].clone();
        match factor {
            Factor::Prior { .. } => Ok(0.0),
            Factor::Likelihood {
                mean,
                value,
                variance,
            } => {
                let msg = self.vars[value.0]
                    .value()
                    .div(&self.vars[value.0].message(id));
                let a = likelihood_gain(variance, &msg);
                let message = Gaussian::from_precision(a * msg.pi, a * msg.tau);
                Ok(self.vars[mean.0].update_message(id, message))
            }
            Factor::Sum { sum, terms, coeffs } => {
                let coeff = coeffs[index];
                let derived: Vec<f64> = coeffs
                    .iter()
                    .enumerate()
                    .map(|(x, &c)| {
                        // A zero-weight term contributes nothing; never
                        // divide by its coefficient.
                        if coeff == 0.0 {
                            return 0.0;
                        }
                        let p = if x == index { 1.0 / coeff } else { -c / coeff };
                        if p.is_finite() {
                            p
                        } else {
                            0.0
                        }
                    })
                    .collect();
                let mut vals = terms.clone();
                vals[index] = sum;
                Ok(self.sum_update(id, terms[index], &vals, &derived))
            }
            Factor::Truncate {
                var,
                kind,
                draw_margin,
            } => {
                let val = self.vars[var.0].value();
                let msg = self.vars[var.0].message(id);
                let div = val.div(&msg);
                let sqrt_pi = div.pi.sqrt();
                let v = kind.v(div.tau / sqrt_pi, draw_margin * sqrt_pi);
                let w = kind.w(div.tau / sqrt_pi, draw_margin * sqrt_pi)?;
                let denom = 1.0 - w;
                let pi = div.pi / denom;
                let tau = (div.tau + sqrt_pi * v) / denom;
                Ok(self.vars[var.0].update_value(id, Gaussian::from_precision(pi, tau)))
            }
        }
    }

    /// Shared update rule for sum factors: mix the listed variables
    /// (divided by their last message from this factor) with the given
    /// coefficients and send the result to `target`.
    fn sum_update(&mut self, id: FactorId, target: VarId, vals: &[VarId], coeffs: &[f64]) -> f64 {
        let mut pi_inv: f64 = 0.0;
        let mut mu = 0.0;
        for (&vid, &coeff) in vals.iter().zip(coeffs) {
            let div = self.vars[vid.0].value().div(&self.vars[vid.0].message(id));
            mu += coeff * div.mu();
            // Once any term is flat the mixed precision is zero; stop
            // accumulating so infinity never meets infinity.
            if !pi_inv.is_finite() {
                continue;
            }
            pi_inv += coeff * coeff / div.pi;
        }
        let pi = 1.0 / pi_inv;
        let tau = pi * mu;
        self.vars[target.0].update_message(id, Gaussian::from_precision(pi, tau))
    }
}

fn likelihood_gain(variance: f64, msg: &Gaussian) -> f64 {
    1.0 / (1.0 + variance * msg.pi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prior_down_injects_inflated_belief() {
        let mut graph = FactorGraph::new();
        let var = graph.add_variable();
        let prior = graph.add_factor(Factor::Prior {
            var,
            mean: 25.0,
            sigma: 3.0,
            dynamic: 4.0,
        });

        graph.down(prior).unwrap();
        let belief = graph.variable(var).value();
        assert!((belief.mu() - 25.0).abs() < 1e-9);
        // Variances add: sqrt(9 + 16) = 5
        assert!((belief.sigma() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_likelihood_down_widens_belief() {
        let mut graph = FactorGraph::new();
        let skill = graph.add_variable();
        let perf = graph.add_variable();
        let prior = graph.add_factor(Factor::Prior {
            var: skill,
            mean: 25.0,
            sigma: 8.0,
            dynamic: 0.0,
        });
        let likelihood = graph.add_factor(Factor::Likelihood {
            mean: skill,
            value: perf,
            variance: 16.0,
        });

        graph.down(prior).unwrap();
        graph.down(likelihood).unwrap();

        let belief = graph.variable(perf).value();
        assert!((belief.mu() - 25.0).abs() < 1e-9);
        // Convolution with the performance noise: sqrt(64 + 16)
        assert!((belief.sigma() - 80.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_sum_down_combines_terms() {
        let mut graph = FactorGraph::new();
        let a = graph.add_variable();
        let b = graph.add_variable();
        let sum = graph.add_variable();
        for (var, mu) in [(a, 20.0), (b, 30.0)] {
            let prior = graph.add_factor(Factor::Prior {
                var,
                mean: mu,
                sigma: 4.0,
                dynamic: 0.0,
            });
            graph.down(prior).unwrap();
        }
        let factor = graph.add_factor(Factor::Sum {
            sum,
            terms: vec![a, b],
            coeffs: vec![1.0, 1.0],
        });
        graph.down(factor).unwrap();

        let belief = graph.variable(sum).value();
        assert!((belief.mu() - 50.0).abs() < 1e-9);
        assert!((belief.sigma() - 32.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_sum_up_solves_for_term() {
        let mut graph = FactorGraph::new();
        let a = graph.add_variable();
        let b = graph.add_variable();
        let sum = graph.add_variable();
        for (var, mu) in [(a, 20.0), (sum, 50.0)] {
            let prior = graph.add_factor(Factor::Prior {
                var,
                mean: mu,
                sigma: 4.0,
                dynamic: 0.0,
            });
            graph.down(prior).unwrap();
        }
        let factor = graph.add_factor(Factor::Sum {
            sum,
            terms: vec![a, b],
            coeffs: vec![1.0, 1.0],
        });

        // sum = a + b with sum ~ 50 and a ~ 20 implies b ~ 30.
        graph.up(factor, 1).unwrap();
        let belief = graph.variable(b).value();
        assert!((belief.mu() - 30.0).abs() < 1e-9);
        assert!((belief.sigma() - 32.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_sum_mix_short_circuits_on_flat_term() {
        let mut graph = FactorGraph::new();
        let informed = graph.add_variable();
        let flat = graph.add_variable();
        let sum = graph.add_variable();
        let prior = graph.add_factor(Factor::Prior {
            var: informed,
            mean: 25.0,
            sigma: 8.0,
            dynamic: 0.0,
        });
        graph.down(prior).unwrap();
        let factor = graph.add_factor(Factor::Sum {
            sum,
            terms: vec![informed, flat],
            coeffs: vec![1.0, 1.0],
        });
        graph.down(factor).unwrap();

        // One flat term makes the whole mixture flat, not NaN.
        let belief = graph.variable(sum).value();
        assert_eq!(belief.pi, 0.0);
        assert!(belief.tau == 0.0);
    }

    #[test]
    fn test_sum_mix_skips_terms_after_flat() {
        let mut graph = FactorGraph::new();
        let flat = graph.add_variable();
        let informed = graph.add_variable();
        let sum = graph.add_variable();
        let prior = graph.add_factor(Factor::Prior {
            var: informed,
            mean: 25.0,
            sigma: 8.0,
            dynamic: 0.0,
        });
        graph.down(prior).unwrap();
        let factor = graph.add_factor(Factor::Sum {
            sum,
            terms: vec![flat, informed],
            coeffs: vec![1.0, 1.0],
        });
        graph.down(factor).unwrap();

        // The flat term saturates the variance accumulator first; later
        // terms must be skipped so the result stays flat rather than NaN.
        let belief = graph.variable(sum).value();
        assert_eq!(belief.pi, 0.0);
        assert!(belief.tau == 0.0);
    }
}
