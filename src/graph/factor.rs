//! Factor variants and the truncation moment functions
//!
//! The graph has a closed set of factor kinds, so they are modeled as one
//! enum with each variant carrying only the fields its update rule needs.
//! The message equations themselves live on `FactorGraph`, which owns the
//! variable arena the factors refer to.

use crate::error::{RatingError, Result};
use crate::graph::VarId;
use crate::normal;

/// A constraint node in the factor graph
#[derive(Debug, Clone)]
pub enum Factor {
    /// Injects a known rating belief, inflated by the dynamics variance
    Prior {
        var: VarId,
        mean: f64,
        sigma: f64,
        dynamic: f64,
    },
    /// Couples a skill variable to a noisy performance variable
    Likelihood {
        mean: VarId,
        value: VarId,
        variance: f64,
    },
    /// Couples a sum variable to a weighted combination of term variables
    Sum {
        sum: VarId,
        terms: Vec<VarId>,
        coeffs: Vec<f64>,
    },
    /// Applies the observed win/draw outcome to a team-difference variable
    Truncate {
        var: VarId,
        kind: TruncateKind,
        draw_margin: f64,
    },
}

impl Factor {
    /// All variables this factor touches, in declaration order
    pub fn vars(&self) -> Vec<VarId> {
        match self {
            Factor::Prior { var, .. } => vec![*var],
            Factor::Likelihood { mean, value, .. } => vec![*mean, *value],
            Factor::Sum { sum, terms, .. } => {
                let mut vars = vec![*sum];
                vars.extend_from_slice(terms);
                vars
            }
            Factor::Truncate { var, .. } => vec![*var],
        }
    }
}

/// Which pair of moment functions a truncation factor applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateKind {
    /// The adjacent teams finished in strict order
    Win,
    /// The adjacent teams tied
    Draw,
}

impl TruncateKind {
    /// The "V" moment function: additive correction to the mean.
    pub fn v(&self, diff: f64, draw_margin: f64) -> f64 {
        match self {
            TruncateKind::Win => v_win(diff, draw_margin),
            TruncateKind::Draw => v_draw(diff, draw_margin),
        }
    }

    /// The "W" moment function: multiplicative correction to the variance.
    ///
    /// A result outside (0, 1) indicates catastrophic cancellation or an
    /// invalid draw margin and is reported as an error rather than allowed
    /// to poison later (pi, tau) arithmetic as NaN.
    pub fn w(&self, diff: f64, draw_margin: f64) -> Result<f64> {
        match self {
            TruncateKind::Win => w_win(diff, draw_margin),
            TruncateKind::Draw => w_draw(diff, draw_margin),
        }
    }
}

fn v_win(diff: f64, draw_margin: f64) -> f64 {
    let x = diff - draw_margin;
    let denom = normal::cdf(x);
    if denom != 0.0 {
        normal::pdf(x) / denom
    } else {
        -x
    }
}

fn v_draw(diff: f64, draw_margin: f64) -> f64 {
    let abs_diff = diff.abs();
    let a = draw_margin - abs_diff;
    let b = -draw_margin - abs_diff;
    let denom = normal::cdf(a) - normal::cdf(b);
    let numer = normal::pdf(b) - normal::pdf(a);
    let v = if denom != 0.0 { numer / denom } else { a };
    if diff < 0.0 {
        -v
    } else {
        v
    }
}

fn w_win(diff: f64, draw_margin: f64) -> Result<f64> {
    let x = diff - draw_margin;
    let v = v_win(diff, draw_margin);
    let w = v * (v + x);
    if 0.0 < w && w < 1.0 {
        Ok(w)
    } else {
        Err(RatingError::WOutOfRange { w }.into())
    }
}

fn w_draw(diff: f64, draw_margin: f64) -> Result<f64> {
    let abs_diff = diff.abs();
    let a = draw_margin - abs_diff;
    let b = -draw_margin - abs_diff;
    let denom = normal::cdf(a) - normal::cdf(b);
    if denom == 0.0 {
        return Err(RatingError::DrawMarginCollapse.into());
    }
    let v = v_draw(abs_diff, draw_margin);
    Ok(v * v + (a * normal::pdf(a) - b * normal::pdf(b)) / denom)
}
