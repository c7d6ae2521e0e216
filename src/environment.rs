//! TrueSkill rating environment
//!
//! An environment owns the rating constants and the two core algorithms:
//! `rate`, which assembles a five-layer factor graph per match and runs the
//! message-passing schedule to convergence, and `quality`, which evaluates
//! the closed-form draw probability of a proposed match. Environments are
//! plain values; construct one (or use `TrueSkill::default()`) and pass it
//! wherever ratings are computed. There is no process-wide singleton.

use std::collections::HashMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{RatingError, Result};
use crate::graph::{Factor, FactorGraph, FactorId, TruncateKind, VarId};
use crate::normal;
use crate::quality::{rotated_a_matrix, variance_matrix};
use crate::rating::{PlayerId, Rating};

/// Default initial mean of ratings
pub const DEFAULT_MU: f64 = 25.0;
/// Default initial standard deviation of ratings
pub const DEFAULT_SIGMA: f64 = DEFAULT_MU / 3.0;
/// Default distance that guarantees about a 76% chance of winning
pub const DEFAULT_BETA: f64 = DEFAULT_SIGMA / 2.0;
/// Default dynamics factor (skill drift between matches)
pub const DEFAULT_TAU: f64 = DEFAULT_SIGMA / 100.0;
/// Default draw probability of the game
pub const DEFAULT_DRAW_PROBABILITY: f64 = 0.10;
/// Default convergence threshold for the message-passing schedule
pub const DEFAULT_MIN_DELTA: f64 = 0.0001;

/// A TrueSkill environment holding the rating constants
///
/// Different games need different constants; a game where 60% of matches
/// end drawn should set `draw_probability` to 0.60.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueSkill {
    /// Initial mean for new ratings
    pub mu: f64,
    /// Initial standard deviation for new ratings
    pub sigma: f64,
    /// Distance between skill levels giving ~76% win probability
    pub beta: f64,
    /// Dynamics factor modelling skill drift between matches
    pub tau: f64,
    /// Probability that a match ends in a draw
    pub draw_probability: f64,
}

impl Default for TrueSkill {
    fn default() -> Self {
        Self {
            mu: DEFAULT_MU,
            sigma: DEFAULT_SIGMA,
            beta: DEFAULT_BETA,
            tau: DEFAULT_TAU,
            draw_probability: DEFAULT_DRAW_PROBABILITY,
        }
    }
}

impl TrueSkill {
    /// Create an environment with explicit constants
    pub fn new(mu: f64, sigma: f64, beta: f64, tau: f64, draw_probability: f64) -> Result<Self> {
        let env = Self {
            mu,
            sigma,
            beta,
            tau,
            draw_probability,
        };
        env.validate()?;
        Ok(env)
    }

    /// Validate the environment constants
    pub fn validate(&self) -> Result<()> {
        if self.sigma <= 0.0 {
            return Err(RatingError::Configuration {
                message: "sigma must be positive".to_string(),
            }
            .into());
        }
        if self.beta <= 0.0 {
            return Err(RatingError::Configuration {
                message: "beta must be positive".to_string(),
            }
            .into());
        }
        if self.tau < 0.0 {
            return Err(RatingError::Configuration {
                message: "tau must be non-negative".to_string(),
            }
            .into());
        }
        if !(0.0..1.0).contains(&self.draw_probability) {
            return Err(RatingError::Configuration {
                message: "draw_probability must be in [0, 1)".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// New rating with this environment's initial mean and deviation
    pub fn create_rating(&self) -> Rating {
        Rating::new(self.mu, self.sigma)
    }

    /// New rating with explicit mean and deviation
    pub fn create_rating_with(&self, mu: f64, sigma: f64) -> Rating {
        Rating::new(mu, sigma)
    }

    /// Conservative skill estimate, suitable as a leaderboard sort key.
    /// Starts at 0 for a fresh rating and converges toward the mean.
    pub fn expose(&self, rating: Rating) -> f64 {
        let k = self.mu / self.sigma;
        rating.mu - k * rating.sigma
    }

    /// Performance-difference threshold below which a match counts as a
    /// draw, for a pairing with `size` players in total
    pub fn calc_draw_margin(&self, size: usize) -> f64 {
        normal::ppf((self.draw_probability + 1.0) / 2.0) * (size as f64).sqrt() * self.beta
    }

    /// Closed-form probability that team A beats team B, from the summed
    /// means and variances
    pub fn win_probability(&self, team_a: &[Rating], team_b: &[Rating]) -> f64 {
        let delta_mu: f64 =
            team_a.iter().map(|r| r.mu).sum::<f64>() - team_b.iter().map(|r| r.mu).sum::<f64>();
        let sum_sigma: f64 = team_a
            .iter()
            .chain(team_b.iter())
            .map(|r| r.variance())
            .sum();
        let player_count = (team_a.len() + team_b.len()) as f64;
        let denom = (player_count * self.beta * self.beta + sum_sigma).sqrt();
        normal::cdf(delta_mu / denom)
    }

    /// Recalculate ratings from a finished match.
    ///
    /// `rating_groups` holds one vector of ratings per team, `ranks` the
    /// finishing position of each team (lower is better, equal means a
    /// draw; defaults to input order), and `weights` the partial-play
    /// contribution of each player (defaults to full participation).
    /// Output groups mirror the input shape.
    pub fn rate(
        &self,
        rating_groups: &[Vec<Rating>],
        ranks: Option<&[usize]>,
        weights: Option<&[Vec<f64>]>,
        min_delta: f64,
    ) -> Result<Vec<Vec<Rating>>> {
        validate_rating_groups(rating_groups)?;
        if min_delta <= 0.0 {
            return Err(RatingError::NonPositiveMinDelta(min_delta).into());
        }
        let group_count = rating_groups.len();
        let ranks: Vec<usize> = match ranks {
            Some(r) if r.len() != group_count => {
                return Err(RatingError::RankCountMismatch {
                    expected: group_count,
                    got: r.len(),
                }
                .into())
            }
            Some(r) => r.to_vec(),
            None => (0..group_count).collect(),
        };
        let weights = validate_weights(rating_groups, weights)?;

        // Sort rating groups by rank, remembering original positions so
        // the output can be unsorted afterwards. The sort is stable, so
        // drawn teams keep their input order.
        let mut order: Vec<usize> = (0..group_count).collect();
        order.sort_by_key(|&idx| ranks[idx]);
        let sorted_groups: Vec<Vec<Rating>> =
            order.iter().map(|&i| rating_groups[i].clone()).collect();
        let sorted_ranks: Vec<usize> = order.iter().map(|&i| ranks[i]).collect();
        // Floor-clamp weights so a zero-weight player cannot make a sum
        // factor singular.
        let sorted_weights: Vec<Vec<f64>> = order
            .iter()
            .map(|&i| weights[i].iter().map(|&w| w.max(min_delta)).collect())
            .collect();

        let flatten_ratings: Vec<Rating> = sorted_groups.iter().flatten().copied().collect();
        let flatten_weights: Vec<f64> = sorted_weights.iter().flatten().copied().collect();
        let size = flatten_ratings.len();

        // One variable per rating, per performance, per team performance,
        // and per adjacent team pair.
        let mut graph = FactorGraph::new();
        let rating_vars: Vec<VarId> = (0..size).map(|_| graph.add_variable()).collect();
        let perf_vars: Vec<VarId> = (0..size).map(|_| graph.add_variable()).collect();
        let team_perf_vars: Vec<VarId> = (0..group_count).map(|_| graph.add_variable()).collect();
        let team_diff_vars: Vec<VarId> =
            (0..group_count - 1).map(|_| graph.add_variable()).collect();
        let sizes = team_sizes(&sorted_groups);

        self.run_schedule(
            &mut graph,
            &rating_vars,
            &flatten_ratings,
            &perf_vars,
            &team_perf_vars,
            &sizes,
            &flatten_weights,
            &team_diff_vars,
            &sorted_ranks,
            &sorted_groups,
            min_delta,
        )?;

        // Read the converged beliefs back out, one group at a time.
        let mut transformed: Vec<Vec<Rating>> = Vec::with_capacity(group_count);
        let mut start = 0;
        for &end in &sizes {
            let group = rating_vars[start..end]
                .iter()
                .map(|&v| Rating::from(graph.variable(v).value()))
                .collect();
            transformed.push(group);
            start = end;
        }

        // Undo the rank sort.
        let mut result = vec![Vec::new(); group_count];
        for (pos, &orig) in order.iter().enumerate() {
            result[orig] = std::mem::take(&mut transformed[pos]);
        }
        Ok(result)
    }

    /// Keyed variant of [`rate`](Self::rate): groups are maps from player
    /// id to rating and the output mirrors the keys. Keys are processed in
    /// sorted order so results are deterministic.
    pub fn rate_keyed(
        &self,
        rating_groups: &[HashMap<PlayerId, Rating>],
        ranks: Option<&[usize]>,
        weights: Option<&[HashMap<PlayerId, f64>]>,
        min_delta: f64,
    ) -> Result<Vec<HashMap<PlayerId, Rating>>> {
        let keys: Vec<Vec<PlayerId>> = rating_groups
            .iter()
            .map(|group| {
                let mut group_keys: Vec<PlayerId> = group.keys().cloned().collect();
                group_keys.sort();
                group_keys
            })
            .collect();
        let positional: Vec<Vec<Rating>> = rating_groups
            .iter()
            .zip(&keys)
            .map(|(group, group_keys)| group_keys.iter().map(|k| group[k]).collect())
            .collect();
        let positional_weights: Option<Vec<Vec<f64>>> = match weights {
            Some(w) if w.len() != rating_groups.len() => {
                return Err(RatingError::WeightShapeMismatch.into())
            }
            Some(w) => Some(
                w.iter()
                    .zip(&keys)
                    .map(|(group, group_keys)| {
                        group_keys
                            .iter()
                            .map(|k| group.get(k).copied().unwrap_or(1.0))
                            .collect()
                    })
                    .collect(),
            ),
            None => None,
        };
        let rated = self.rate(&positional, ranks, positional_weights.as_deref(), min_delta)?;
        Ok(rated
            .into_iter()
            .zip(keys)
            .map(|(group, group_keys)| group_keys.into_iter().zip(group).collect())
            .collect())
    }

    /// Match quality of the given rating groups: the closed-form draw
    /// probability under the current joint belief. A fair match scores
    /// close to the configured draw ceiling; a foregone conclusion scores
    /// near zero.
    pub fn quality(
        &self,
        rating_groups: &[Vec<Rating>],
        weights: Option<&[Vec<f64>]>,
    ) -> Result<f64> {
        validate_rating_groups(rating_groups)?;
        let weights = validate_weights(rating_groups, weights)?;
        let flatten_ratings: Vec<Rating> = rating_groups.iter().flatten().copied().collect();
        let flatten_weights: Vec<f64> = weights.iter().flatten().copied().collect();
        let size = flatten_ratings.len();

        let mean = DMatrix::from_fn(size, 1, |i, _| flatten_ratings[i].mu);
        let variance = variance_matrix(&flatten_ratings);
        let rotated = rotated_a_matrix(rating_groups, &flatten_weights);
        let a = rotated.transpose();

        let ata = (rotated.clone() * self.beta.powi(2)) * &a;
        let atsa = &rotated * (&variance * &a);
        let middle = &ata + &atsa;
        let start = mean.transpose() * &a;
        let end = &rotated * &mean;

        let middle_inv = middle
            .clone()
            .try_inverse()
            .ok_or(RatingError::SingularMatrix)?;
        let e_arg = ((start * middle_inv * end) * -0.5).determinant();
        let s_arg = ata.determinant() / middle.determinant();
        Ok(e_arg.exp() * s_arg.sqrt())
    }

    /// Keyed variant of [`quality`](Self::quality)
    pub fn quality_keyed(
        &self,
        rating_groups: &[HashMap<PlayerId, Rating>],
        weights: Option<&[HashMap<PlayerId, f64>]>,
    ) -> Result<f64> {
        let keys: Vec<Vec<PlayerId>> = rating_groups
            .iter()
            .map(|group| {
                let mut group_keys: Vec<PlayerId> = group.keys().cloned().collect();
                group_keys.sort();
                group_keys
            })
            .collect();
        let positional: Vec<Vec<Rating>> = rating_groups
            .iter()
            .zip(&keys)
            .map(|(group, group_keys)| group_keys.iter().map(|k| group[k]).collect())
            .collect();
        let positional_weights: Option<Vec<Vec<f64>>> = match weights {
            Some(w) if w.len() != rating_groups.len() => {
                return Err(RatingError::WeightShapeMismatch.into())
            }
            Some(w) => Some(
                w.iter()
                    .zip(&keys)
                    .map(|(group, group_keys)| {
                        group_keys
                            .iter()
                            .map(|k| group.get(k).copied().unwrap_or(1.0))
                            .collect()
                    })
                    .collect(),
            ),
            None => None,
        };
        self.quality(&positional, positional_weights.as_deref())
    }

    /// Shortcut to rate a head-to-head match between two players
    pub fn rate_1vs1(
        &self,
        rating1: Rating,
        rating2: Rating,
        drawn: bool,
        min_delta: f64,
    ) -> Result<(Rating, Rating)> {
        let ranks = [0, if drawn { 0 } else { 1 }];
        let teams = self.rate(
            &[vec![rating1], vec![rating2]],
            Some(&ranks),
            None,
            min_delta,
        )?;
        Ok((teams[0][0], teams[1][0]))
    }

    /// Shortcut to the match quality of a head-to-head pairing
    pub fn quality_1vs1(&self, rating1: Rating, rating2: Rating) -> Result<f64> {
        self.quality(&[vec![rating1], vec![rating2]], None)
    }

    fn build_rating_layer(
        &self,
        graph: &mut FactorGraph,
        rating_vars: &[VarId],
        flatten_ratings: &[Rating],
    ) -> Vec<FactorId> {
        rating_vars
            .iter()
            .zip(flatten_ratings)
            .map(|(&var, rating)| {
                graph.add_factor(Factor::Prior {
                    var,
                    mean: rating.mu,
                    sigma: rating.sigma,
                    dynamic: self.tau,
                })
            })
            .collect()
    }

    fn build_perf_layer(
        &self,
        graph: &mut FactorGraph,
        rating_vars: &[VarId],
        perf_vars: &[VarId],
    ) -> Vec<FactorId> {
        rating_vars
            .iter()
            .zip(perf_vars)
            .map(|(&mean, &value)| {
                graph.add_factor(Factor::Likelihood {
                    mean,
                    value,
                    variance: self.beta.powi(2),
                })
            })
            .collect()
    }

    fn build_team_perf_layer(
        &self,
        graph: &mut FactorGraph,
        team_perf_vars: &[VarId],
        perf_vars: &[VarId],
        sizes: &[usize],
        flatten_weights: &[f64],
    ) -> Vec<FactorId> {
        team_perf_vars
            .iter()
            .enumerate()
            .map(|(team, &sum)| {
                let start = if team > 0 { sizes[team - 1] } else { 0 };
                let end = sizes[team];
                graph.add_factor(Factor::Sum {
                    sum,
                    terms: perf_vars[start..end].to_vec(),
                    coeffs: flatten_weights[start..end].to_vec(),
                })
            })
            .collect()
    }

    fn build_team_diff_layer(
        &self,
        graph: &mut FactorGraph,
        team_perf_vars: &[VarId],
        team_diff_vars: &[VarId],
    ) -> Vec<FactorId> {
        team_diff_vars
            .iter()
            .enumerate()
            .map(|(team, &sum)| {
                graph.add_factor(Factor::Sum {
                    sum,
                    terms: team_perf_vars[team..team + 2].to_vec(),
                    coeffs: vec![1.0, -1.0],
                })
            })
            .collect()
    }

    fn build_trunc_layer(
        &self,
        graph: &mut FactorGraph,
        team_diff_vars: &[VarId],
        sorted_ranks: &[usize],
        sorted_groups: &[Vec<Rating>],
    ) -> Vec<FactorId> {
        team_diff_vars
            .iter()
            .enumerate()
            .map(|(x, &var)| {
                let size = sorted_groups[x].len() + sorted_groups[x + 1].len();
                let draw_margin = self.calc_draw_margin(size);
                let kind = if sorted_ranks[x] == sorted_ranks[x + 1] {
                    TruncateKind::Draw
                } else {
                    TruncateKind::Win
                };
                graph.add_factor(Factor::Truncate {
                    var,
                    kind,
                    draw_margin,
                })
            })
            .collect()
    }

    /// Send messages through the five layers until the update delta drops
    /// below `min_delta`, then back-propagate the consensus to every
    /// rating variable.
    #[allow(clippy::too_many_arguments)]
    fn run_schedule(
        &self,
        graph: &mut FactorGraph,
        rating_vars: &[VarId],
        flatten_ratings: &[Rating],
        perf_vars: &[VarId],
        team_perf_vars: &[VarId],
        sizes: &[usize],
        flatten_weights: &[f64],
        team_diff_vars: &[VarId],
        sorted_ranks: &[usize],
        sorted_groups: &[Vec<Rating>],
        min_delta: f64,
    ) -> Result<()> {
        let rating_layer = self.build_rating_layer(graph, rating_vars, flatten_ratings);
        let perf_layer = self.build_perf_layer(graph, rating_vars, perf_vars);
        let team_perf_layer =
            self.build_team_perf_layer(graph, team_perf_vars, perf_vars, sizes, flatten_weights);
        for &factor in rating_layer.iter().chain(&perf_layer).chain(&team_perf_layer) {
            graph.down(factor)?;
        }

        let team_diff_layer = self.build_team_diff_layer(graph, team_perf_vars, team_diff_vars);
        let trunc_layer =
            self.build_trunc_layer(graph, team_diff_vars, sorted_ranks, sorted_groups);
        let team_diff_len = team_diff_layer.len();

        // The iteration cap bounds worst-case cost; convergence is not
        // guaranteed in closed form for more than two teams.
        for iteration in 0..=10 {
            let mut delta: f64 = 0.0;
            if team_diff_len == 1 {
                // Only two teams; a single down/up pass settles the
                // difference node.
                graph.down(team_diff_layer[0])?;
                delta = graph.up(trunc_layer[0], 0)?;
            } else {
                for z in 0..team_diff_len - 1 {
                    graph.down(team_diff_layer[z])?;
                    delta = delta.max(graph.up(trunc_layer[z], 0)?);
                    graph.up(team_diff_layer[z], 1)?;
                }
                for z in (1..team_diff_len).rev() {
                    graph.down(team_diff_layer[z])?;
                    delta = delta.max(graph.up(trunc_layer[z], 0)?);
                    graph.up(team_diff_layer[z], 0)?;
                }
            }
            trace!(iteration, delta, "schedule sweep");
            if delta <= min_delta {
                debug!(iteration, delta, "schedule converged");
                break;
            }
        }

        // Up both ends of the difference chain, then back-propagate to the
        // individual ratings.
        graph.up(team_diff_layer[0], 0)?;
        graph.up(team_diff_layer[team_diff_len - 1], 1)?;
        for (team, &factor) in team_perf_layer.iter().enumerate() {
            let start = if team > 0 { sizes[team - 1] } else { 0 };
            let team_size = sizes[team] - start;
            for x in 0..team_size {
                graph.up(factor, x)?;
            }
        }
        for &factor in &perf_layer {
            graph.up(factor, 0)?;
        }
        Ok(())
    }
}

/// Cumulative end offset of each team in the flattened rating list
fn team_sizes(rating_groups: &[Vec<Rating>]) -> Vec<usize> {
    let mut sizes = Vec::with_capacity(rating_groups.len());
    let mut total = 0;
    for group in rating_groups {
        total += group.len();
        sizes.push(total);
    }
    sizes
}

/// A ranking needs at least two non-empty groups to mean anything
fn validate_rating_groups(rating_groups: &[Vec<Rating>]) -> Result<()> {
    if rating_groups.len() < 2 {
        return Err(RatingError::NeedMultipleGroups.into());
    }
    if rating_groups.iter().any(|group| group.is_empty()) {
        return Err(RatingError::EmptyRatingGroup.into());
    }
    Ok(())
}

/// Default to full participation; otherwise the weight shape must mirror
/// the rating groups
fn validate_weights(
    rating_groups: &[Vec<Rating>],
    weights: Option<&[Vec<f64>]>,
) -> Result<Vec<Vec<f64>>> {
    match weights {
        None => Ok(rating_groups
            .iter()
            .map(|group| vec![1.0; group.len()])
            .collect()),
        Some(w) => {
            if w.len() != rating_groups.len()
                || w.iter()
                    .zip(rating_groups)
                    .any(|(weights, group)| weights.len() != group.len())
            {
                return Err(RatingError::WeightShapeMismatch.into());
            }
            Ok(w.to_vec())
        }
    }
}
