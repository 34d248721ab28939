//! Maximum-likelihood ability estimation and the adaptive-testing policy
//! built on top of it.
//!
//! Every update re-solves the likelihood score equation over the whole
//! response history with Newton steps, starting from the previous estimate:
//!
//! θ ← θ + Σ score_i(θ) / Σ info_i(θ)
//!
//! until the step falls below the convergence threshold or the iteration cap
//! is reached. The result is clamped to the reportable ability range.

use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::irt::{item_information, probability_correct, score_contribution, standard_error};
use crate::model::{AbilityEstimate, ItemParameters, PerformanceLevel, ResponseEvent};
use crate::traits::ItemParameterLookup;

/// z-value of the two-sided 95% normal interval.
pub const Z_95: f64 = 1.96;

/// Tuning of the Newton solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Hard cap on Newton iterations per update.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Stop iterating once a step is smaller than this.
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f64,
    /// Lower bound of the reportable ability range.
    #[serde(default = "default_min_theta")]
    pub min_theta: f64,
    /// Upper bound of the reportable ability range.
    #[serde(default = "default_max_theta")]
    pub max_theta: f64,
}

fn default_max_iterations() -> u32 {
    50
}
fn default_convergence_threshold() -> f64 {
    0.001
}
fn default_min_theta() -> f64 {
    -3.0
}
fn default_max_theta() -> f64 {
    3.0
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            min_theta: default_min_theta(),
            max_theta: default_max_theta(),
        }
    }
}

impl EstimatorConfig {
    /// Check that the solver settings are usable.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.max_iterations >= 1, "max_iterations must be at least 1");
        anyhow::ensure!(
            self.convergence_threshold.is_finite() && self.convergence_threshold > 0.0,
            "convergence_threshold must be positive and finite"
        );
        anyhow::ensure!(
            self.min_theta.is_finite() && self.max_theta.is_finite() && self.min_theta < self.max_theta,
            "min_theta must be below max_theta"
        );
        Ok(())
    }
}

/// Thresholds of the stopping rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopRule {
    /// Stop once the standard error drops below this.
    #[serde(default = "default_se_threshold")]
    pub se_threshold: f64,
    /// Stop once this many responses have been collected.
    #[serde(default = "default_max_responses")]
    pub max_responses: u32,
}

fn default_se_threshold() -> f64 {
    0.3
}
fn default_max_responses() -> u32 {
    30
}

impl Default for StopRule {
    fn default() -> Self {
        Self {
            se_threshold: default_se_threshold(),
            max_responses: default_max_responses(),
        }
    }
}

impl StopRule {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.se_threshold.is_finite() && self.se_threshold > 0.0,
            "se_threshold must be positive and finite"
        );
        anyhow::ensure!(self.max_responses >= 1, "max_responses must be at least 1");
        Ok(())
    }
}

/// A response paired with the parameters of its item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredResponse {
    pub parameters: ItemParameters,
    pub is_correct: bool,
}

/// Outcome of one batch estimation, with solver diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimation {
    /// Clamped ability estimate.
    pub theta: f64,
    /// Standard error at `theta`; infinite when there is no information.
    pub standard_error: f64,
    /// Aggregate information at `theta`.
    pub information: f64,
    /// Newton iterations performed.
    pub iterations: u32,
    /// Whether the last step was below the convergence threshold.
    pub converged: bool,
}

/// Newton-Raphson maximum-likelihood estimator.
#[derive(Debug, Clone, Default)]
pub struct AbilityEstimator {
    config: EstimatorConfig,
}

impl AbilityEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Solve for ability over the full response set, starting at `start_theta`.
    ///
    /// If the responses carry no information at the starting point, the
    /// starting ability is returned unchanged with an infinite standard error.
    pub fn estimate(&self, start_theta: f64, responses: &[ScoredResponse]) -> Estimation {
        let mut theta = start_theta;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let (score, info) = aggregate(theta, responses);
            if info == 0.0 {
                break;
            }

            let next = theta + score / info;
            let step = (next - theta).abs();
            theta = next;
            if step < self.config.convergence_threshold {
                converged = true;
                break;
            }
        }

        let theta = theta.clamp(self.config.min_theta, self.config.max_theta);
        let (_, information) = aggregate(theta, responses);

        tracing::debug!(
            theta,
            iterations,
            converged,
            responses = responses.len(),
            "ability estimation finished"
        );

        Estimation {
            theta,
            standard_error: standard_error(information),
            information,
            iterations,
            converged,
        }
    }

    /// Fold one new response into an ability estimate.
    ///
    /// `history` holds the earlier responses of the session in order; the
    /// estimate is recomputed over `history` plus `new_response`, starting
    /// from `prior.theta`. Fails only if an item is missing from `lookup`.
    pub fn estimate_ability<L>(
        &self,
        prior: &AbilityEstimate,
        history: &[ResponseEvent],
        new_response: &ResponseEvent,
        lookup: &L,
    ) -> Result<AbilityEstimate, LookupError>
    where
        L: ItemParameterLookup + ?Sized,
    {
        let responses = history
            .iter()
            .chain(std::iter::once(new_response))
            .map(|r| {
                lookup
                    .parameters(&r.item_id)
                    .map(|parameters| ScoredResponse {
                        parameters,
                        is_correct: r.is_correct,
                    })
                    .ok_or_else(|| LookupError {
                        item_id: r.item_id.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let estimation = self.estimate(prior.theta, &responses);

        Ok(AbilityEstimate {
            theta: estimation.theta,
            standard_error: estimation.standard_error,
            response_count: prior.response_count + 1,
        })
    }
}

/// Aggregate score and information of all responses at `theta`.
fn aggregate(theta: f64, responses: &[ScoredResponse]) -> (f64, f64) {
    responses.iter().fold((0.0, 0.0), |(score, info), r| {
        let (b, a, c) = (
            r.parameters.difficulty(),
            r.parameters.discrimination(),
            r.parameters.guessing(),
        );
        let p = probability_correct(theta, b, a, c);
        (
            score + score_contribution(r.is_correct, p),
            info + item_information(theta, b, a, c, Some(p)),
        )
    })
}

/// Difficulty the next item should have: the current ability.
pub fn next_item_target_difficulty(theta: f64) -> f64 {
    theta
}

/// Whether testing should end under the given thresholds.
pub fn should_stop(standard_error: f64, response_count: u32, rule: &StopRule) -> bool {
    standard_error < rule.se_threshold || response_count >= rule.max_responses
}

/// Two-sided 95% normal confidence interval `(lower, upper)`.
pub fn confidence_interval(theta: f64, standard_error: f64) -> (f64, f64) {
    let half_width = Z_95 * standard_error;
    (theta - half_width, theta + half_width)
}

/// Map an ability to its performance band; bands include their lower bound.
pub fn classify_performance(theta: f64) -> PerformanceLevel {
    if theta >= 2.0 {
        PerformanceLevel::Excellent
    } else if theta >= 1.0 {
        PerformanceLevel::Good
    } else if theta >= -1.0 {
        PerformanceLevel::Average
    } else if theta >= -2.0 {
        PerformanceLevel::Passing
    } else {
        PerformanceLevel::Failing
    }
}
