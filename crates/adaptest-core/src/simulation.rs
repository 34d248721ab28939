//! Monte Carlo simulation of adaptive sessions.
//!
//! Each simulated examinee has a known true ability; responses are drawn
//! from the response model and fed through the same estimator, item
//! selection and stopping rule as a live session.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::estimator::{next_item_target_difficulty, should_stop, AbilityEstimator, StopRule};
use crate::irt::probability;
use crate::model::{nearest_by_difficulty, AbilityEstimate, ItemBank, ResponseEvent};

/// Simulation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Sessions per true ability.
    #[serde(default = "default_replications")]
    pub replications: u32,
    /// Base seed; each session derives its own stream from it.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_replications() -> u32 {
    100
}
fn default_seed() -> u64 {
    42
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            replications: default_replications(),
            seed: default_seed(),
        }
    }
}

/// Outcome of one simulated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedSession {
    pub true_theta: f64,
    pub estimate: AbilityEstimate,
    /// Administered item ids in order.
    pub items: Vec<String>,
    /// Simulated correctness, parallel to `items`.
    pub responses: Vec<bool>,
    /// `false` when the bank ran out before the stopping rule fired.
    pub stopped_by_rule: bool,
}

/// Run one adaptive session for an examinee of ability `true_theta`.
pub fn simulate_session(
    true_theta: f64,
    bank: &ItemBank,
    estimator: &AbilityEstimator,
    stop_rule: &StopRule,
    rng: &mut Pcg64,
) -> SimulatedSession {
    let mut estimate = AbilityEstimate::initial();
    let mut history: Vec<ResponseEvent> = Vec::new();
    let mut administered: Vec<String> = Vec::new();
    let mut stopped_by_rule = false;

    loop {
        if should_stop(estimate.standard_error, estimate.response_count, stop_rule) {
            stopped_by_rule = true;
            break;
        }

        let target = next_item_target_difficulty(estimate.theta);
        let Some(item) = nearest_by_difficulty(&bank.items, target, &administered) else {
            break;
        };

        let p = probability(true_theta, &item.parameters);
        let is_correct = rng.random::<f64>() < p;
        let event = ResponseEvent::new(item.id.clone(), is_correct, 0);

        // Items come from the bank itself, so the lookup cannot miss.
        match estimator.estimate_ability(&estimate, &history, &event, bank) {
            Ok(next) => estimate = next,
            Err(e) => {
                tracing::warn!("simulation aborted: {e}");
                break;
            }
        }

        administered.push(item.id.clone());
        history.push(event);
    }

    SimulatedSession {
        true_theta,
        estimate,
        responses: history.iter().map(|r| r.is_correct).collect(),
        items: administered,
        stopped_by_rule,
    }
}

/// Seed for the `rep`-th session of the `theta_idx`-th ability.
fn task_seed(seed: u64, theta_idx: usize, rep: usize) -> u64 {
    seed.wrapping_add((theta_idx as u64) << 32).wrapping_add(rep as u64)
}

/// Simulate `config.replications` sessions for every true ability, in
/// parallel. Results are ordered by ability then replication and are
/// reproducible for a fixed seed.
pub fn simulate_batch(
    true_thetas: &[f64],
    bank: &ItemBank,
    estimator: &AbilityEstimator,
    stop_rule: &StopRule,
    config: &SimulationConfig,
) -> Vec<SimulatedSession> {
    let reps = config.replications as usize;
    let tasks: Vec<(usize, usize)> = (0..true_thetas.len())
        .flat_map(|t| (0..reps).map(move |r| (t, r)))
        .collect();

    tracing::debug!(
        sessions = tasks.len(),
        items = bank.items.len(),
        "starting simulation batch"
    );

    tasks
        .par_iter()
        .map(|&(theta_idx, rep)| {
            let mut rng = Pcg64::seed_from_u64(task_seed(config.seed, theta_idx, rep));
            simulate_session(true_thetas[theta_idx], bank, estimator, stop_rule, &mut rng)
        })
        .collect()
}
