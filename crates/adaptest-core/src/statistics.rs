//! Recovery statistics for simulated sessions and test information curves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::irt::{standard_error, test_information};
use crate::model::ItemBank;
use crate::simulation::SimulatedSession;

/// Estimation quality at one true ability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalStats {
    /// The generating ability.
    pub true_theta: f64,
    /// Number of simulated sessions.
    pub replications: usize,
    /// Mean estimate minus true ability.
    pub bias: f64,
    /// Mean squared error of the estimate.
    pub mse: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Average number of items administered.
    pub mean_items: f64,
    /// Average final standard error over sessions where it is finite.
    pub mean_standard_error: Option<f64>,
    /// Share of sessions ended by the stopping rule rather than bank exhaustion.
    pub stop_rate: f64,
}

/// Statistics across every simulated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallStats {
    pub sessions: usize,
    pub mean_items: f64,
    pub rmse: f64,
    pub stop_rate: f64,
}

/// Group sessions by true ability and compute per-group statistics,
/// ordered by ability.
pub fn conditional_stats(sessions: &[SimulatedSession]) -> Vec<ConditionalStats> {
    let mut grouped: BTreeMap<i64, Vec<&SimulatedSession>> = BTreeMap::new();
    for s in sessions {
        // Group on a fixed-point key so equal thetas land together.
        let key = (s.true_theta * 1e9).round() as i64;
        grouped.entry(key).or_default().push(s);
    }

    grouped
        .into_values()
        .map(|group| {
            let n = group.len() as f64;
            let true_theta = group[0].true_theta;
            let mean_est = group.iter().map(|s| s.estimate.theta).sum::<f64>() / n;
            let mse = group
                .iter()
                .map(|s| (s.estimate.theta - true_theta).powi(2))
                .sum::<f64>()
                / n;
            let mean_items = group.iter().map(|s| s.items.len() as f64).sum::<f64>() / n;

            let finite_se: Vec<f64> = group
                .iter()
                .map(|s| s.estimate.standard_error)
                .filter(|se| se.is_finite())
                .collect();
            let mean_standard_error = if finite_se.is_empty() {
                None
            } else {
                Some(finite_se.iter().sum::<f64>() / finite_se.len() as f64)
            };

            let stopped = group.iter().filter(|s| s.stopped_by_rule).count() as f64;

            ConditionalStats {
                true_theta,
                replications: group.len(),
                bias: mean_est - true_theta,
                mse,
                rmse: mse.sqrt(),
                mean_items,
                mean_standard_error,
                stop_rate: stopped / n,
            }
        })
        .collect()
}

/// Statistics pooled across all sessions.
pub fn overall_stats(sessions: &[SimulatedSession]) -> OverallStats {
    let n = sessions.len().max(1) as f64;
    let mean_items = sessions.iter().map(|s| s.items.len() as f64).sum::<f64>() / n;
    let mse = sessions
        .iter()
        .map(|s| (s.estimate.theta - s.true_theta).powi(2))
        .sum::<f64>()
        / n;
    let stopped = sessions.iter().filter(|s| s.stopped_by_rule).count() as f64;

    OverallStats {
        sessions: sessions.len(),
        mean_items,
        rmse: mse.sqrt(),
        stop_rate: stopped / n,
    }
}

/// One point of a bank's information curve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InformationPoint {
    pub theta: f64,
    pub information: f64,
    #[serde(with = "crate::model::infinite_as_null")]
    pub standard_error: f64,
}

/// Total information of the whole bank at each ability in `thetas`.
pub fn information_curve(bank: &ItemBank, thetas: &[f64]) -> Vec<InformationPoint> {
    thetas
        .iter()
        .map(|&theta| {
            let information = test_information(theta, bank.items.iter().map(|i| &i.parameters));
            InformationPoint {
                theta,
                information,
                standard_error: standard_error(information),
            }
        })
        .collect()
}
