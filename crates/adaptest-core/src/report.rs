//! Session and simulation reports with JSON persistence and markdown output.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::estimator::{
    classify_performance, confidence_interval, should_stop, EstimatorConfig, StopRule,
};
use crate::model::{AbilityEstimate, ItemBank, PerformanceLevel};
use crate::session::{SessionStatus, TestSession};
use crate::simulation::SimulationConfig;
use crate::statistics::{ConditionalStats, OverallStats};

fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read report from {}", path.display()))?;
    serde_json::from_str(&content).context("failed to parse report JSON")
}

fn fmt_se(se: f64) -> String {
    if se.is_finite() {
        format!("{se:.3}")
    } else {
        "∞".to_string()
    }
}

/// One step of a session's ability trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub item_id: String,
    pub is_correct: bool,
    pub theta: f64,
    #[serde(with = "crate::model::infinite_as_null")]
    pub standard_error: f64,
}

/// Summary of one adaptive session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub examinee_id: String,
    pub subject: String,
    pub status: SessionStatus,
    pub estimate: AbilityEstimate,
    /// 95% interval around theta; absent while the standard error is infinite.
    pub confidence_interval: Option<(f64, f64)>,
    pub level: PerformanceLevel,
    pub response_count: u32,
    pub correct_count: u32,
    pub trajectory: Vec<TrajectoryPoint>,
    /// Whether the stopping rule was satisfied by the final estimate.
    pub stop_rule_met: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionReport {
    /// Build the report from a session's current state.
    pub fn from_session(session: &TestSession, stop_rule: &StopRule) -> Self {
        let estimate = session.estimate;
        let trajectory = session
            .history
            .iter()
            .zip(&session.trajectory)
            .map(|(r, e)| TrajectoryPoint {
                item_id: r.item_id.clone(),
                is_correct: r.is_correct,
                theta: e.theta,
                standard_error: e.standard_error,
            })
            .collect();

        Self {
            session_id: session.id,
            examinee_id: session.examinee_id.clone(),
            subject: session.subject.clone(),
            status: session.status,
            estimate,
            confidence_interval: estimate
                .standard_error
                .is_finite()
                .then(|| confidence_interval(estimate.theta, estimate.standard_error)),
            level: classify_performance(estimate.theta),
            response_count: estimate.response_count,
            correct_count: session.history.iter().filter(|r| r.is_correct).count() as u32,
            trajectory,
            stop_rule_met: should_stop(estimate.standard_error, estimate.response_count, stop_rule),
            started_at: session.started_at,
            finished_at: session.finished_at,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        load_json(path)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "## Session {}\n\n**Examinee:** {}  \n**Subject:** {}\n\n",
            self.session_id, self.examinee_id, self.subject
        ));
        md.push_str(&format!(
            "**Ability:** {:.3} (SE {})  \n**Level:** {}  \n**Responses:** {} ({} correct)\n\n",
            self.estimate.theta,
            fmt_se(self.estimate.standard_error),
            self.level,
            self.response_count,
            self.correct_count
        ));
        if let Some((lo, hi)) = self.confidence_interval {
            md.push_str(&format!("**95% CI:** [{lo:.3}, {hi:.3}]\n\n"));
        }

        if !self.trajectory.is_empty() {
            md.push_str("| # | Item | Correct | Theta | SE |\n");
            md.push_str("|---|------|---------|-------|----|\n");
            for (i, p) in self.trajectory.iter().enumerate() {
                md.push_str(&format!(
                    "| {} | {} | {} | {:.3} | {} |\n",
                    i + 1,
                    p.item_id,
                    if p.is_correct { "yes" } else { "no" },
                    p.theta,
                    fmt_se(p.standard_error)
                ));
            }
        }

        md
    }
}

/// Summary of an item bank (without the items themselves).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemBankSummary {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub item_count: usize,
}

impl From<&ItemBank> for ItemBankSummary {
    fn from(bank: &ItemBank) -> Self {
        Self {
            id: bank.id.clone(),
            name: bank.name.clone(),
            subject: bank.subject.clone(),
            item_count: bank.items.len(),
        }
    }
}

/// Result of a simulation study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub item_bank: ItemBankSummary,
    pub estimator: EstimatorConfig,
    pub stop_rule: StopRule,
    pub simulation: SimulationConfig,
    /// Recovery statistics per true ability, ordered by ability.
    pub per_theta: Vec<ConditionalStats>,
    pub overall: OverallStats,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl SimulationReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        load_json(path)
    }

    /// Compare per-ability RMSE against a baseline run. An ability counts as
    /// regressed when its RMSE grew by more than `threshold`.
    pub fn compare(&self, baseline: &SimulationReport, threshold: f64) -> RecoveryComparison {
        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;
        let mut unmatched = 0usize;

        for current in &self.per_theta {
            let Some(base) = baseline
                .per_theta
                .iter()
                .find(|b| (b.true_theta - current.true_theta).abs() < 1e-9)
            else {
                unmatched += 1;
                continue;
            };
            let delta = current.rmse - base.rmse;
            let change = RmseChange {
                true_theta: current.true_theta,
                baseline_rmse: base.rmse,
                current_rmse: current.rmse,
                delta,
            };
            if delta > threshold {
                regressions.push(change);
            } else if delta < -threshold {
                improvements.push(change);
            } else {
                unchanged += 1;
            }
        }

        RecoveryComparison {
            regressions,
            improvements,
            unchanged,
            unmatched,
        }
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "## Simulation: {} ({} items)\n\n",
            self.item_bank.name, self.item_bank.item_count
        ));
        md.push_str(&format!(
            "**Sessions:** {} · **Mean items:** {:.1} · **RMSE:** {:.3} · **Stopped by rule:** {:.0}%\n\n",
            self.overall.sessions,
            self.overall.mean_items,
            self.overall.rmse,
            self.overall.stop_rate * 100.0
        ));
        md.push_str(&format!(
            "Stop rule: SE < {} or {} responses. Seed {}, {} replications.\n\n",
            self.stop_rule.se_threshold,
            self.stop_rule.max_responses,
            self.simulation.seed,
            self.simulation.replications
        ));

        md.push_str("| True θ | Bias | RMSE | Mean items | Mean SE | Stopped |\n");
        md.push_str("|--------|------|------|------------|---------|---------|\n");
        for s in &self.per_theta {
            md.push_str(&format!(
                "| {:.2} | {:+.3} | {:.3} | {:.1} | {} | {:.0}% |\n",
                s.true_theta,
                s.bias,
                s.rmse,
                s.mean_items,
                s.mean_standard_error
                    .map(|se| format!("{se:.3}"))
                    .unwrap_or_else(|| "-".into()),
                s.stop_rate * 100.0
            ));
        }

        md
    }
}

/// RMSE change at one true ability between two simulation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmseChange {
    pub true_theta: f64,
    pub baseline_rmse: f64,
    pub current_rmse: f64,
    pub delta: f64,
}

/// Result of comparing two simulation reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryComparison {
    /// Abilities whose RMSE went up.
    pub regressions: Vec<RmseChange>,
    /// Abilities whose RMSE went down.
    pub improvements: Vec<RmseChange>,
    pub unchanged: usize,
    /// Abilities present in the current run but not the baseline.
    pub unmatched: usize,
}

impl RecoveryComparison {
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        let mut md = format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged
        );
        for (title, rows) in [
            ("Regressions", &self.regressions),
            ("Improvements", &self.improvements),
        ] {
            if rows.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| True θ | Baseline RMSE | Current RMSE | Delta |\n");
            md.push_str("|--------|---------------|--------------|-------|\n");
            for r in rows {
                md.push_str(&format!(
                    "| {:.2} | {:.3} | {:.3} | {:+.3} |\n",
                    r.true_theta, r.baseline_rmse, r.current_rmse, r.delta
                ));
            }
            md.push('\n');
        }
        md
    }
}
