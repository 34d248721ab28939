//! The `adaptest estimate` command.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adaptest_core::config::load_config_from;
use adaptest_core::estimator::{
    classify_performance, confidence_interval, should_stop, AbilityEstimator,
};
use adaptest_core::model::{AbilityEstimate, ItemBank, PerformanceLevel, ResponseEvent};
use adaptest_core::parser::parse_item_bank;

/// A recorded response log.
#[derive(Debug, Deserialize)]
struct ResponseLog {
    #[serde(default)]
    start_theta: f64,
    #[serde(default)]
    responses: Vec<LoggedResponse>,
}

/// One logged response; either pre-scored or a raw answer to score.
#[derive(Debug, Deserialize)]
struct LoggedResponse {
    item: String,
    #[serde(default)]
    correct: Option<bool>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    response_time_ms: u64,
}

#[derive(Debug, Serialize)]
struct Step {
    item_id: String,
    is_correct: bool,
    theta: f64,
    standard_error: f64,
}

#[derive(Debug, Serialize)]
struct EstimateOutput {
    item_bank: String,
    steps: Vec<Step>,
    estimate: AbilityEstimate,
    confidence_interval: Option<(f64, f64)>,
    level: PerformanceLevel,
    should_stop: bool,
    /// 1-based response after which the stopping rule first held.
    stop_rule_first_met: Option<usize>,
}

fn load_responses(path: &Path, bank: &ItemBank) -> Result<(f64, Vec<ResponseEvent>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read response log: {}", path.display()))?;
    let log: ResponseLog = toml::from_str(&content)
        .with_context(|| format!("failed to parse response log: {}", path.display()))?;

    let mut seen = HashSet::new();
    let events = log
        .responses
        .into_iter()
        .enumerate()
        .map(|(i, r)| -> Result<ResponseEvent> {
            anyhow::ensure!(
                seen.insert(r.item.clone()),
                "response {}: item '{}' answered twice",
                i + 1,
                r.item
            );
            let is_correct = match (r.correct, &r.answer) {
                (Some(correct), _) => correct,
                (None, Some(answer)) => bank
                    .get(&r.item)
                    .map(|item| item.is_correct(answer))
                    .with_context(|| format!("response {}: unknown item '{}'", i + 1, r.item))?,
                (None, None) => {
                    anyhow::bail!("response {}: needs either `correct` or `answer`", i + 1)
                }
            };
            Ok(ResponseEvent::new(r.item, is_correct, r.response_time_ms))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((log.start_theta, events))
}

pub fn execute(
    item_bank_path: PathBuf,
    responses_path: PathBuf,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let bank = parse_item_bank(&item_bank_path)?;
    let (start_theta, events) = load_responses(&responses_path, &bank)?;

    let estimator = AbilityEstimator::new(config.estimator);
    let mut estimate = AbilityEstimate::starting_at(start_theta);
    let mut steps = Vec::with_capacity(events.len());
    let mut stop_rule_first_met = None;

    for (i, event) in events.iter().enumerate() {
        estimate = estimator
            .estimate_ability(&estimate, &events[..i], event, &bank)
            .with_context(|| format!("response {}", i + 1))?;
        if stop_rule_first_met.is_none()
            && should_stop(estimate.standard_error, estimate.response_count, &config.stopping)
        {
            stop_rule_first_met = Some(i + 1);
        }
        steps.push(Step {
            item_id: event.item_id.clone(),
            is_correct: event.is_correct,
            theta: estimate.theta,
            standard_error: estimate.standard_error,
        });
    }

    let output = EstimateOutput {
        item_bank: bank.id.clone(),
        steps,
        estimate,
        confidence_interval: estimate
            .standard_error
            .is_finite()
            .then(|| confidence_interval(estimate.theta, estimate.standard_error)),
        level: classify_performance(estimate.theta),
        should_stop: should_stop(
            estimate.standard_error,
            estimate.response_count,
            &config.stopping,
        ),
        stop_rule_first_met,
    };

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&output)?),
        _ => print_text(&output),
    }

    Ok(())
}

fn fmt_se(se: f64) -> String {
    if se.is_finite() {
        format!("{se:.3}")
    } else {
        "inf".to_string()
    }
}

fn print_text(output: &EstimateOutput) {
    use comfy_table::{Cell, Table};

    if !output.steps.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["#", "Item", "Correct", "Theta", "SE"]);
        for (i, s) in output.steps.iter().enumerate() {
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(&s.item_id),
                Cell::new(if s.is_correct { "yes" } else { "no" }),
                Cell::new(format!("{:.3}", s.theta)),
                Cell::new(fmt_se(s.standard_error)),
            ]);
        }
        println!("{table}\n");
    }

    println!("Theta: {:.3}", output.estimate.theta);
    println!("Standard error: {}", fmt_se(output.estimate.standard_error));
    if let Some((lo, hi)) = output.confidence_interval {
        println!("95% CI: [{lo:.3}, {hi:.3}]");
    }
    println!("Level: {}", output.level);
    println!("Responses: {}", output.estimate.response_count);
    match output.stop_rule_first_met {
        Some(n) => println!("Stop: yes (rule first met after response {n})"),
        None => println!("Stop: no"),
    }
}
