//! The `adaptest simulate` command.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use adaptest_core::config::load_config_from;
use adaptest_core::estimator::AbilityEstimator;
use adaptest_core::parser::{parse_item_bank, validate_item_bank};
use adaptest_core::report::{ItemBankSummary, SimulationReport};
use adaptest_core::simulation::simulate_batch;
use adaptest_core::statistics::{conditional_stats, overall_stats};

fn parse_thetas(s: &str) -> Result<Vec<f64>> {
    let thetas = s
        .split(',')
        .map(|t| {
            let t = t.trim();
            t.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .with_context(|| format!("invalid theta value: '{t}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(!thetas.is_empty(), "at least one theta is required");
    Ok(thetas)
}

#[allow(clippy::too_many_arguments)]
pub fn execute(
    item_bank_path: PathBuf,
    thetas: String,
    replications: Option<u32>,
    seed: Option<u64>,
    filter: Option<String>,
    output: PathBuf,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let true_thetas = parse_thetas(&thetas)?;

    let mut simulation = config.simulation;
    if let Some(r) = replications {
        simulation.replications = r;
    }
    if let Some(s) = seed {
        simulation.seed = s;
    }
    anyhow::ensure!(simulation.replications >= 1, "replications must be at least 1");

    let mut bank = parse_item_bank(&item_bank_path)?;
    if let Some(filter_tags) = &filter {
        let tags: Vec<&str> = filter_tags.split(',').map(|s| s.trim()).collect();
        bank.filter_by_knowledge_points(&tags);
    }
    anyhow::ensure!(!bank.items.is_empty(), "no items left to administer");
    for w in validate_item_bank(&bank) {
        tracing::warn!(item = w.item_id.as_deref().unwrap_or("-"), "{}", w.message);
    }

    eprintln!(
        "adaptest v{} — Simulating {} abilities x {} replications on {} items",
        env!("CARGO_PKG_VERSION"),
        true_thetas.len(),
        simulation.replications,
        bank.items.len()
    );

    let started = Instant::now();
    let estimator = AbilityEstimator::new(config.estimator);
    let sessions = simulate_batch(&true_thetas, &bank, &estimator, &config.stopping, &simulation);

    let report = SimulationReport {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        item_bank: ItemBankSummary::from(&bank),
        estimator: config.estimator,
        stop_rule: config.stopping,
        simulation,
        per_theta: conditional_stats(&sessions),
        overall: overall_stats(&sessions),
        duration_ms: started.elapsed().as_millis() as u64,
    };

    print_summary(&report);

    std::fs::create_dir_all(&output)?;
    let timestamp = Utc::now().format("%Y-%m-%dT%H%M%S");

    let formats: Vec<&str> = if format == "all" {
        vec!["json", "markdown"]
    } else {
        format.split(',').map(|s| s.trim()).collect()
    };

    for fmt in &formats {
        match *fmt {
            "json" => {
                let path = output.join(format!("simulation-{timestamp}.json"));
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            "markdown" | "md" => {
                let path = output.join(format!("simulation-{timestamp}.md"));
                std::fs::write(&path, report.to_markdown())
                    .with_context(|| format!("failed to write {}", path.display()))?;
                eprintln!("Markdown report: {}", path.display());
            }
            _ => {
                eprintln!("Unknown format: {fmt}");
            }
        }
    }

    Ok(())
}

fn print_summary(report: &SimulationReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "True θ",
        "Bias",
        "RMSE",
        "Mean items",
        "Mean SE",
        "Stopped",
    ]);

    for s in &report.per_theta {
        table.add_row(vec![
            Cell::new(format!("{:.2}", s.true_theta)),
            Cell::new(format!("{:+.3}", s.bias)),
            Cell::new(format!("{:.3}", s.rmse)),
            Cell::new(format!("{:.1}", s.mean_items)),
            Cell::new(
                s.mean_standard_error
                    .map(|se| format!("{se:.3}"))
                    .unwrap_or_else(|| "-".into()),
            ),
            Cell::new(format!("{:.0}%", s.stop_rate * 100.0)),
        ]);
    }

    println!("{table}");
    println!(
        "Overall: {} sessions, RMSE {:.3}, {:.1} items on average ({}ms)",
        report.overall.sessions, report.overall.rmse, report.overall.mean_items, report.duration_ms
    );
}
