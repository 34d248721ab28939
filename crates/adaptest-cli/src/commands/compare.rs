//! The `adaptest compare` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::report::SimulationReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    let baseline = SimulationReport::load_json(&baseline_path)?;
    let current = SimulationReport::load_json(&current_path)?;

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Comparison: {} regressions, {} improvements, {} unchanged",
                report.regressions.len(),
                report.improvements.len(),
                report.unchanged
            );

            for (title, rows) in [
                ("Regressions", &report.regressions),
                ("Improvements", &report.improvements),
            ] {
                if rows.is_empty() {
                    continue;
                }
                println!("\n{title}:");
                for r in rows {
                    println!(
                        "  θ = {:.2}: RMSE {:.3} -> {:.3} ({:+.3})",
                        r.true_theta, r.baseline_rmse, r.current_rmse, r.delta
                    );
                }
            }

            if report.unmatched > 0 {
                println!("\n{} ability level(s) missing from the baseline", report.unmatched);
            }
        }
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
