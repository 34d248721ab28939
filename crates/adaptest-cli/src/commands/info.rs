//! The `adaptest info` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::parser::parse_item_bank;
use adaptest_core::statistics::information_curve;

/// Most points a single curve may print.
const MAX_POINTS: usize = 10_000;

/// Evenly spaced abilities from `from` to `to` inclusive.
fn theta_grid(from: f64, to: f64, step: f64) -> Result<Vec<f64>> {
    anyhow::ensure!(
        from.is_finite() && to.is_finite() && from <= to,
        "--from must not exceed --to"
    );
    anyhow::ensure!(step.is_finite() && step > 0.0, "--step must be positive");

    let intervals = ((to - from) / step + 1e-9).floor();
    anyhow::ensure!(
        intervals < MAX_POINTS as f64,
        "--step {step} gives more than {MAX_POINTS} points between {from} and {to}"
    );

    let count = intervals as usize + 1;
    Ok((0..count).map(|i| from + i as f64 * step).collect())
}

pub fn execute(item_bank_path: PathBuf, from: f64, to: f64, step: f64) -> Result<()> {
    let bank = parse_item_bank(&item_bank_path)?;
    let thetas = theta_grid(from, to, step)?;

    use comfy_table::{Cell, Table};
    let mut table = Table::new();
    table.set_header(vec!["Theta", "Information", "SE"]);
    for point in information_curve(&bank, &thetas) {
        table.add_row(vec![
            Cell::new(format!("{:.2}", point.theta)),
            Cell::new(format!("{:.3}", point.information)),
            Cell::new(if point.standard_error.is_finite() {
                format!("{:.3}", point.standard_error)
            } else {
                "inf".to_string()
            }),
        ]);
    }

    println!("Item bank: {} ({} items)", bank.name, bank.items.len());
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_includes_both_ends() {
        let grid = theta_grid(-1.0, 1.0, 0.5).unwrap();
        assert_eq!(grid, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(theta_grid(0.0, 0.0, 0.1).unwrap(), vec![0.0]);
    }

    #[test]
    fn grid_size_is_capped() {
        assert_eq!(theta_grid(0.0, 9_999.0, 1.0).unwrap().len(), MAX_POINTS);
        assert!(theta_grid(0.0, 10_000.0, 1.0).is_err());

        let err = theta_grid(-3.0, 3.0, 1e-12).unwrap_err();
        assert!(err.to_string().contains("more than 10000 points"));
    }

    #[test]
    fn bad_ranges_are_rejected() {
        assert!(theta_grid(1.0, -1.0, 0.1).is_err());
        assert!(theta_grid(0.0, 1.0, 0.0).is_err());
        assert!(theta_grid(f64::NAN, 1.0, 0.1).is_err());
    }
}
