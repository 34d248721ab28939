//! The `adaptest validate` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::parser::{load_item_banks, validate_item_bank};

pub fn execute(item_bank_path: PathBuf) -> Result<()> {
    let banks = load_item_banks(&item_bank_path)?;
    anyhow::ensure!(
        !banks.is_empty(),
        "no item banks found in {}",
        item_bank_path.display()
    );

    let mut total_warnings = 0;

    for bank in &banks {
        println!(
            "Item bank: {} [{}] ({} items)",
            bank.name,
            bank.subject,
            bank.items.len()
        );

        let warnings = validate_item_bank(bank);
        for w in &warnings {
            let prefix = w
                .item_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All item banks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
