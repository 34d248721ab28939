//! The `adaptest init` command.

use std::path::Path;

use anyhow::Result;

use adaptest_core::config::DEFAULT_CONFIG_TOML;

pub fn execute() -> Result<()> {
    if Path::new("adaptest.toml").exists() {
        println!("adaptest.toml already exists, skipping.");
    } else {
        std::fs::write("adaptest.toml", DEFAULT_CONFIG_TOML)?;
        println!("Created adaptest.toml");
    }

    std::fs::create_dir_all("item-banks")?;
    let example_path = Path::new("item-banks/example.toml");
    if example_path.exists() {
        println!("item-banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_ITEM_BANK)?;
        println!("Created item-banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: adaptest validate --item-bank item-banks/example.toml");
    println!("  2. Run: adaptest take --item-bank item-banks/example.toml");
    println!("  3. Run: adaptest simulate --item-bank item-banks/example.toml");

    Ok(())
}

const EXAMPLE_ITEM_BANK: &str = r#"[item_bank]
id = "example"
name = "Example Arithmetic"
subject = "arithmetic"
description = "A small calibrated bank to get started"

[[items]]
id = "ar-001"
prompt = "What is 7 + 5?"
options = ["10", "11", "12", "13"]
answer = "12"
knowledge_points = ["addition"]
difficulty = -2.0
discrimination = 1.1
guessing = 0.25

[[items]]
id = "ar-002"
prompt = "What is 9 x 6?"
options = ["45", "54", "56", "63"]
answer = "54"
knowledge_points = ["multiplication"]
difficulty = -1.0
discrimination = 1.3
guessing = 0.25

[[items]]
id = "ar-003"
prompt = "What is 144 / 12?"
options = ["11", "12", "13", "14"]
answer = "12"
knowledge_points = ["division"]
difficulty = 0.0
discrimination = 1.2
guessing = 0.25

[[items]]
id = "ar-004"
prompt = "What is 15% of 240?"
options = ["24", "32", "36", "48"]
answer = "36"
knowledge_points = ["percentages"]
difficulty = 1.0
discrimination = 1.4
guessing = 0.2

[[items]]
id = "ar-005"
prompt = "What is 2^10 - 3^5?"
options = ["781", "779", "771", "1019"]
answer = "781"
knowledge_points = ["exponents"]
difficulty = 2.0
discrimination = 1.0
guessing = 0.2
"#;
