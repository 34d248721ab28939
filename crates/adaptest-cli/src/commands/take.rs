//! The `adaptest take` command: an interactive adaptive test over stdin.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::config::load_config_from;
use adaptest_core::model::Item;
use adaptest_core::parser::parse_item_bank;
use adaptest_store::in_memory_service;

/// Letter label of the `index`-th option. Options past `Z` have none and
/// must be answered by text.
fn option_label(index: usize) -> Option<char> {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map(|i| (b'A' + i) as char)
}

/// Map a letter choice (`a`, `B`, ...) to the option text; anything else is
/// taken as the answer itself.
fn resolve_answer(item: &Item, input: &str) -> String {
    let input = input.trim();
    let mut chars = input.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            let idx = (c.to_ascii_lowercase() as u8 - b'a') as usize;
            if let Some(option) = item.options.get(idx) {
                return option.clone();
            }
        }
    }
    input.to_string()
}

pub async fn execute(
    item_bank_path: PathBuf,
    examinee: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let bank = parse_item_bank(&item_bank_path)?;
    let subject = bank.subject.clone();

    let service = in_memory_service(vec![bank], config.service_config());
    let session = service.start_session(&examinee, &subject).await?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdout = io::stdout();
    let mut number = 0usize;

    while let Some(item) = service.next_item(session.id).await? {
        number += 1;
        println!("\nQuestion {number}: {}", item.prompt);
        for (i, option) in item.options.iter().enumerate() {
            match option_label(i) {
                Some(label) => println!("  {label}) {option}"),
                None => println!("  -  {option}"),
            }
        }
        print!("> ");
        stdout.flush()?;

        let Some(line) = lines.next().transpose()? else {
            println!();
            break;
        };

        let answer = resolve_answer(&item, &line);
        let outcome = service
            .submit_response(session.id, &item.id, &answer, 0)
            .await?;
        println!(
            "{} (theta {:.2})",
            if outcome.is_correct { "Correct" } else { "Incorrect" },
            outcome.estimate.theta
        );
        if outcome.should_stop {
            break;
        }
    }

    let report = service.finish(session.id).await?;
    println!("\n{}", report.to_markdown());
    Ok(())
}
