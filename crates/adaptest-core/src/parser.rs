//! TOML item bank parser.
//!
//! Loads item banks from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{default_discrimination, Item, ItemBank, ItemParameters};

/// Largest guessing parameter that does not trigger a warning.
const MAX_PLAUSIBLE_GUESSING: f64 = 0.35;
/// Difficulties outside this range are almost never administered.
const PLAUSIBLE_DIFFICULTY: std::ops::RangeInclusive<f64> = -4.0..=4.0;

#[derive(Debug, Deserialize)]
struct TomlItemBankFile {
    item_bank: TomlItemBankHeader,
    #[serde(default)]
    items: Vec<TomlItem>,
}

#[derive(Debug, Deserialize)]
struct TomlItemBankHeader {
    id: String,
    name: String,
    subject: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlItem {
    id: String,
    prompt: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    answer: String,
    #[serde(default)]
    knowledge_points: Vec<String>,
    difficulty: f64,
    #[serde(default = "default_discrimination")]
    discrimination: f64,
    #[serde(default)]
    guessing: f64,
}

/// Parse a single TOML file into an `ItemBank`.
pub fn parse_item_bank(path: &Path) -> Result<ItemBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read item bank file: {}", path.display()))?;

    parse_item_bank_str(&content, path)
}

/// Parse a TOML string into an `ItemBank`.
///
/// Items with invalid parameters fail the whole bank.
pub fn parse_item_bank_str(content: &str, source_path: &Path) -> Result<ItemBank> {
    let parsed: TomlItemBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let bank_subject = parsed.item_bank.subject;
    let items = parsed
        .items
        .into_iter()
        .map(|i| {
            let parameters = ItemParameters::new(i.difficulty, i.discrimination, i.guessing)
                .with_context(|| format!("invalid parameters for item '{}'", i.id))?;
            Ok(Item {
                subject: i.subject.unwrap_or_else(|| bank_subject.clone()),
                id: i.id,
                prompt: i.prompt,
                options: i.options,
                answer: i.answer,
                knowledge_points: i.knowledge_points,
                parameters,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ItemBank {
        id: parsed.item_bank.id,
        name: parsed.item_bank.name,
        subject: bank_subject,
        description: parsed.item_bank.description,
        items,
    })
}

/// Recursively load all `.toml` item banks from a directory.
pub fn load_item_bank_directory(dir: &Path) -> Result<Vec<ItemBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            banks.extend(load_item_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_item_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// Load a single file, or every bank in a directory.
pub fn load_item_banks(path: &Path) -> Result<Vec<ItemBank>> {
    if path.is_dir() {
        load_item_bank_directory(path)
    } else {
        Ok(vec![parse_item_bank(path)?])
    }
}

/// A warning from item bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The item ID (if applicable).
    pub item_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate an item bank for common issues.
pub fn validate_item_bank(bank: &ItemBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if bank.items.is_empty() {
        warnings.push(ValidationWarning {
            item_id: None,
            message: "item bank has no items".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for item in &bank.items {
        let mut warn = |message: String| {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message,
            })
        };

        if !seen_ids.insert(&item.id) {
            warn(format!("duplicate item ID: {}", item.id));
        }
        if item.prompt.trim().is_empty() {
            warn("prompt is empty".into());
        }
        if !item.options.is_empty() && !item.options.iter().any(|o| item.is_correct(o)) {
            warn(format!("answer '{}' is not among the options", item.answer));
        }

        let b = item.parameters.difficulty();
        if !PLAUSIBLE_DIFFICULTY.contains(&b) {
            warn(format!("difficulty {b} is outside [-4, 4]"));
        }
        let c = item.parameters.guessing();
        if c > MAX_PLAUSIBLE_GUESSING {
            warn(format!("guessing {c} is unusually high"));
        }
    }

    warnings
}
