//! Core data model types for adaptest.
//!
//! These are the fundamental types that the entire adaptest system uses
//! to represent items, item banks, responses and ability estimates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParameterError;

/// Statistical parameters of one item under the three-parameter logistic model.
///
/// Constructed only through [`ItemParameters::new`], so a value of this type
/// always satisfies `a > 0` and `0 <= c < 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawItemParameters", into = "RawItemParameters")]
pub struct ItemParameters {
    difficulty: f64,
    discrimination: f64,
    guessing: f64,
}

impl ItemParameters {
    /// Validate and build a parameter triple `(b, a, c)`.
    pub fn new(difficulty: f64, discrimination: f64, guessing: f64) -> Result<Self, ParameterError> {
        for (name, value) in [
            ("difficulty", difficulty),
            ("discrimination", discrimination),
            ("guessing", guessing),
        ] {
            if !value.is_finite() {
                return Err(ParameterError::NonFinite { name, value });
            }
        }
        if discrimination <= 0.0 {
            return Err(ParameterError::NonPositiveDiscrimination(discrimination));
        }
        if !(0.0..1.0).contains(&guessing) {
            return Err(ParameterError::GuessingOutOfRange(guessing));
        }
        Ok(Self {
            difficulty,
            discrimination,
            guessing,
        })
    }

    /// Difficulty `b`.
    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    /// Discrimination `a`.
    pub fn discrimination(&self) -> f64 {
        self.discrimination
    }

    /// Guessing `c`.
    pub fn guessing(&self) -> f64 {
        self.guessing
    }
}

#[derive(Serialize, Deserialize)]
struct RawItemParameters {
    difficulty: f64,
    #[serde(default = "default_discrimination")]
    discrimination: f64,
    #[serde(default)]
    guessing: f64,
}

impl TryFrom<RawItemParameters> for ItemParameters {
    type Error = ParameterError;

    fn try_from(raw: RawItemParameters) -> Result<Self, Self::Error> {
        ItemParameters::new(raw.difficulty, raw.discrimination, raw.guessing)
    }
}

impl From<ItemParameters> for RawItemParameters {
    fn from(p: ItemParameters) -> Self {
        Self {
            difficulty: p.difficulty,
            discrimination: p.discrimination,
            guessing: p.guessing,
        }
    }
}

pub(crate) fn default_discrimination() -> f64 {
    1.0
}

/// A single test item as published in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier within the bank.
    pub id: String,
    /// Subject the item belongs to.
    pub subject: String,
    /// Question text shown to the test-taker.
    pub prompt: String,
    /// Answer options, if multiple choice.
    #[serde(default)]
    pub options: Vec<String>,
    /// The keyed answer.
    pub answer: String,
    /// Knowledge points this item exercises.
    #[serde(default)]
    pub knowledge_points: Vec<String>,
    /// Statistical parameters.
    pub parameters: ItemParameters,
}

impl Item {
    /// Score a raw answer against the key.
    pub fn is_correct(&self, answer: &str) -> bool {
        answer.trim().eq_ignore_ascii_case(self.answer.trim())
    }
}

/// A collection of items sharing a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemBank {
    /// Unique identifier for this bank.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Subject covered by the bank.
    pub subject: String,
    /// Description of this bank.
    #[serde(default)]
    pub description: String,
    /// The items in this bank.
    #[serde(default)]
    pub items: Vec<Item>,
}

impl ItemBank {
    /// Look up an item by id.
    pub fn get(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Keep only items tagged with at least one of the given knowledge points.
    pub fn filter_by_knowledge_points(&mut self, tags: &[&str]) {
        self.items
            .retain(|i| i.knowledge_points.iter().any(|k| tags.contains(&k.as_str())));
    }
}

/// Pick the item whose difficulty is nearest `target`, skipping excluded ids.
/// Ties go to the smallest id.
pub fn nearest_by_difficulty<'a, I>(items: I, target: f64, exclude: &[String]) -> Option<&'a Item>
where
    I: IntoIterator<Item = &'a Item>,
{
    items
        .into_iter()
        .filter(|i| !exclude.iter().any(|e| e == &i.id))
        .min_by(|x, y| {
            let dx = (x.parameters.difficulty() - target).abs();
            let dy = (y.parameters.difficulty() - target).abs();
            dx.total_cmp(&dy).then_with(|| x.id.cmp(&y.id))
        })
}

/// One observed answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEvent {
    /// The answered item.
    pub item_id: String,
    /// Whether the answer matched the key.
    pub is_correct: bool,
    /// Time spent on the item in milliseconds.
    #[serde(default)]
    pub response_time_ms: u64,
}

impl ResponseEvent {
    pub fn new(item_id: impl Into<String>, is_correct: bool, response_time_ms: u64) -> Self {
        Self {
            item_id: item_id.into(),
            is_correct,
            response_time_ms,
        }
    }
}

/// The running latent-trait estimate for one test-taker and subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    /// Ability on the logit scale.
    pub theta: f64,
    /// Standard error of `theta`; infinite before any information is observed.
    #[serde(with = "infinite_as_null")]
    pub standard_error: f64,
    /// Number of responses folded into the estimate.
    pub response_count: u32,
}

impl AbilityEstimate {
    /// The estimate before any response: `theta = 0`, infinite standard error.
    pub fn initial() -> Self {
        Self::starting_at(0.0)
    }

    /// A fresh estimate seeded at a known prior ability.
    pub fn starting_at(theta: f64) -> Self {
        Self {
            theta,
            standard_error: f64::INFINITY,
            response_count: 0,
        }
    }
}

impl Default for AbilityEstimate {
    fn default() -> Self {
        Self::initial()
    }
}

/// JSON has no infinity; store an infinite standard error as `null`.
pub(crate) mod infinite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

/// Discrete performance label derived from ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    Passing,
    Failing,
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceLevel::Excellent => write!(f, "Excellent"),
            PerformanceLevel::Good => write!(f, "Good"),
            PerformanceLevel::Average => write!(f, "Average"),
            PerformanceLevel::Passing => write!(f, "Passing"),
            PerformanceLevel::Failing => write!(f, "Failing"),
        }
    }
}

impl FromStr for PerformanceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "excellent" => Ok(PerformanceLevel::Excellent),
            "good" => Ok(PerformanceLevel::Good),
            "average" => Ok(PerformanceLevel::Average),
            "passing" | "pass" => Ok(PerformanceLevel::Passing),
            "failing" | "fail" => Ok(PerformanceLevel::Failing),
            other => Err(format!("unknown performance level: {other}")),
        }
    }
}

/// How an ability estimate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimationMethod {
    /// Maximum likelihood via Newton iteration.
    Mle,
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimationMethod::Mle => write!(f, "MLE"),
        }
    }
}
