//! Score extraction, structured evaluations, and performance summaries.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Highest score an answer can receive.
pub const MAX_SCORE: u8 = 5;

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Score:\s*([0-5])\s*/\s*5").expect("score pattern is a valid regex")
});

/// Pull the `Score: X/5` value out of an interviewer reply.
///
/// Only the first occurrence counts; values outside `0..=5` do not match.
pub fn extract_score(text: &str) -> Option<u8> {
    SCORE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Accept any JSON number, rounded to the nearest whole score.
fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    let rounded = raw.round();
    if !(0.0..=f64::from(MAX_SCORE)).contains(&rounded) {
        return Err(serde::de::Error::custom(format!(
            "evaluation score {raw} is out of range 0-{MAX_SCORE}"
        )));
    }
    Ok(rounded as u8)
}

/// Structured evaluation of a single answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Evaluation {
    /// Score from 0 to 5.
    #[serde(deserialize_with = "deserialize_score")]
    #[schemars(range(min = 0, max = 5))]
    pub score: u8,
    /// What the answer did well.
    #[serde(default)]
    pub strengths: Vec<String>,
    /// What the answer missed or got wrong.
    #[serde(default)]
    pub weaknesses: Vec<String>,
    /// One-paragraph overall assessment.
    #[serde(default)]
    pub summary: String,
}

/// Parse the evaluator's JSON reply.
///
/// Tolerates a surrounding markdown code fence. Fractional scores are
/// rounded; scores outside `0..=`[`MAX_SCORE`] are rejected.
pub fn parse_evaluation(text: &str) -> Result<Evaluation, String> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim()).map_err(|e| format!("invalid evaluation JSON: {e}"))
}

/// Aggregate of the scores collected during an interview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Performance {
    /// Number of scored answers.
    pub questions: usize,
    /// Mean score rounded to two decimals, `None` before the first score.
    pub average: Option<f64>,
}

impl Performance {
    pub fn from_scores(scores: &[u8]) -> Self {
        let average = if scores.is_empty() {
            None
        } else {
            let sum: u32 = scores.iter().map(|&s| u32::from(s)).sum();
            let mean = f64::from(sum) / scores.len() as f64;
            Some((mean * 100.0).round() / 100.0)
        };
        Self {
            questions: scores.len(),
            average,
        }
    }
}
