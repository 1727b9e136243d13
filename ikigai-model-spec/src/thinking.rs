//! Gemini thinking-budget math (spec §4.12 Google adapter, §8 "Thinking budget
//! monotonicity").
//!
//! Gemini 3.x models take a lowercase level string directly; Gemini 2.5 models
//! take an integer token budget computed from a per-model `(min, max)` table.

use crate::ThinkingLevel;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelSpecError {
    #[error("invalid argument: {0}")]
    InvalidArg(String),
}

struct Budget {
    min: i64,
    max: i64,
}

/// `(min, max)` thinking-budget bounds, in tokens, per Gemini 2.5 model.
/// Only `gemini-2.5-flash` can fully disable thinking (`min == 0`).
const GEMINI_25_BUDGETS: &[(&str, Budget)] = &[
    ("gemini-2.5-pro", Budget { min: 128, max: 32768 }),
    ("gemini-2.5-flash", Budget { min: 0, max: 24576 }),
    (
        "gemini-2.5-flash-lite",
        Budget {
            min: 512,
            max: 24576,
        },
    ),
];

fn lookup_25(model: &str) -> Option<&'static Budget> {
    GEMINI_25_BUDGETS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, b)| b)
}

/// Largest power of two `<= x`, or 0 if `x <= 0`.
fn floor_pow2(x: i64) -> i64 {
    if x <= 0 {
        return 0;
    }
    let mut p = 1i64;
    while p.saturating_mul(2) <= x {
        p *= 2;
    }
    p
}

/// Computes a Gemini 2.5 integer `thinkingBudget` for `model` at `level`.
/// Unknown models fail with `InvalidArg` rather than the source's `-1` sentinel.
pub fn thinking_budget(model: &str, level: ThinkingLevel) -> Result<i64, ModelSpecError> {
    let budget = lookup_25(model)
        .ok_or_else(|| ModelSpecError::InvalidArg(format!("unknown gemini 2.5 model: {}", model)))?;
    let range = budget.max - budget.min;
    Ok(match level {
        ThinkingLevel::Min => budget.min,
        ThinkingLevel::Low => floor_pow2(budget.min + range / 3),
        ThinkingLevel::Med => floor_pow2(budget.min + 2 * range / 3),
        ThinkingLevel::High => budget.max,
    })
}

/// Maps a thinking level to Gemini 3's lowercase `thinkingLevel` string.
pub fn thinking_level_str(level: ThinkingLevel) -> &'static str {
    match level {
        ThinkingLevel::Min => "minimal",
        ThinkingLevel::Low => "low",
        ThinkingLevel::Med => "medium",
        ThinkingLevel::High => "high",
    }
}
