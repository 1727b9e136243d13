//! Static model capability, context-limit, and thinking-budget tables.
//!
//! Kept as its own crate (out of scope per spec: "static model/budget tables"
//! are an external collaborator) so the tables can be regenerated without
//! touching the request/provider pipeline that consumes them.

mod provider;
mod thinking;

pub use provider::{infer_provider, provider_list, Provider};
pub use thinking::{thinking_budget, thinking_level_str, ModelSpecError};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Abstract thinking dial (spec §3 Request.thinking), mapped per provider to a
/// concrete parameter by [`thinking_budget`] or [`thinking_level_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Min,
    Low,
    Med,
    High,
}

impl FromStr for ThinkingLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" => Ok(ThinkingLevel::Min),
            "low" => Ok(ThinkingLevel::Low),
            "med" => Ok(ThinkingLevel::Med),
            "high" => Ok(ThinkingLevel::High),
            _ => Err(()),
        }
    }
}

impl ThinkingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingLevel::Min => "min",
            ThinkingLevel::Low => "low",
            ThinkingLevel::Med => "med",
            ThinkingLevel::High => "high",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thinking_level_round_trips_through_str() {
        for lvl in [
            ThinkingLevel::Min,
            ThinkingLevel::Low,
            ThinkingLevel::Med,
            ThinkingLevel::High,
        ] {
            assert_eq!(ThinkingLevel::from_str(lvl.as_str()), Ok(lvl));
        }
    }
}
