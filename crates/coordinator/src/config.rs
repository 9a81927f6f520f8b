//! Policy thresholds per strategy tier.
//!
//! Config files are JSON or TOML with every field optional:
//!
//! ```toml
//! tier = "aggressive"
//!
//! [tiers.aggressive]
//! read_only_streak_limit = 2
//! ```

use crate::error::{CoordinatorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyTier {
    #[default]
    Default,
    /// Tighter stagnation limits, wider exploration caps
    Aggressive,
}

impl StrategyTier {
    pub const ALL: [Self; 2] = [Self::Default, Self::Aggressive];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for StrategyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyTier {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(CoordinatorError::UnknownTier(other.to_string())),
        }
    }
}

/// Every numeric limit the policies use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyThresholds {
    /// Tool calls without an edit before the first SLA nudge
    pub edit_sla_tool_calls: usize,
    /// Tool calls without an edit before asking the user
    pub edit_sla_abort_tool_calls: usize,
    pub max_stuck_recoveries: usize,
    /// Non-pinned messages kept when history is truncated
    pub history_keep_last: usize,
    pub zero_tool_streak_limit: usize,
    pub max_completion_nudges: usize,
    /// Pending deletes that require confirmation
    pub confirm_delete_count: usize,
    pub max_premature_stop_nudges: usize,
    pub read_only_streak_limit: usize,
    pub post_edit_stagnation_limit: usize,
    pub max_rethinks: usize,
    pub tool_call_soft_cap: usize,
    pub max_iterations: usize,
}

impl PolicyThresholds {
    pub fn for_tier(tier: StrategyTier) -> Self {
        match tier {
            StrategyTier::Default => Self {
                edit_sla_tool_calls: 5,
                edit_sla_abort_tool_calls: 10,
                max_stuck_recoveries: 2,
                history_keep_last: 6,
                zero_tool_streak_limit: 2,
                max_completion_nudges: 2,
                confirm_delete_count: 3,
                max_premature_stop_nudges: 2,
                read_only_streak_limit: 4,
                post_edit_stagnation_limit: 3,
                max_rethinks: 2,
                tool_call_soft_cap: 25,
                max_iterations: 30,
            },
            StrategyTier::Aggressive => Self {
                edit_sla_tool_calls: 7,
                edit_sla_abort_tool_calls: 14,
                read_only_streak_limit: 3,
                post_edit_stagnation_limit: 2,
                tool_call_soft_cap: 35,
                max_iterations: 40,
                ..Self::for_tier(StrategyTier::Default)
            },
        }
    }
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self::for_tier(StrategyTier::Default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyConfig {
    /// Active tier
    pub tier: StrategyTier,
    pub default: PolicyThresholds,
    pub aggressive: PolicyThresholds,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            tier: StrategyTier::Default,
            default: PolicyThresholds::for_tier(StrategyTier::Default),
            aggressive: PolicyThresholds::for_tier(StrategyTier::Aggressive),
        }
    }
}

impl PolicyConfig {
    pub fn thresholds(&self) -> &PolicyThresholds {
        self.thresholds_for(self.tier)
    }

    pub fn thresholds_for(&self, tier: StrategyTier) -> &PolicyThresholds {
        match tier {
            StrategyTier::Default => &self.default,
            StrategyTier::Aggressive => &self.aggressive,
        }
    }

    fn thresholds_mut(&mut self, tier: StrategyTier) -> &mut PolicyThresholds {
        match tier {
            StrategyTier::Default => &mut self.default,
            StrategyTier::Aggressive => &mut self.aggressive,
        }
    }

    #[must_use]
    pub fn with_tier(mut self, tier: StrategyTier) -> Self {
        self.tier = tier;
        self
    }

    /// Parse JSON, falling back to TOML, and merge it over the defaults.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(json_err) => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| CoordinatorError::Config(format!("not UTF-8: {e}")))?;
                let value: toml::Value = toml::from_str(text).map_err(|toml_err| {
                    CoordinatorError::Config(format!(
                        "neither JSON ({json_err}) nor TOML ({toml_err})"
                    ))
                })?;
                serde_json::to_value(value)?
            }
        };

        let root = raw
            .as_object()
            .ok_or_else(|| CoordinatorError::Config("expected a table at the top level".into()))?;
        let mut config = Self::default();
        for (key, value) in root {
            match key.as_str() {
                "tier" => {
                    let name = value
                        .as_str()
                        .ok_or_else(|| CoordinatorError::Config("`tier` must be a string".into()))?;
                    config.tier = name.parse()?;
                }
                "tiers" => {
                    let tiers = value.as_object().ok_or_else(|| {
                        CoordinatorError::Config("`tiers` must be a table".into())
                    })?;
                    for (name, patch) in tiers {
                        let tier: StrategyTier = name.parse()?;
                        let merged = overlay(config.thresholds_for(tier), patch, name)?;
                        *config.thresholds_mut(tier) = merged;
                    }
                }
                other => {
                    return Err(CoordinatorError::Config(format!("unknown key `{other}`")));
                }
            }
        }
        Ok(config)
    }
}

fn overlay(
    base: &PolicyThresholds,
    patch: &serde_json::Value,
    tier: &str,
) -> Result<PolicyThresholds> {
    let mut merged = serde_json::to_value(base)?;
    match (merged.as_object_mut(), patch.as_object()) {
        (Some(target), Some(fields)) => {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        _ => {
            return Err(CoordinatorError::Config(format!(
                "tier `{tier}` must be a table"
            )));
        }
    }
    Ok(serde_json::from_value(merged)?)
}
