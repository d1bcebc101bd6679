//! Plugin configuration.
//!
//! Loaded once at startup from JSON and treated as read-only afterwards.
//! Every section has serde defaults, so a partial file (or `{}`) is valid.
//!
//! [`PluginConfig::validate`] separates two kinds of problems:
//!
//! - **hard errors** for tables that cannot produce a sane value (inverted
//!   bounds, sub-tier bands outside `[0, 1]`, non-positive default size);
//! - **warnings** for tables that still work but probably do not mean what
//!   the author intended (tier weights not summing to 100, unsorted
//!   categories). Unsorted categories are re-sorted descending.
//!
//! # Example
//!
//! ```
//! use poop_core::config::PluginConfig;
//!
//! let config = PluginConfig::from_json_str(r#"{
//!     "lifecycle": { "max_per_round": 5, "lifetime_secs": 30.0 },
//!     "cooldowns": { "poop": 2.5 }
//! }"#).unwrap();
//!
//! assert_eq!(config.lifecycle.max_per_round, 5);
//! assert!(!config.lifecycle.clear_on_round_end);
//! assert_eq!(config.cooldowns["poop"], 2.5);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::size::{SizeTable, ROLL_MAX};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("size bounds are inverted or not finite: min {min}, max {max}")]
    InvalidBounds { min: f64, max: f64 },

    #[error("default size must be positive and finite, got {0}")]
    InvalidDefaultSize(f64),

    #[error("tier '{tier}' has invalid multipliers {min}..{max}")]
    InvalidMultipliers { tier: String, min: f64, max: f64 },

    #[error("sub-tier '{sub_tier}' of tier '{tier}': {reason}")]
    InvalidSubTier {
        tier: String,
        sub_tier: String,
        reason: String,
    },

    #[error("'{field}' must be finite and non-negative, got {value}")]
    InvalidDuration { field: String, value: f64 },
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Lifetime and per-round limits for spawned props.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Spawns allowed per round. `0` or less means unlimited.
    pub max_per_round: i64,
    /// Seconds before a prop is removed. `0` means it stays until cleanup.
    pub lifetime_secs: f64,
    /// Remove every tracked prop when the round ends.
    pub clear_on_round_end: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_per_round: 0,
            lifetime_secs: 60.0,
            clear_on_round_end: false,
        }
    }
}

/// The animated rainbow colour effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainbowConfig {
    pub enabled: bool,
    /// Base hue advance in degrees per animation tick.
    pub base_speed: f64,
}

impl Default for RainbowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_speed: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PluginConfig
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub size: SizeTable,
    pub lifecycle: LifecycleConfig,
    pub rainbow: RainbowConfig,
    /// Cooldown in seconds, keyed by command name.
    pub cooldowns: BTreeMap<String, f64>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        let mut cooldowns = BTreeMap::new();
        cooldowns.insert(crate::POOP_COMMAND.to_owned(), 3.0);
        Self {
            size: SizeTable::default(),
            lifecycle: LifecycleConfig::default(),
            rainbow: RainbowConfig::default(),
            cooldowns,
        }
    }
}

impl PluginConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: PluginConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Check the configuration, logging soft problems and rejecting hard ones.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let size = &mut self.size;
        if !(size.min_size.is_finite() && size.max_size.is_finite()) || size.min_size > size.max_size {
            return Err(ConfigError::InvalidBounds {
                min: size.min_size,
                max: size.max_size,
            });
        }
        if !(size.default_size.is_finite() && size.default_size > 0.0) {
            return Err(ConfigError::InvalidDefaultSize(size.default_size));
        }

        for tier in &size.tiers {
            let (min, max) = (tier.min_multiplier, tier.max_multiplier);
            if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
                return Err(ConfigError::InvalidMultipliers {
                    tier: tier.label.clone(),
                    min,
                    max,
                });
            }
            if tier.selection_weight == 0 {
                warn!(tier = %tier.label, "size tier has zero selection weight and can never be picked");
            }
            for sub in &tier.sub_tiers {
                let (lo, hi) = (sub.min_range_percent, sub.max_range_percent);
                let reason = if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) {
                    Some(format!("range {lo}..{hi} is outside [0, 1]"))
                } else if lo >= hi {
                    Some(format!("range start {lo} is not below end {hi}"))
                } else {
                    None
                };
                if let Some(reason) = reason {
                    return Err(ConfigError::InvalidSubTier {
                        tier: tier.label.clone(),
                        sub_tier: sub.label.clone(),
                        reason,
                    });
                }
            }
            if !tier.sub_tiers.is_empty() && tier.sub_tier_weight() == 0 {
                warn!(tier = %tier.label, "sub-tiers have zero total weight, tier range will be used");
            }
        }

        if size.tiers.is_empty() {
            warn!("no size tiers configured, every spawn will use the default size");
        } else {
            let total = size.total_weight();
            if total != ROLL_MAX {
                warn!(total, expected = ROLL_MAX, "size tier weights do not sum to 100");
            }
        }

        let sorted = size
            .categories
            .windows(2)
            .all(|pair| pair[0].threshold >= pair[1].threshold);
        if !sorted {
            warn!("size categories are not sorted by descending threshold, re-sorting");
            size.categories
                .sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
        }

        let lifetime = self.lifecycle.lifetime_secs;
        if !(lifetime.is_finite() && lifetime >= 0.0) {
            return Err(ConfigError::InvalidDuration {
                field: "lifecycle.lifetime_secs".to_owned(),
                value: lifetime,
            });
        }
        let speed = self.rainbow.base_speed;
        if !(speed.is_finite() && speed >= 0.0) {
            return Err(ConfigError::InvalidDuration {
                field: "rainbow.base_speed".to_owned(),
                value: speed,
            });
        }
        for (command, secs) in &self.cooldowns {
            if !(secs.is_finite() && *secs >= 0.0) {
                return Err(ConfigError::InvalidDuration {
                    field: format!("cooldowns.{command}"),
                    value: *secs,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
