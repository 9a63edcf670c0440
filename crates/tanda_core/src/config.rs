//! # Rotation Configuration
//!
//! Every tunable constant of the ordering engine and the coordinator lives here.
//!
//! ```rust
//! use tanda_core::config::TandaConfig;
//!
//! let config = TandaConfig::default();
//! assert_eq!(config.draw.max, 1000);
//! ```
//!
//! A JSON file named by `TANDA_CONFIG_PATH` overrides the defaults when
//! loaded with [`TandaConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use crate::error::{Result, TandaError};
use crate::types::PayoutFrequency;

pub const CONFIG_PATH_ENV: &str = "TANDA_CONFIG_PATH";

/// Lottery draw range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Smallest draw number (default: 1)
    pub min: u32,
    /// Largest draw number, inclusive (default: 1000)
    pub max: u32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self { min: 1, max: 1000 }
    }
}

/// Fallbacks and fairness scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Needs score for members missing from the needs map (default: 50)
    pub default_needs_score: f64,
    /// Contribution total for members missing from the contribution map (default: 0)
    pub default_contribution: f64,
    /// Variance that maps to a fairness score of 100 (default: 1000)
    pub fairness_variance_scale: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_needs_score: 50.0,
            default_contribution: 0.0,
            fairness_variance_scale: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TandaConfig {
    pub draw: DrawConfig,
    pub scoring: ScoringConfig,
    /// Frequency used when a rotation request does not name one
    pub default_frequency: PayoutFrequency,
    /// Reject a repeated payout confirmation instead of ignoring it
    pub strict_completion: bool,
    /// Honour `force` when re-initialising an existing rotation
    pub allow_force_reinit: bool,
}

impl Default for TandaConfig {
    fn default() -> Self {
        Self {
            draw: DrawConfig::default(),
            scoring: ScoringConfig::default(),
            default_frequency: PayoutFrequency::Weekly,
            strict_completion: false,
            allow_force_reinit: true,
        }
    }
}

impl TandaConfig {
    /// Conservative settings: duplicate confirmations and forced
    /// re-initialisation are both rejected.
    pub fn strict() -> Self {
        Self { strict_completion: true, allow_force_reinit: false, ..Self::default() }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| TandaError::InvalidConfig(format!("Failed to parse config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            let path = path.display();
            TandaError::InvalidConfig(format!("Failed to read config file '{path}': {e}"))
        })?;
        Self::from_json(&content)
    }

    /// Loads the file named by `TANDA_CONFIG_PATH`, or the defaults when unset.
    pub fn from_env() -> Result<Self> {
        let Ok(path) = env::var(CONFIG_PATH_ENV) else {
            return Ok(Self::default());
        };

        let path = path.trim();
        if path.is_empty() {
            return Ok(Self::default());
        }

        tracing::debug!(path, "loading rotation config from {CONFIG_PATH_ENV}");
        Self::from_file(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.draw.min > self.draw.max {
            return Err(TandaError::InvalidConfig(format!(
                "draw.min ({}) must not exceed draw.max ({})",
                self.draw.min, self.draw.max
            )));
        }
        if !self.scoring.fairness_variance_scale.is_finite()
            || self.scoring.fairness_variance_scale <= 0.0
        {
            return Err(TandaError::InvalidConfig(
                "scoring.fairness_variance_scale must be a positive number".to_string(),
            ));
        }
        if !self.scoring.default_needs_score.is_finite()
            || !self.scoring.default_contribution.is_finite()
        {
            return Err(TandaError::InvalidConfig("scoring fallbacks must be finite".to_string()));
        }
        Ok(())
    }
}
