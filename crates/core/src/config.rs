// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker configuration.
//!
//! Loaded from TOML at startup. Unknown keys are a hard error so a typo
//! in an option name fails the boot instead of silently using a default.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default snapshot period: one snapshot per partition every 15 minutes.
pub const DEFAULT_SNAPSHOT_PERIOD: Duration = Duration::from_secs(15 * 60);

/// Default free-disk fraction below which replication pauses.
pub const DEFAULT_REPLICATION_WATERMARK: f64 = 0.99;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("disk_usage_replication_watermark must be within (0, 1], got {0}")]
    InvalidWatermark(f64),
}

/// Recognized broker options.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BrokerConfig {
    /// How often each partition attempts a snapshot ("30s", "15m", "1h").
    snapshot_period: String,
    /// Whether the disk-space monitor feeds the partition actors.
    pub disk_usage_monitoring_enabled: bool,
    /// Fraction of disk usage above which snapshot replication pauses.
    pub disk_usage_replication_watermark: f64,
    /// Whether the embedded gateway is started.
    pub gateway_enabled: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            snapshot_period: "15m".to_string(),
            disk_usage_monitoring_enabled: true,
            disk_usage_replication_watermark: DEFAULT_REPLICATION_WATERMARK,
            gateway_enabled: true,
        }
    }
}

impl BrokerConfig {
    /// Parse a TOML document and validate every option.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: BrokerConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file on disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml(&input)
    }

    /// The configured snapshot period.
    pub fn snapshot_period(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.snapshot_period)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.snapshot_period()?;
        let w = self.disk_usage_replication_watermark;
        if !(w > 0.0 && w <= 1.0) {
            return Err(ConfigError::InvalidWatermark(w));
        }
        Ok(())
    }
}

/// Parse a duration string like "30s", "5m", "1h" into a Duration
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        input: s.to_string(),
        reason: reason.to_string(),
    };
    if s.is_empty() {
        return Err(invalid("empty duration string"));
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str.parse().map_err(|_| invalid("not a number"))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        _ => return Err(invalid("unknown duration suffix")),
    };

    Ok(Duration::from_secs(num * multiplier))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
