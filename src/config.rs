//! Configuration for a comparison request.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ComparatorError, Result};

pub const DEFAULT_STABILITY_PERCENT: f64 = 2.0;
pub const DEFAULT_TOP_N: usize = 3;
pub const DEFAULT_LOOKBACK_MONTHS: [u32; 4] = [6, 12, 18, 24];

/// Settings applied uniformly to every marker of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComparatorConfig {
    /// Percentage-change magnitude at or below which a marker is `Stable`.
    pub stability_percent: f64,
    /// Drop single-point series from ranked listings.
    pub only_with_trend: bool,
    /// Number of improving/worsening movers listed in the report.
    pub top_n: usize,
    /// Look-back offsets for the report table, in preference order.
    pub lookback_months: Vec<u32>,
    /// Replacement canonical table; the built-in one is used when absent.
    pub canonical_table: Option<PathBuf>,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            stability_percent: DEFAULT_STABILITY_PERCENT,
            only_with_trend: true,
            top_n: DEFAULT_TOP_N,
            lookback_months: DEFAULT_LOOKBACK_MONTHS.to_vec(),
            canonical_table: None,
        }
    }
}

impl ComparatorConfig {
    /// Defaults for on-screen display: only markers with history.
    pub fn interactive() -> Self {
        Self::default()
    }

    /// Defaults for the printable report: every marker is accounted for.
    pub fn report() -> Self {
        Self {
            only_with_trend: false,
            ..Self::default()
        }
    }

    pub fn with_stability_percent(mut self, stability_percent: f64) -> Self {
        self.stability_percent = stability_percent;
        self
    }

    pub fn with_only_with_trend(mut self, only_with_trend: bool) -> Self {
        self.only_with_trend = only_with_trend;
        self
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)
            .map_err(|err| ComparatorError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|err| {
            ComparatorError::InvalidConfig(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json_str(&data)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.stability_percent.is_finite() || self.stability_percent < 0.0 {
            return Err(ComparatorError::InvalidConfig(format!(
                "stabilityPercent must be a finite, non-negative number (got {})",
                self.stability_percent
            )));
        }
        if self.top_n == 0 {
            return Err(ComparatorError::InvalidConfig("topN must be at least 1".into()));
        }
        if self.lookback_months.is_empty() {
            return Err(ComparatorError::InvalidConfig(
                "lookbackMonths must list at least one offset".into(),
            ));
        }
        if self.lookback_months.contains(&0) {
            return Err(ComparatorError::InvalidConfig(
                "lookbackMonths offsets must be positive".into(),
            ));
        }
        Ok(())
    }
}
