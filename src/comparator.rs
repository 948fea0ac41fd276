//! Entry point for one comparison request.

use log::info;
use serde::{Deserialize, Serialize};

use crate::canonical::Canonicalizer;
use crate::config::ComparatorConfig;
use crate::error::{ComparatorError, Result};
use crate::model::MarkerReading;
use crate::report::{build_report, ComparisonReport};
use crate::series::{build_series, SeriesBatch};
use crate::view::{build_view, InteractiveView};

/// Wire shape of a request: readings plus optional per-request overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRequest {
    pub readings: Vec<MarkerReading>,
    #[serde(default)]
    pub stability_percent_threshold: Option<f64>,
    #[serde(default)]
    pub only_with_trend: Option<bool>,
}

impl ComparisonRequest {
    /// Parses a request, rejecting documents that break the input contract.
    pub fn from_json_str(data: &str) -> Result<Self> {
        let document: serde_json::Value =
            serde_json::from_str(data).map_err(|err| ComparatorError::Parse(err.to_string()))?;

        if document.is_array() {
            let readings = serde_json::from_value(document)
                .map_err(|err| ComparatorError::InvalidInput(err.to_string()))?;
            return Ok(Self {
                readings,
                ..Default::default()
            });
        }

        let Some(fields) = document.as_object() else {
            return Err(ComparatorError::InvalidInput(
                "expected an array of readings or a request object".into(),
            ));
        };
        match fields.get("readings") {
            Some(serde_json::Value::Array(_)) => {}
            Some(_) => {
                return Err(ComparatorError::InvalidInput("`readings` must be an array".into()));
            }
            None => return Err(ComparatorError::InvalidInput("missing `readings`".into())),
        }

        serde_json::from_value(document).map_err(|err| ComparatorError::InvalidInput(err.to_string()))
    }

    /// Applies the request's overrides on top of `base`.
    pub fn config(&self, base: &ComparatorConfig) -> Result<ComparatorConfig> {
        let mut config = base.clone();
        if let Some(threshold) = self.stability_percent_threshold {
            config.stability_percent = threshold;
        }
        if let Some(only_with_trend) = self.only_with_trend {
            config.only_with_trend = only_with_trend;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Runs comparisons with one validated configuration and a shared canonicalizer.
///
/// Holds no per-request state; the same comparator can serve any number of
/// requests, from any number of threads.
#[derive(Debug, Clone)]
pub struct TrendComparator<'a> {
    canonicalizer: &'a Canonicalizer,
    config: ComparatorConfig,
}

impl<'a> TrendComparator<'a> {
    pub fn new(canonicalizer: &'a Canonicalizer, config: ComparatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { canonicalizer, config })
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    pub fn series(&self, readings: &[MarkerReading]) -> SeriesBatch {
        let batch = build_series(readings, self.canonicalizer);
        info!(
            "built {} series from {} readings ({} excluded, {} without data)",
            batch.series.len(),
            batch.total_readings,
            batch.excluded_count(),
            batch.no_data.len()
        );
        batch
    }

    pub fn interactive(&self, readings: &[MarkerReading]) -> InteractiveView {
        build_view(&self.series(readings), &self.config)
    }

    pub fn report(&self, readings: &[MarkerReading]) -> ComparisonReport {
        build_report(&self.series(readings), &self.config)
    }
}
