//! Grouping raw readings into per-marker time series.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::canonical::Canonicalizer;
use crate::model::{CanonicalMarker, ExcludedReading, ExclusionReason, MarkerReading, MarkerSeries, SeriesPoint};

/// Series for one request plus the ledger of everything that did not make it in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesBatch {
    pub series: BTreeMap<String, MarkerSeries>,
    pub excluded: Vec<ExcludedReading>,
    /// Canonical names seen only on invalid readings.
    pub no_data: Vec<CanonicalMarker>,
    /// Valid readings replaced by a later reading with the same date.
    pub superseded: usize,
    pub total_readings: usize,
}

impl SeriesBatch {
    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    pub fn excluded_by_reason(&self) -> BTreeMap<ExclusionReason, usize> {
        let mut counts = BTreeMap::new();
        for excluded in &self.excluded {
            *counts.entry(excluded.reason).or_insert(0) += 1;
        }
        counts
    }

    /// Series with at least two points.
    pub fn with_trend(&self) -> impl Iterator<Item = &MarkerSeries> {
        self.series.values().filter(|s| s.has_trend())
    }

    pub fn insufficient(&self) -> impl Iterator<Item = &MarkerSeries> {
        self.series.values().filter(|s| !s.has_trend())
    }

    /// Every canonical marker seen in the batch, with or without data.
    pub fn marker_count(&self) -> usize {
        self.series.len() + self.no_data.len()
    }
}

fn validate(reading: &MarkerReading) -> Result<SeriesPoint, ExclusionReason> {
    let value = reading.numeric_value()?;
    let date = reading.observed_at()?;
    Ok(SeriesPoint { date, value })
}

/// Builds one series per canonical name.
///
/// Readings are processed in input order; when two valid readings of the same
/// marker share a date, the one supplied later replaces the earlier one.
pub fn build_series(readings: &[MarkerReading], canonicalizer: &Canonicalizer) -> SeriesBatch {
    let mut grouped: BTreeMap<String, (CanonicalMarker, BTreeMap<NaiveDateTime, f64>)> = BTreeMap::new();
    let mut seen: BTreeMap<String, CanonicalMarker> = BTreeMap::new();
    let mut excluded = Vec::new();
    let mut superseded = 0;

    for (index, reading) in readings.iter().enumerate() {
        let marker = canonicalizer.canonicalize(&reading.raw_name);
        seen.entry(marker.canonical_name.clone()).or_insert_with(|| marker.clone());

        let point = match validate(reading) {
            Ok(point) => point,
            Err(reason) => {
                debug!("excluding reading #{index} ({:?}): {reason:?}", reading.raw_name);
                excluded.push(ExcludedReading {
                    index,
                    raw_name: reading.raw_name.clone(),
                    reason,
                });
                continue;
            }
        };

        let (_, points) = grouped
            .entry(marker.canonical_name.clone())
            .or_insert_with(|| (marker, BTreeMap::new()));
        if let Some(previous) = points.insert(point.date, point.value) {
            debug!(
                "reading #{index} supersedes value {previous} at {} for {:?}",
                point.date, reading.raw_name
            );
            superseded += 1;
        }
    }

    let with_points: BTreeSet<&String> = grouped.keys().collect();
    let no_data = seen
        .iter()
        .filter(|(name, _)| !with_points.contains(name))
        .map(|(_, marker)| marker.clone())
        .collect();

    let series = grouped
        .into_iter()
        .map(|(name, (marker, points))| {
            let points = points
                .into_iter()
                .map(|(date, value)| SeriesPoint { date, value })
                .collect();
            (name, MarkerSeries { marker, points })
        })
        .collect();

    SeriesBatch {
        series,
        excluded,
        no_data,
        superseded,
        total_readings: readings.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, value: serde_json::Value, date: Option<&str>) -> MarkerReading {
        MarkerReading {
            raw_name: name.into(),
            value,
            date: date.map(str::to_string),
        }
    }

    #[test]
    fn single_marker_builds_ordered_series() {
        let readings = vec![
            MarkerReading::new("Creatinina", 0.9, "2024-06-01"),
            MarkerReading::new("Creatinina", 1.2, "2024-01-01"),
        ];
        let batch = build_series(&readings, &Canonicalizer::default());
        assert_eq!(batch.series.len(), 1);
        let series = &batch.series["Creatinina"];
        let values: Vec<f64> = series.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.2, 0.9]);
        assert!(series.points[0].date < series.points[1].date);
        assert_eq!(batch.excluded_count(), 0);
    }

    #[test]
    fn merges_variants_into_one_series() {
        let readings = vec![
            MarkerReading::new("Creatinina sèrica", 1.1, "2024-03-01"),
            MarkerReading::new("Creatinine", 1.3, "2023-09-15"),
        ];
        let batch = build_series(&readings, &Canonicalizer::default());
        assert_eq!(batch.series.len(), 1);
        let series = &batch.series["Creatinina"];
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].value, 1.3);
        assert_eq!(series.points[1].value, 1.1);
    }

    #[test]
    fn same_date_keeps_last_supplied_value() {
        let readings = vec![
            MarkerReading::new("Urea", 40.0, "2024-01-01"),
            MarkerReading::new("Urea en sangre", 45.0, "2024-01-01"),
            MarkerReading::new("Urea", 38.0, "2024-02-01"),
        ];
        let batch = build_series(&readings, &Canonicalizer::default());
        let series = &batch.series["Urea"];
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].value, 45.0);
        assert_eq!(batch.superseded, 1);
        for pair in series.points.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn invalid_readings_are_excluded_and_counted() {
        let readings = vec![
            raw("Glucosa", serde_json::json!("abc"), Some("2024-01-01")),
            raw("Glucosa", serde_json::Value::Null, Some("2024-02-01")),
            raw("Sodio", serde_json::json!(140), None),
            raw("Sodio", serde_json::json!(141), Some("sometime")),
            raw("Potasio", serde_json::json!(4.1), Some("2024-01-01")),
        ];
        let batch = build_series(&readings, &Canonicalizer::default());
        assert_eq!(batch.total_readings, 5);
        assert_eq!(batch.excluded_count(), 4);
        assert_eq!(batch.series.len(), 1);

        let names: Vec<&str> = batch.no_data.iter().map(|m| m.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["Glucosa", "Sodio"]);
        assert_eq!(batch.marker_count(), 3);

        let reasons = batch.excluded_by_reason();
        assert_eq!(reasons[&ExclusionReason::NonNumericValue], 1);
        assert_eq!(reasons[&ExclusionReason::MissingValue], 1);
        assert_eq!(reasons[&ExclusionReason::MissingDate], 1);
        assert_eq!(reasons[&ExclusionReason::UnparseableDate], 1);
        assert_eq!(batch.excluded[0].index, 0);
    }

    #[test]
    fn single_point_series_is_kept_but_flagged() {
        let readings = vec![
            MarkerReading::new("Ferritina", 80.0, "2024-01-01"),
            MarkerReading::new("Hemoglobina", 13.0, "2024-01-01"),
            MarkerReading::new("Hemoglobina", 13.5, "2024-05-01"),
        ];
        let batch = build_series(&readings, &Canonicalizer::default());
        assert_eq!(batch.series.len(), 2);
        assert_eq!(batch.with_trend().count(), 1);
        let insufficient: Vec<&str> = batch.insufficient().map(|s| s.name()).collect();
        assert_eq!(insufficient, vec!["Ferritina"]);
    }

    #[test]
    fn empty_batch_is_empty() {
        let batch = build_series(&[], &Canonicalizer::default());
        assert!(batch.series.is_empty());
        assert!(batch.no_data.is_empty());
        assert_eq!(batch.marker_count(), 0);
    }
}
