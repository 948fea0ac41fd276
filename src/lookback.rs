//! Checkpoints at fixed look-back offsets from the latest reading.

use chrono::Months;
use serde::{Deserialize, Serialize};

use crate::model::{Category, Classification, MarkerSeries, SeriesPoint};
use crate::trend::{classify_percent, percent_change};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub months: u32,
    pub point: Option<SeriesPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRow {
    pub canonical_name: String,
    pub category: Category,
    pub baseline: SeriesPoint,
    pub checkpoints: Vec<Checkpoint>,
}

impl CheckpointRow {
    /// First offset, in configured order, that resolved to a reading.
    pub fn most_recent(&self) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| c.point.is_some())
    }
}

/// Why a marker could not be compared against a checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotEvaluable {
    /// Exactly one valid reading.
    InsufficientHistory,
    /// No reading old enough for any configured offset.
    NoCheckpoint,
    /// The checkpoint value is zero.
    ZeroCheckpoint,
}

/// Latest value of a marker against its most recent look-back checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerComparison {
    pub canonical_name: String,
    pub category: Category,
    pub baseline: SeriesPoint,
    pub checkpoint: Option<Checkpoint>,
    pub percent_change: Option<f64>,
    pub classification: Option<Classification>,
    pub not_evaluable: Option<NotEvaluable>,
}

impl MarkerComparison {
    pub fn from_row(row: &CheckpointRow, point_count: usize, stability_percent: f64) -> Self {
        let checkpoint = row.most_recent().cloned();
        let checkpoint_value = checkpoint.as_ref().and_then(|c| c.point).map(|p| p.value);
        let percent = checkpoint_value.and_then(|value| percent_change(row.baseline.value, value));

        let not_evaluable = if point_count < 2 {
            Some(NotEvaluable::InsufficientHistory)
        } else if checkpoint_value.is_none() {
            Some(NotEvaluable::NoCheckpoint)
        } else if percent.is_none() {
            Some(NotEvaluable::ZeroCheckpoint)
        } else {
            None
        };

        Self {
            canonical_name: row.canonical_name.clone(),
            category: row.category,
            baseline: row.baseline,
            checkpoint,
            percent_change: percent,
            classification: percent.map(|pct| classify_percent(pct, stability_percent)),
            not_evaluable,
        }
    }
}

/// Latest point dated on or before `baseline - months`.
pub fn checkpoint_at(series: &MarkerSeries, months: u32) -> Option<SeriesPoint> {
    let baseline = series.last()?;
    let cutoff = baseline.date.checked_sub_months(Months::new(months))?;
    let upto = series.points.partition_point(|p| p.date <= cutoff);
    upto.checked_sub(1).map(|idx| series.points[idx])
}

/// Resolves every offset for one series. `None` for an empty series.
pub fn checkpoints(series: &MarkerSeries, offsets: &[u32]) -> Option<CheckpointRow> {
    let baseline = *series.last()?;
    let checkpoints = offsets
        .iter()
        .map(|&months| Checkpoint {
            months,
            point: checkpoint_at(series, months),
        })
        .collect();

    Some(CheckpointRow {
        canonical_name: series.name().to_string(),
        category: series.marker.category,
        baseline,
        checkpoints,
    })
}

/// Baseline against the first offset that resolved. `None` for an empty series.
pub fn compare_with_checkpoint(
    series: &MarkerSeries,
    offsets: &[u32],
    stability_percent: f64,
) -> Option<MarkerComparison> {
    let row = checkpoints(series, offsets)?;
    Some(MarkerComparison::from_row(&row, series.points.len(), stability_percent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::Canonicalizer;
    use crate::model::MarkerReading;
    use crate::series::build_series;

    fn creatinine() -> MarkerSeries {
        let readings = vec![
            MarkerReading::new("Creatinina", 1.5, "2022-01-10"),
            MarkerReading::new("Creatinina", 1.3, "2023-01-01"),
            MarkerReading::new("Creatinina", 1.2, "2023-06-01"),
            MarkerReading::new("Creatinina", 1.1, "2023-11-01"),
            MarkerReading::new("Creatinina", 1.0, "2024-01-01"),
        ];
        build_series(&readings, &Canonicalizer::default())
            .series
            .into_values()
            .next()
            .unwrap()
    }

    #[test]
    fn resolves_latest_point_at_or_before_each_offset() {
        let row = checkpoints(&creatinine(), &[6, 12, 18, 24]).unwrap();
        assert_eq!(row.baseline.value, 1.0);
        let values: Vec<Option<f64>> = row
            .checkpoints
            .iter()
            .map(|c| c.point.map(|p| p.value))
            .collect();
        // 6m -> 2023-07-01 cutoff, 12m -> 2023-01-01 inclusive, 18m -> 2022-07-01, 24m -> 2022-01-01
        assert_eq!(values, vec![Some(1.2), Some(1.3), Some(1.5), None]);
    }

    #[test]
    fn most_recent_prefers_first_configured_offset() {
        let row = checkpoints(&creatinine(), &[24, 12, 6]).unwrap();
        let picked = row.most_recent().unwrap();
        assert_eq!(picked.months, 12);
        assert_eq!(picked.point.map(|p| p.value), Some(1.3));
    }

    #[test]
    fn comparison_uses_most_recent_checkpoint_not_first_point() {
        let readings = vec![
            MarkerReading::new("Creatinina", 1.0, "2022-01-01"),
            MarkerReading::new("Creatinina", 1.5, "2023-06-01"),
            MarkerReading::new("Creatinina", 1.51, "2024-01-01"),
        ];
        let series = build_series(&readings, &Canonicalizer::default())
            .series
            .into_values()
            .next()
            .unwrap();
        let comparison = compare_with_checkpoint(&series, &[6, 12, 18, 24], 2.0).unwrap();
        assert_eq!(comparison.checkpoint.as_ref().map(|c| c.months), Some(6));
        assert!((comparison.percent_change.unwrap() - 0.6666666666666).abs() < 1e-6);
        assert_eq!(comparison.classification, Some(Classification::Stable));
        assert_eq!(comparison.not_evaluable, None);
    }

    #[test]
    fn comparison_reports_why_it_is_not_evaluable() {
        let build = |readings: Vec<MarkerReading>| {
            let series = build_series(&readings, &Canonicalizer::default())
                .series
                .into_values()
                .next()
                .unwrap();
            compare_with_checkpoint(&series, &[6, 12], 2.0).unwrap()
        };

        let single = build(vec![MarkerReading::new("Ferritina", 80.0, "2024-01-01")]);
        assert_eq!(single.not_evaluable, Some(NotEvaluable::InsufficientHistory));

        let recent = build(vec![
            MarkerReading::new("Urea", 40.0, "2024-01-01"),
            MarkerReading::new("Urea", 42.0, "2024-03-01"),
        ]);
        assert_eq!(recent.not_evaluable, Some(NotEvaluable::NoCheckpoint));
        assert_eq!(recent.classification, None);

        let zero = build(vec![
            MarkerReading::new("Proteinuria", 0.0, "2023-01-01"),
            MarkerReading::new("Proteinuria", 0.2, "2024-01-01"),
        ]);
        assert_eq!(zero.not_evaluable, Some(NotEvaluable::ZeroCheckpoint));
        assert_eq!(zero.percent_change, None);
    }

    #[test]
    fn short_history_has_no_checkpoints() {
        let readings = vec![
            MarkerReading::new("Urea", 40.0, "2024-01-01"),
            MarkerReading::new("Urea", 42.0, "2024-03-01"),
        ];
        let series = build_series(&readings, &Canonicalizer::default())
            .series
            .into_values()
            .next()
            .unwrap();
        let row = checkpoints(&series, &[6, 12]).unwrap();
        assert!(row.most_recent().is_none());
    }
}
