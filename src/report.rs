//! Printable aggregate across all markers of one request.
//!
//! Unlike the interactive view, the report never drops a marker: anything that
//! cannot be classified is counted as non-evaluable, with the reason.
//!
//! Counts, averages, movers and category rows compare each marker's latest value
//! against its most recent look-back checkpoint, the same comparison the table
//! shows. `results` keeps the plain first-to-last trend of every series.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::ComparatorConfig;
use crate::lookback::{checkpoints, compare_with_checkpoint, MarkerComparison, NotEvaluable};
use crate::model::{Category, Classification, ExclusionReason, TrendResult};
use crate::series::SeriesBatch;
use crate::trend::{by_magnitude_then_name, classify, evaluate, rank_by_percent};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationCounts {
    pub improving: usize,
    pub worsening: usize,
    pub stable: usize,
    pub non_evaluable: usize,
}

impl ClassificationCounts {
    pub fn total(&self) -> usize {
        self.improving + self.worsening + self.stable + self.non_evaluable
    }
}

/// Why markers ended up without a percentage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonEvaluableBreakdown {
    /// Every reading of the marker was invalid.
    pub no_data: usize,
    /// Exactly one valid reading.
    pub insufficient_history: usize,
    /// No reading old enough for any look-back offset.
    pub no_checkpoint: usize,
    /// Checkpoint value is zero.
    pub zero_checkpoint: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mover {
    pub canonical_name: String,
    pub category: Category,
    pub percent_change: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub total_markers: usize,
    pub counts: ClassificationCounts,
    pub non_evaluable: NonEvaluableBreakdown,
    pub average_percent_change: Option<f64>,
    pub top_improving: Vec<Mover>,
    pub top_worsening: Vec<Mover>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryOutlook {
    NoChange,
    Mixed,
    RelevantChanges,
    OverallImprovement,
}

impl CategoryOutlook {
    pub fn from_counts(improving: usize, worsening: usize) -> Self {
        if improving >= 1 && worsening >= 1 {
            CategoryOutlook::Mixed
        } else if worsening >= 2 && worsening > improving {
            CategoryOutlook::RelevantChanges
        } else if improving >= 2 && improving > worsening {
            CategoryOutlook::OverallImprovement
        } else {
            CategoryOutlook::NoChange
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: Category,
    pub improving: usize,
    pub worsening: usize,
    pub stable: usize,
    pub total: usize,
    pub outlook: CategoryOutlook,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCell {
    pub months: u32,
    pub value: Option<f64>,
    /// Baseline minus the checkpoint value.
    pub delta: Option<f64>,
    pub delta_label: Option<String>,
    pub tag: Option<Classification>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub canonical_name: String,
    pub category: Category,
    pub baseline: f64,
    pub baseline_date: NaiveDateTime,
    pub cells: Vec<ReportCell>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTable {
    pub lookback_months: Vec<u32>,
    pub rows: Vec<ReportRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub stability_percent: f64,
    pub summary: ComparisonSummary,
    pub categories: Vec<CategorySummary>,
    /// Baseline against checkpoint for every marker with data, largest percentage first.
    pub comparisons: Vec<MarkerComparison>,
    /// First-to-last trend of every marker with data, largest percentage first.
    pub results: Vec<TrendResult>,
    pub no_data: Vec<String>,
    pub total_readings: usize,
    pub excluded_readings: usize,
    pub excluded_by_reason: BTreeMap<ExclusionReason, usize>,
    pub superseded_readings: usize,
    pub table: ReportTable,
}

/// Signed, two decimals, decimal comma: `+0,30`, `-1,25`.
pub fn format_delta(delta: f64) -> Option<String> {
    if !delta.is_finite() {
        return None;
    }
    let delta = if delta == 0.0 { 0.0 } else { delta };
    let text = if delta >= 0.0 { format!("+{delta:.2}") } else { format!("{delta:.2}") };
    // rounding can still yield "-0.00"
    let text = if text == "-0.00" { "+0.00".to_string() } else { text };
    Some(text.replace('.', ","))
}

/// Largest absolute percentage first; comparisons without one go last.
pub fn rank_comparisons(comparisons: &mut [MarkerComparison]) {
    comparisons.sort_by(|a, b| match (a.percent_change, b.percent_change) {
        (Some(pa), Some(pb)) => by_magnitude_then_name(pa, &a.canonical_name, pb, &b.canonical_name),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.canonical_name.cmp(&b.canonical_name),
    });
}

fn top_movers(comparisons: &[MarkerComparison], wanted: Classification, top_n: usize) -> Vec<Mover> {
    let mut picked: Vec<MarkerComparison> = comparisons
        .iter()
        .filter(|c| c.classification == Some(wanted))
        .cloned()
        .collect();
    rank_comparisons(&mut picked);
    picked
        .into_iter()
        .take(top_n)
        .filter_map(|c| {
            Some(Mover {
                percent_change: c.percent_change?,
                canonical_name: c.canonical_name,
                category: c.category,
            })
        })
        .collect()
}

/// Counts, averages and top movers over `comparisons`, plus `no_data` markers
/// that never produced one.
pub fn aggregate(comparisons: &[MarkerComparison], no_data: usize, top_n: usize) -> ComparisonSummary {
    let mut counts = ClassificationCounts::default();
    let mut breakdown = NonEvaluableBreakdown {
        no_data,
        ..Default::default()
    };
    let mut pct_sum = 0.0;
    let mut pct_count = 0usize;

    for comparison in comparisons {
        match (comparison.classification, comparison.not_evaluable) {
            (Some(Classification::Improving), _) => counts.improving += 1,
            (Some(Classification::Worsening), _) => counts.worsening += 1,
            (Some(Classification::Stable), _) => counts.stable += 1,
            (None, Some(NotEvaluable::InsufficientHistory)) => breakdown.insufficient_history += 1,
            (None, Some(NotEvaluable::NoCheckpoint)) => breakdown.no_checkpoint += 1,
            (None, Some(NotEvaluable::ZeroCheckpoint) | None) => breakdown.zero_checkpoint += 1,
        }
        if let Some(pct) = comparison.percent_change {
            pct_sum += pct;
            pct_count += 1;
        }
    }
    counts.non_evaluable = breakdown.no_data
        + breakdown.insufficient_history
        + breakdown.no_checkpoint
        + breakdown.zero_checkpoint;

    ComparisonSummary {
        total_markers: comparisons.len() + no_data,
        counts,
        non_evaluable: breakdown,
        average_percent_change: (pct_count > 0).then(|| pct_sum / pct_count as f64),
        top_improving: top_movers(comparisons, Classification::Improving, top_n),
        top_worsening: top_movers(comparisons, Classification::Worsening, top_n),
    }
}

/// Per-category counts for categories with at least one classified marker.
pub fn category_summaries(comparisons: &[MarkerComparison]) -> Vec<CategorySummary> {
    let mut by_category: BTreeMap<Category, (usize, usize, usize)> = BTreeMap::new();
    for comparison in comparisons {
        let Some(classification) = comparison.classification else {
            continue;
        };
        let entry = by_category.entry(comparison.category).or_default();
        match classification {
            Classification::Improving => entry.0 += 1,
            Classification::Worsening => entry.1 += 1,
            Classification::Stable => entry.2 += 1,
        }
    }

    Category::DISPLAY_ORDER
        .iter()
        .filter_map(|category| {
            let (improving, worsening, stable) = *by_category.get(category)?;
            Some(CategorySummary {
                category: *category,
                improving,
                worsening,
                stable,
                total: improving + worsening + stable,
                outlook: CategoryOutlook::from_counts(improving, worsening),
            })
        })
        .collect()
}

pub fn build_table(batch: &SeriesBatch, config: &ComparatorConfig) -> ReportTable {
    let mut rows: Vec<ReportRow> = batch
        .series
        .values()
        .filter(|series| !config.only_with_trend || series.has_trend())
        .filter_map(|series| checkpoints(series, &config.lookback_months))
        .map(|row| {
            let baseline = row.baseline.value;
            let cells = row
                .checkpoints
                .iter()
                .map(|checkpoint| {
                    let value = checkpoint.point.map(|p| p.value);
                    let delta = value.map(|v| baseline - v);
                    ReportCell {
                        months: checkpoint.months,
                        value,
                        delta,
                        delta_label: delta.and_then(format_delta),
                        tag: value.and_then(|v| classify(baseline, v, config.stability_percent)),
                    }
                })
                .collect();
            ReportRow {
                canonical_name: row.canonical_name,
                category: row.category,
                baseline,
                baseline_date: row.baseline.date,
                cells,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.canonical_name.cmp(&b.canonical_name))
    });

    ReportTable {
        lookback_months: config.lookback_months.clone(),
        rows,
    }
}

/// Full report for one batch. Aggregates always cover every marker; only the
/// table honours `only_with_trend`.
pub fn build_report(batch: &SeriesBatch, config: &ComparatorConfig) -> ComparisonReport {
    let mut results: Vec<TrendResult> = batch
        .series
        .values()
        .filter_map(|series| evaluate(series, config.stability_percent))
        .collect();
    rank_by_percent(&mut results);

    let mut comparisons: Vec<MarkerComparison> = batch
        .series
        .values()
        .filter_map(|series| {
            compare_with_checkpoint(series, &config.lookback_months, config.stability_percent)
        })
        .collect();
    rank_comparisons(&mut comparisons);

    let summary = aggregate(&comparisons, batch.no_data.len(), config.top_n);
    info!(
        "report: {} markers, {} improving, {} worsening, {} stable, {} non-evaluable",
        summary.total_markers,
        summary.counts.improving,
        summary.counts.worsening,
        summary.counts.stable,
        summary.counts.non_evaluable
    );

    ComparisonReport {
        stability_percent: config.stability_percent,
        categories: category_summaries(&comparisons),
        summary,
        comparisons,
        no_data: batch.no_data.iter().map(|m| m.canonical_name.clone()).collect(),
        total_readings: batch.total_readings,
        excluded_readings: batch.excluded_count(),
        excluded_by_reason: batch.excluded_by_reason(),
        superseded_readings: batch.superseded,
        table: build_table(batch, config),
        results,
    }
}
