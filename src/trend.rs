//! Directional change between two values of a marker.
//!
//! The percentage is always taken relative to the older value:
//! `pct = (baseline - checkpoint) / checkpoint * 100`. A positive change is
//! `Improving` and a negative one `Worsening` for every marker alike; there is
//! no per-marker directionality here.

use std::cmp::Ordering;

use crate::model::{Classification, MarkerSeries, TrendResult};

/// `None` when the checkpoint is zero or either value is not finite.
pub fn percent_change(baseline: f64, checkpoint: f64) -> Option<f64> {
    if !baseline.is_finite() || !checkpoint.is_finite() || checkpoint == 0.0 {
        return None;
    }
    let pct = (baseline - checkpoint) / checkpoint * 100.0;
    pct.is_finite().then_some(pct)
}

/// Slack on the stability comparison so that a change computed as
/// `2.0000000000000018` still counts as exactly 2 %.
const STABILITY_EPSILON: f64 = 1e-9;

/// Changes with magnitude up to and including `stability_percent` are `Stable`.
pub fn classify_percent(pct: f64, stability_percent: f64) -> Classification {
    if pct.abs() <= stability_percent + STABILITY_EPSILON {
        Classification::Stable
    } else if pct > 0.0 {
        Classification::Improving
    } else {
        Classification::Worsening
    }
}

pub fn classify(baseline: f64, checkpoint: f64, stability_percent: f64) -> Option<Classification> {
    percent_change(baseline, checkpoint).map(|pct| classify_percent(pct, stability_percent))
}

/// Compares the earliest and latest point of a series. `None` for an empty series.
pub fn evaluate(series: &MarkerSeries, stability_percent: f64) -> Option<TrendResult> {
    let first = *series.first()?;
    let last = *series.last()?;
    let point_count = series.points.len();

    let percent = if point_count >= 2 { percent_change(last.value, first.value) } else { None };

    Some(TrendResult {
        canonical_name: series.marker.canonical_name.clone(),
        category: series.marker.category,
        first,
        last,
        point_count,
        delta: last.value - first.value,
        percent_change: percent,
        classification: percent.map(|pct| classify_percent(pct, stability_percent)),
    })
}

pub(crate) fn by_magnitude_then_name(a_key: f64, a_name: &str, b_key: f64, b_name: &str) -> Ordering {
    b_key.abs().total_cmp(&a_key.abs()).then_with(|| a_name.cmp(b_name))
}

/// Largest absolute delta first; ties broken by canonical name.
pub fn rank_by_delta(results: &mut [TrendResult]) {
    results.sort_by(|a, b| by_magnitude_then_name(a.delta, &a.canonical_name, b.delta, &b.canonical_name));
}

/// Largest absolute percentage first; results without a percentage go last.
pub fn rank_by_percent(results: &mut [TrendResult]) {
    results.sort_by(|a, b| match (a.percent_change, b.percent_change) {
        (Some(pa), Some(pb)) => by_magnitude_then_name(pa, &a.canonical_name, pb, &b.canonical_name),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.canonical_name.cmp(&b.canonical_name),
    });
}
