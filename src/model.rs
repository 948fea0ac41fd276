use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::fmt;
use chrono::NaiveDateTime;

use crate::dates::parse_observation_date;
use crate::error::Result;

/// One laboratory observation as received from a source system.
///
/// `value` stays loosely typed: sources send numbers, numeric strings, free text
/// or nothing at all, and only finite numbers survive series building.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerReading {
    #[serde(default, alias = "name")]
    pub raw_name: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub date: Option<String>,
}

impl MarkerReading {
    pub fn new(raw_name: impl Into<String>, value: f64, date: impl Into<String>) -> Self {
        Self {
            raw_name: raw_name.into(),
            value: serde_json::json!(value),
            date: Some(date.into()),
        }
    }

    pub fn numeric_value(&self) -> std::result::Result<f64, ExclusionReason> {
        let value = match &self.value {
            serde_json::Value::Null => return Err(ExclusionReason::MissingValue),
            serde_json::Value::Number(n) => n.as_f64().ok_or(ExclusionReason::NonNumericValue)?,
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ExclusionReason::MissingValue);
                }
                trimmed.parse::<f64>().map_err(|_| ExclusionReason::NonNumericValue)?
            }
            _ => return Err(ExclusionReason::NonNumericValue),
        };

        if value.is_finite() { Ok(value) } else { Err(ExclusionReason::NonFiniteValue) }
    }

    pub fn observed_at(&self) -> std::result::Result<NaiveDateTime, ExclusionReason> {
        let raw = self.date.as_deref().ok_or(ExclusionReason::MissingDate)?;
        if raw.trim().is_empty() {
            return Err(ExclusionReason::MissingDate);
        }
        parse_observation_date(raw).ok_or(ExclusionReason::UnparseableDate)
    }
}

/// Why a reading was left out of every series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExclusionReason {
    MissingValue,
    NonNumericValue,
    NonFiniteValue,
    MissingDate,
    UnparseableDate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedReading {
    pub index: usize,
    pub raw_name: String,
    pub reason: ExclusionReason,
}

/// Clinical grouping used to place markers into report subsections.
///
/// Declaration order is the display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    RenalFunction,
    MetabolismLipids,
    Hematology,
    Urine,
    Other,
}

impl Category {
    pub const DISPLAY_ORDER: [Category; 5] = [
        Category::RenalFunction,
        Category::MetabolismLipids,
        Category::Hematology,
        Category::Urine,
        Category::Other,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::RenalFunction => "Renal function",
            Category::MetabolismLipids => "Metabolism / lipids",
            Category::Hematology => "Hematology",
            Category::Urine => "Urine",
            Category::Other => "Other",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMarker {
    pub canonical_name: String,
    pub category: Category,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    Improving,
    Worsening,
    Stable,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDateTime,
    pub value: f64,
}

/// All valid readings of one canonical marker, ascending by date, one point per date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerSeries {
    pub marker: CanonicalMarker,
    pub points: Vec<SeriesPoint>,
}

impl MarkerSeries {
    pub fn name(&self) -> &str {
        &self.marker.canonical_name
    }

    pub fn first(&self) -> Option<&SeriesPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    pub fn has_trend(&self) -> bool {
        self.points.len() >= 2
    }
}

/// Outcome of comparing the first and last point of one series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    pub canonical_name: String,
    pub category: Category,
    pub first: SeriesPoint,
    pub last: SeriesPoint,
    pub point_count: usize,
    pub delta: f64,
    /// Undefined when the series has a single point or starts at zero.
    pub percent_change: Option<f64>,
    pub classification: Option<Classification>,
}

impl TrendResult {
    pub fn has_trend(&self) -> bool {
        self.point_count >= 2
    }
}

/// A source of raw readings for the batch runner.
pub trait Provider {
    fn get_metadata(&self) -> BTreeMap<String, String>;
    fn parse(&mut self, data: &str) -> Result<()>;
    fn readings(&self) -> Vec<MarkerReading>;
    /// Threshold carried by the document itself, if any.
    fn stability_percent(&self) -> Option<f64> {
        None
    }
    fn only_with_trend(&self) -> Option<bool> {
        None
    }
}
