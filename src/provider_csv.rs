use std::collections::BTreeMap;
use chrono::Utc;
use log::warn;

use crate::error::{ComparatorError, Result};
use crate::model::{MarkerReading, Provider};

const NAME_COLUMNS: [&str; 3] = ["raw_name", "name", "marker"];
const VALUE_COLUMN: &str = "value";
const DATE_COLUMNS: [&str; 3] = ["date", "exam_date", "observed_at"];

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| candidates.iter().any(|c| h.eq_ignore_ascii_case(c)))
}

/// Flat lab exports, one reading per row: `raw_name,value,date`.
pub struct ProviderHandler {
    pub data: Vec<MarkerReading>,
}

impl ProviderHandler {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
        }
    }

    pub fn name() -> String {"csv".into()}
}

impl Default for ProviderHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for ProviderHandler {
    fn get_metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("sourceProvider".to_string(), "provider_csv".to_string()),
            ("sourceFormat".to_string(), "csv".to_string()),
            ("ingestedAt".to_string(), Utc::now().to_rfc3339()),
            ("version".to_string(), "1.0".to_string()),
        ])
    }

    fn parse(&mut self, data: &str) -> Result<()> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|err| ComparatorError::Parse(format!("missing header row: {err}")))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let name_idx = find_column(&headers, &NAME_COLUMNS)
            .ok_or_else(|| ComparatorError::Parse("no marker name column".into()))?;
        let value_idx = find_column(&headers, &[VALUE_COLUMN])
            .ok_or_else(|| ComparatorError::Parse("no value column".into()))?;
        let date_idx = find_column(&headers, &DATE_COLUMNS)
            .ok_or_else(|| ComparatorError::Parse("no date column".into()))?;

        let mut readings = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record.map_err(|err| {
                ComparatorError::Parse(format!("row {}: {err}", line + 1))
            })?;
            if record.iter().all(|field| field.is_empty()) {
                warn!("skipping blank csv row {}", line + 1);
                continue;
            }

            let raw_name = record.get(name_idx).unwrap_or_default().to_string();
            let value = record
                .get(value_idx)
                .map(|v| serde_json::Value::String(v.to_string()))
                .unwrap_or(serde_json::Value::Null);
            let date = record
                .get(date_idx)
                .filter(|d| !d.is_empty())
                .map(str::to_string);

            readings.push(MarkerReading { raw_name, value, date });
        }

        self.data = readings;
        Ok(())
    }

    fn readings(&self) -> Vec<MarkerReading> {
        self.data.clone()
    }
}
