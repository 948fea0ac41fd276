use std::collections::BTreeMap;
use chrono::Utc;

use crate::comparator::ComparisonRequest;
use crate::error::Result;
use crate::model::{MarkerReading, Provider};

/// Request documents: a `{"readings": [...]}` object or a bare reading array.
pub struct ProviderHandler {
    pub request: ComparisonRequest,
}

impl ProviderHandler {
    pub fn new() -> Self {
        Self {
            request: ComparisonRequest::default(),
        }
    }

    pub fn name() -> String {"json".into()}
}

impl Default for ProviderHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for ProviderHandler {
    fn get_metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("sourceProvider".to_string(), "provider_json".to_string()),
            ("sourceFormat".to_string(), "json_request".to_string()),
            ("ingestedAt".to_string(), Utc::now().to_rfc3339()),
            ("version".to_string(), "1.0".to_string()),
        ])
    }

    fn parse(&mut self, data: &str) -> Result<()> {
        self.request = ComparisonRequest::from_json_str(data)?;
        Ok(())
    }

    fn readings(&self) -> Vec<MarkerReading> {
        self.request.readings.clone()
    }

    fn stability_percent(&self) -> Option<f64> {
        self.request.stability_percent_threshold
    }

    fn only_with_trend(&self) -> Option<bool> {
        self.request.only_with_trend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComparatorError;

    #[test]
    fn provider_json_test() {
        let json_str = r#"{
            "readings": [
                {"rawName": "Creatinina", "value": 1.2, "date": "2024-01-01"},
                {"rawName": "Creatinina", "value": 0.9, "date": "2024-06-01"},
                {"name": "Glucosa", "value": "abc", "date": "2024-06-01"}
            ],
            "stabilityPercentThreshold": 5
        }"#;

        let mut handler = ProviderHandler::new();
        let provider: &mut dyn Provider = &mut handler as &mut dyn Provider;
        assert!(provider.parse(json_str).is_ok());
        assert_eq!(provider.readings().len(), 3);
        assert_eq!(provider.stability_percent(), Some(5.0));
        assert_eq!(provider.only_with_trend(), None);
        assert_eq!(provider.get_metadata()["sourceProvider"], "provider_json");
    }

    #[test]
    fn provider_json_rejects_non_array_readings() {
        let mut handler = ProviderHandler::new();
        let result = handler.parse(r#"{"readings": {"rawName": "Urea"}}"#);
        assert!(matches!(result, Err(ComparatorError::InvalidInput(_))));
    }
}
