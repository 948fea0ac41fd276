use serde::{Deserialize, Serialize};

use crate::config::ComparatorConfig;
use crate::model::{Category, SeriesPoint, TrendResult};
use crate::series::SeriesBatch;
use crate::trend::{evaluate, rank_by_delta};

/// One marker as shown on the patient screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerCard {
    pub canonical_name: String,
    pub category: Category,
    pub first_point: SeriesPoint,
    pub last_point: SeriesPoint,
    pub delta: f64,
    pub point_count: usize,
}

impl From<TrendResult> for MarkerCard {
    fn from(result: TrendResult) -> Self {
        Self {
            canonical_name: result.canonical_name,
            category: result.category,
            first_point: result.first,
            last_point: result.last,
            delta: result.delta,
            point_count: result.point_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub category: Category,
    pub cards: Vec<MarkerCard>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveView {
    pub groups: Vec<CategoryGroup>,
    /// Single-point markers left out because `only_with_trend` was set.
    pub hidden_without_trend: usize,
    pub excluded_readings: usize,
}

impl InteractiveView {
    pub fn card_count(&self) -> usize {
        self.groups.iter().map(|g| g.cards.len()).sum()
    }

    pub fn cards(&self) -> impl Iterator<Item = &MarkerCard> {
        self.groups.iter().flat_map(|g| g.cards.iter())
    }
}

/// Ranked cards grouped by category in display order. Empty groups are omitted.
pub fn build_view(batch: &SeriesBatch, config: &ComparatorConfig) -> InteractiveView {
    let mut results: Vec<TrendResult> = batch
        .series
        .values()
        .filter_map(|series| evaluate(series, config.stability_percent))
        .collect();

    let before = results.len();
    if config.only_with_trend {
        results.retain(|r| r.has_trend());
    }
    let hidden_without_trend = before - results.len();
    rank_by_delta(&mut results);

    let groups = Category::DISPLAY_ORDER
        .iter()
        .filter_map(|category| {
            let cards: Vec<MarkerCard> = results
                .iter()
                .filter(|r| r.category == *category)
                .cloned()
                .map(MarkerCard::from)
                .collect();
            (!cards.is_empty()).then(|| CategoryGroup {
                category: *category,
                cards,
            })
        })
        .collect();

    InteractiveView {
        groups,
        hidden_without_trend,
        excluded_readings: batch.excluded_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::Canonicalizer;
    use crate::model::MarkerReading;
    use crate::series::build_series;

    fn readings() -> Vec<MarkerReading> {
        vec![
            MarkerReading::new("Plaquetas", 250.0, "2024-01-01"),
            MarkerReading::new("Plaquetas", 210.0, "2024-06-01"),
            MarkerReading::new("Creatinina", 1.2, "2024-01-01"),
            MarkerReading::new("Creatinina", 0.9, "2024-06-01"),
            MarkerReading::new("Urea", 40.0, "2024-01-01"),
            MarkerReading::new("Urea", 52.0, "2024-06-01"),
            MarkerReading::new("TSH", 2.1, "2024-01-01"),
            MarkerReading::new("TSH", 2.0, "2024-06-01"),
            MarkerReading::new("Ferritina", 80.0, "2024-06-01"),
        ]
    }

    fn view(config: &ComparatorConfig) -> InteractiveView {
        build_view(&build_series(&readings(), &Canonicalizer::default()), config)
    }

    #[test]
    fn groups_follow_display_order() {
        let view = view(&ComparatorConfig::interactive());
        let order: Vec<Category> = view.groups.iter().map(|g| g.category).collect();
        assert_eq!(order, vec![Category::RenalFunction, Category::Hematology, Category::Other]);
    }

    #[test]
    fn cards_ranked_by_absolute_delta_within_group() {
        let view = view(&ComparatorConfig::interactive());
        let renal: Vec<&str> = view.groups[0]
            .cards
            .iter()
            .map(|c| c.canonical_name.as_str())
            .collect();
        assert_eq!(renal, vec!["Urea", "Creatinina"]);
        let urea = &view.groups[0].cards[0];
        assert_eq!(urea.delta, 12.0);
        assert_eq!(urea.point_count, 2);
        assert_eq!(urea.first_point.value, 40.0);
        assert_eq!(urea.last_point.value, 52.0);
    }

    #[test]
    fn single_point_markers_hidden_only_when_requested() {
        let trend_only = view(&ComparatorConfig::interactive());
        assert_eq!(trend_only.card_count(), 4);
        assert_eq!(trend_only.hidden_without_trend, 1);
        assert!(trend_only.cards().all(|c| c.canonical_name != "Ferritina"));

        let everything = view(&ComparatorConfig::interactive().with_only_with_trend(false));
        assert_eq!(everything.card_count(), 5);
        assert_eq!(everything.hidden_without_trend, 0);
        let hematology: Vec<&str> = everything.groups[1]
            .cards
            .iter()
            .map(|c| c.canonical_name.as_str())
            .collect();
        assert_eq!(hematology, vec!["Plaquetas", "Ferritina"]);
    }
}
