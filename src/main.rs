use std::{collections::BTreeMap, path::Path, time::Duration};

use anyhow::Context;
use log::{error, info, warn};
use serde::Serialize;

use marker_trends::model::Provider;
use marker_trends::{
    provider_csv, provider_json, CanonicalTable, Canonicalizer, ComparatorConfig, ComparatorError,
    ComparisonReport, ComparisonRequest, InteractiveView, TrendComparator,
};

const CONFIG_ENV: &str = "MARKER_TRENDS_CONFIG";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonOutput {
    metadata: BTreeMap<String, String>,
    interactive: InteractiveView,
    report: ComparisonReport,
}

fn run_provider(
    data: &str,
    provider: &mut dyn Provider,
    canonicalizer: &Canonicalizer,
    base: &ComparatorConfig,
) -> Result<ComparisonOutput, ComparatorError> {
    provider.parse(data)?;
    let request = ComparisonRequest {
        readings: provider.readings(),
        stability_percent_threshold: provider.stability_percent(),
        only_with_trend: provider.only_with_trend(),
    };

    let interactive_config = request.config(base)?;
    let report_config = request.config(&base.clone().with_only_with_trend(false))?;

    let interactive = TrendComparator::new(canonicalizer, interactive_config)?.interactive(&request.readings);
    let report = TrendComparator::new(canonicalizer, report_config)?.report(&request.readings);

    Ok(ComparisonOutput {
        metadata: provider.get_metadata(),
        interactive,
        report,
    })
}

fn handle_data(
    provider_name: &str,
    data: &str,
    canonicalizer: &Canonicalizer,
    config: &ComparatorConfig,
) -> Result<ComparisonOutput, ComparatorError> {
    match provider_name {
        name if name == provider_json::ProviderHandler::name() => {
            let mut handler = provider_json::ProviderHandler::new();
            run_provider(data, &mut handler as &mut dyn Provider, canonicalizer, config)
        }
        name if name == provider_csv::ProviderHandler::name() => {
            let mut handler = provider_csv::ProviderHandler::new();
            run_provider(data, &mut handler as &mut dyn Provider, canonicalizer, config)
        }
        _ => Err(ComparatorError::Unknown(format!(
            "Provider not found with name: {provider_name}"
        ))),
    }
}

fn load_config() -> anyhow::Result<ComparatorConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = Path::new(&path);
            info!("loading configuration from {}", path.display());
            ComparatorConfig::from_json_file(path)
                .with_context(|| format!("invalid configuration in {}", path.display()))
        }
        None => Ok(ComparatorConfig::interactive()),
    }
}

fn load_canonicalizer(config: &ComparatorConfig) -> anyhow::Result<Canonicalizer> {
    let table = match &config.canonical_table {
        Some(path) => {
            info!("loading canonical table from {}", path.display());
            CanonicalTable::from_json_file(path)
                .with_context(|| format!("invalid canonical table in {}", path.display()))?
        }
        None => CanonicalTable::default(),
    };
    Ok(Canonicalizer::with_table(table))
}

fn process_file(
    file_path: &Path,
    reports_path: &Path,
    canonicalizer: &Canonicalizer,
    config: &ComparatorConfig,
) -> anyhow::Result<()> {
    let file_type = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .context("input file has no usable extension")?
        .to_ascii_lowercase();
    let data = std::fs::read_to_string(file_path)
        .with_context(|| format!("cannot read {}", file_path.display()))?;

    let output = handle_data(&file_type, &data, canonicalizer, config)
        .with_context(|| format!("cannot compare {}", file_path.display()))?;

    let file_name = file_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("name_missing");
    let output_path = reports_path.join(format!("report_{file_name}.json"));
    let body = serde_json::to_string_pretty(&output)?;
    std::fs::write(&output_path, body)
        .with_context(|| format!("cannot write {}", output_path.display()))?;

    if output.report.excluded_readings > 0 {
        warn!(
            "{}: {} readings excluded ({})",
            file_path.display(),
            output.report.excluded_readings,
            serde_json::json!(&output.report.excluded_by_reason)
        );
    }
    info!("{} -> {}", file_path.display(), output_path.display());

    std::fs::remove_file(file_path)
        .with_context(|| format!("cannot remove processed {}", file_path.display()))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let canonicalizer = load_canonicalizer(&config)?;

    let input_path = Path::new("./input");
    let reports_path = Path::new("./reports");
    std::fs::create_dir_all(input_path).context("cannot create input directory")?;
    std::fs::create_dir_all(reports_path).context("cannot create reports directory")?;

    info!(
        "Handling files of type {}, {} from {}",
        provider_json::ProviderHandler::name(),
        provider_csv::ProviderHandler::name(),
        input_path.display()
    );
    info!("Press Ctrl-C to quit");

    loop {
        std::thread::sleep(Duration::from_secs(3));
        let entries = match std::fs::read_dir(input_path) {
            Ok(entries) => entries,
            Err(err) => {
                error!("cannot read input dir {}: {err}", input_path.display());
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            info!("file found: {}", path.display());
            if let Err(err) = process_file(&path, reports_path, &canonicalizer, &config) {
                error!("error processing file data: {err:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_and_json_inputs_produce_the_same_report() {
        let canonicalizer = Canonicalizer::default();
        let config = ComparatorConfig::interactive();

        let csv = "raw_name,value,date\nCreatinina,1.2,2024-01-01\nCreatinina,0.9,2024-06-01\n";
        let json = r#"[
            {"rawName": "Creatinina", "value": 1.2, "date": "2024-01-01"},
            {"rawName": "Creatinina", "value": 0.9, "date": "2024-06-01"}
        ]"#;

        let from_csv = handle_data("csv", csv, &canonicalizer, &config).unwrap();
        let from_json = handle_data("json", json, &canonicalizer, &config).unwrap();
        assert_eq!(from_csv.report.results, from_json.report.results);
        assert_eq!(from_csv.interactive, from_json.interactive);
    }

    #[test]
    fn report_path_never_hides_markers() {
        let canonicalizer = Canonicalizer::default();
        let config = ComparatorConfig::interactive();
        let json = r#"{"readings": [{"rawName": "Ferritina", "value": 80, "date": "2024-01-01"}]}"#;

        let output = handle_data("json", json, &canonicalizer, &config).unwrap();
        assert_eq!(output.interactive.card_count(), 0);
        assert_eq!(output.report.table.rows.len(), 1);
        assert_eq!(output.report.summary.non_evaluable.insufficient_history, 1);
    }

    #[test]
    fn request_overrides_reach_the_table() {
        let canonicalizer = Canonicalizer::default();
        let config = ComparatorConfig::report();
        let readings = r#"[
            {"rawName": "Ferritina", "value": 80, "date": "2024-01-01"},
            {"rawName": "Urea", "value": 40, "date": "2023-06-01"},
            {"rawName": "Urea", "value": 40.6, "date": "2024-01-01"}
        ]"#;

        let trend_only = format!(r#"{{"readings": {readings}, "onlyWithTrend": true}}"#);
        let output = handle_data("json", &trend_only, &canonicalizer, &config).unwrap();
        assert_eq!(output.interactive.card_count(), 1);
        assert_eq!(output.report.table.rows.len(), 1);
        assert_eq!(output.report.summary.total_markers, 2);
        assert_eq!(output.report.summary.non_evaluable.insufficient_history, 1);

        let everything = format!(r#"{{"readings": {readings}}}"#);
        let output = handle_data("json", &everything, &canonicalizer, &config).unwrap();
        assert_eq!(output.interactive.card_count(), 2);
        assert_eq!(output.report.table.rows.len(), 2);

        // +1.5% is stable at the default threshold but not at 1%
        let strict = format!(r#"{{"readings": {readings}, "stabilityPercentThreshold": 1}}"#);
        let output = handle_data("json", &strict, &canonicalizer, &config).unwrap();
        assert_eq!(output.report.stability_percent, 1.0);
        assert_eq!(output.report.summary.counts.improving, 1);
    }

    #[test]
    fn dispatch_uses_provider_names() {
        let csv = "raw_name,value,date\nUrea,40,2023-06-01\nUrea,30,2024-01-01\n";
        let output = handle_data(
            &provider_csv::ProviderHandler::name(),
            csv,
            &Canonicalizer::default(),
            &ComparatorConfig::interactive(),
        )
        .unwrap();
        assert_eq!(output.metadata.get("sourceFormat").map(String::as_str), Some("csv"));
        assert_eq!(output.report.summary.counts.worsening, 1);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let result = handle_data(
            "xml",
            "<x/>",
            &Canonicalizer::default(),
            &ComparatorConfig::default(),
        );
        assert!(matches!(result, Err(ComparatorError::Unknown(_))));
    }
}
