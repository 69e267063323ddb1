//! Table and JSON rendering for CLI output

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::benchmark::Benchmark;
use crate::json::BenchmarkSuiteDefinition;
use crate::runner::{RunStats, SuiteRunStats};
use crate::stats::StatValue;

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Preset")]
    preset: String,
    #[tabled(rename = "Stat")]
    stat: String,
    #[tabled(rename = "Value")]
    value: StatValue,
}

/// Render one run's stats as a Preset/Stat/Value table
pub fn render_stats_table(stats: &RunStats) -> String {
    let rows: Vec<StatRow> = stats
        .iter()
        .flat_map(|(preset, preset_stats)| {
            preset_stats.iter().map(|(stat, value)| StatRow {
                preset: preset.clone(),
                stat: stat.clone(),
                value: *value,
            })
        })
        .collect();
    Table::new(rows).with(Style::modern()).to_string()
}

/// Render one run's stats as a JSON object keyed by preset name
pub fn stats_to_json(stats: &RunStats) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for (preset, preset_stats) in stats {
        object.insert(
            preset.clone(),
            serde_json::to_value(preset_stats).unwrap_or_default(),
        );
    }
    serde_json::Value::Object(object)
}

/// Render a suite's stats: one table per run, prefixed with its position
pub fn render_suite_stats(results: &[SuiteRunStats]) -> String {
    let mut rendered = String::new();
    for (index, result) in results.iter().enumerate() {
        rendered.push_str(&format!(
            "\nRUN#{} - {}\n{}\n",
            index + 1,
            result.benchmark_name,
            render_stats_table(&result.stats)
        ));
    }
    rendered
}

/// Render a suite's stats as a JSON array, one object per run
pub fn suite_stats_to_json(results: &[SuiteRunStats]) -> serde_json::Value {
    serde_json::Value::Array(results.iter().map(|r| stats_to_json(&r.stats)).collect())
}

#[derive(Tabled)]
struct BenchmarkRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Render the benchmark listing as an ID/Name/Description table
pub fn render_benchmark_table(benchmarks: &[Benchmark]) -> String {
    let rows: Vec<BenchmarkRow> = benchmarks
        .iter()
        .map(|benchmark| BenchmarkRow {
            id: benchmark.id(),
            name: benchmark.definition.name.clone(),
            description: shorten(&benchmark.definition.description, 40),
        })
        .collect();
    Table::new(rows).with(Style::modern()).to_string()
}

#[derive(Tabled)]
struct SuiteRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Render the suite listing as a Name/Description table
pub fn render_suite_table(suites: &[BenchmarkSuiteDefinition]) -> String {
    let rows: Vec<SuiteRow> = suites
        .iter()
        .map(|suite| SuiteRow {
            name: suite.name.clone(),
            description: shorten(&suite.description, 40),
        })
        .collect();
    Table::new(rows).with(Style::modern()).to_string()
}

/// Shorten text to `width` chars, appending an ellipsis when truncated
pub fn shorten(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsMap;
    use serde_json::json;

    fn sample_stats() -> RunStats {
        let mut map = StatsMap::new();
        map.insert("data_1".to_string(), StatValue::Int(135246));
        map.insert("ratio".to_string(), StatValue::Float(0.5));
        vec![("default".to_string(), map)]
    }

    #[test]
    fn test_stats_table_contains_preset_and_values() {
        let table = render_stats_table(&sample_stats());
        assert!(table.contains("default"));
        assert!(table.contains("data_1"));
        assert!(table.contains("135246"));
        assert!(table.contains("0.5"));
    }

    #[test]
    fn test_stats_json_keyed_by_preset() {
        let value = stats_to_json(&sample_stats());
        assert_eq!(value["default"]["data_1"], json!(135246));
        assert_eq!(value["default"]["ratio"], json!(0.5));
    }

    #[test]
    fn test_suite_stats_render_numbers_runs() {
        let results = vec![
            SuiteRunStats {
                benchmark_name: "Dummy".to_string(),
                stats: sample_stats(),
            },
            SuiteRunStats {
                benchmark_name: "Other".to_string(),
                stats: sample_stats(),
            },
        ];
        let rendered = render_suite_stats(&results);
        assert!(rendered.contains("RUN#1 - Dummy"));
        assert!(rendered.contains("RUN#2 - Other"));

        let value = suite_stats_to_json(&results);
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_shorten_keeps_short_text() {
        assert_eq!(shorten("short", 40), "short");
    }

    #[test]
    fn test_shorten_truncates_with_ellipsis() {
        let long = "a benchmark with a very long description indeed";
        let short = shorten(long, 20);
        assert!(short.len() <= 20);
        assert!(short.ends_with("..."));
    }
}
