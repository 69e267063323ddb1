//! Stats extraction from completed benchmark runs
//!
//! Two mutually exclusive strategies, chosen by the shape of the
//! benchmark's `stats` field: an external script printing a JSON object,
//! or named regexes matched against captured output. Both return a
//! name-to-number map or fail loudly; partial results are never returned.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{BenchmarkError, Result};
use crate::json::{validate_schema, StatMatchInfo, STATS_OUTPUT_SCHEMA};
use crate::runnable::Runnable;

/// A single extracted stat: integer when the matched literal has no `.`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Int(i64),
    Float(f64),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Int(value) => write!(f, "{value}"),
            StatValue::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Extracted stats for one preset
pub type StatsMap = BTreeMap<String, StatValue>;

/// Run a stats script and decode its stdout as a stats map
///
/// The task already carries the out-log path as its last argument and the
/// run's context (cwd, virtualenv PATH). The script's exit code is not
/// checked; only its stdout matters. Non-numeric values in the output
/// object are metadata and are dropped without error.
pub fn extract_script_stats(task: &Runnable) -> Result<StatsMap> {
    debug!("running stats script: {task}");
    let output = task
        .command()
        .output()
        .map_err(|source| BenchmarkError::TaskError {
            command: task.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let value: Value =
        serde_json::from_str(&stdout).map_err(|e| BenchmarkError::StatsDecode {
            message: e.to_string(),
            output: stdout.clone(),
        })?;
    validate_schema("stats output", STATS_OUTPUT_SCHEMA, &value).map_err(|e| {
        BenchmarkError::StatsDecode {
            message: e.to_string(),
            output: stdout.clone(),
        }
    })?;

    let mut stats = StatsMap::new();
    if let Value::Object(map) = value {
        for (name, value) in map {
            match value {
                Value::Number(n) if n.is_i64() => {
                    stats.insert(name, StatValue::Int(n.as_i64().unwrap_or_default()));
                }
                Value::Number(n) => {
                    stats.insert(name, StatValue::Float(n.as_f64().unwrap_or_default()));
                }
                _ => {}
            }
        }
    }
    Ok(stats)
}

/// Match every declared stat against captured output or its named file
///
/// The captured out-log's first line is the echoed command and is skipped
/// before matching; files named by a matcher are searched in full. Matching
/// is line-by-line, first match wins. Every declared stat must match at
/// least once.
pub fn extract_regex_stats(
    matchers: &BTreeMap<String, StatMatchInfo>,
    out_log: &Path,
    benchmark_dir: &Path,
) -> Result<StatsMap> {
    let captured = fs::read_to_string(out_log)?;
    let captured_body = captured.lines().skip(1).collect::<Vec<_>>().join("\n");

    let mut stats = StatsMap::new();
    for (name, info) in matchers {
        let regex = Regex::new(&info.regex).map_err(|source| BenchmarkError::StatsRegex {
            stat: name.clone(),
            source,
        })?;

        let file_content = match &info.file {
            Some(file) => Some(fs::read_to_string(benchmark_dir.join(file))?),
            None => None,
        };
        let text = file_content.as_deref().unwrap_or(&captured_body);

        let capture = text
            .lines()
            .find_map(|line| regex.captures(line))
            .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .ok_or_else(|| BenchmarkError::StatsMatch(name.clone()))?;

        stats.insert(name.clone(), parse_stat(name, &capture)?);
    }
    Ok(stats)
}

/// Parse a captured literal: a `.` means float, otherwise integer
fn parse_stat(name: &str, literal: &str) -> Result<StatValue> {
    let decode_err = |e: &dyn std::fmt::Display| BenchmarkError::StatsDecode {
        message: format!("stat \"{name}\" captured a non-numeric value: {e}"),
        output: literal.to_string(),
    };
    if literal.contains('.') {
        literal
            .parse::<f64>()
            .map(StatValue::Float)
            .map_err(|e| decode_err(&e))
    } else {
        literal
            .parse::<i64>()
            .map(StatValue::Int)
            .map_err(|e| decode_err(&e))
    }
}
