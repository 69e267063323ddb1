//! Error taxonomy for definition loading and benchmark execution
//!
//! Every fatal condition surfaces as a `BenchmarkError`; nothing is
//! swallowed or retried. Task failures abort the whole run and leave the
//! captured logs on disk for inspection.

use thiserror::Error;

/// Errors that can occur while loading definitions or running benchmarks
#[derive(Error, Debug)]
pub enum BenchmarkError {
    /// A definition document did not conform to its JSON Schema
    #[error("Invalid {kind} definition: {message}")]
    SchemaValidation { kind: &'static str, message: String },

    /// A benchmark id could not be resolved in the search path
    #[error("Benchmark \"{0}\" not found in search path")]
    BenchmarkNotFound(String),

    /// A preset name could not be resolved inside a benchmark
    #[error("Preset \"{preset}\" not found in benchmark \"{benchmark}\"")]
    PresetNotFound { benchmark: String, preset: String },

    /// A benchmark suite name could not be resolved in the search path
    #[error("Suite \"{0}\" not found in search path")]
    SuiteNotFound(String),

    /// A task's process failed to start
    #[error("Task \"{command}\" did not start: {source}")]
    TaskError {
        command: String,
        source: std::io::Error,
    },

    /// A task's process exited with a non-zero status
    #[error("Task \"{command}\" failed with return code {code}")]
    TaskFailed { command: String, code: i32 },

    /// A stats script produced invalid or non-schema JSON
    #[error("Failed to decode stats: {message}\nstats script output was:\n{output}")]
    StatsDecode { message: String, output: String },

    /// A declared stat's regex never matched a line of output
    #[error("No match for stat \"{0}\" in benchmark output")]
    StatsMatch(String),

    /// A declared stat's regex failed to compile
    #[error("Invalid regex for stat \"{stat}\": {source}")]
    StatsRegex {
        stat: String,
        source: regex::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for benchmark operations
pub type Result<T> = std::result::Result<T, BenchmarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_failed_message_includes_command_and_code() {
        let err = BenchmarkError::TaskFailed {
            command: "false".into(),
            code: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("false"));
        assert!(msg.contains('1'));
    }

    #[test]
    fn test_stats_decode_message_carries_raw_output() {
        let err = BenchmarkError::StatsDecode {
            message: "expected object".into(),
            output: "not json at all".into(),
        };
        assert!(err.to_string().contains("not json at all"));
    }

    #[test]
    fn test_preset_not_found_names_both_sides() {
        let err = BenchmarkError::PresetNotFound {
            benchmark: "matmul".into(),
            preset: "xl".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("matmul"));
        assert!(msg.contains("xl"));
    }
}
