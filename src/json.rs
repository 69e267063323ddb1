//! Benchmark definition documents and their JSON Schema validation
//!
//! Definitions are pure data: a raw `serde_json::Value` is validated against
//! the published schema for its kind BEFORE any field extraction, so a
//! structurally invalid document never partially constructs a definition.
//! Serialization goes back through the same validation path, which keeps
//! serialize(deserialize(x)) schema-valid for every valid x.

use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::command::{ArgvRepr, CommandInfo};
use crate::error::{BenchmarkError, Result};

/// Validate a JSON value against an embedded schema document
pub(crate) fn validate_schema(kind: &'static str, schema: &str, value: &Value) -> Result<()> {
    let schema_doc: Value = serde_json::from_str(schema)?;
    let compiled = JSONSchema::compile(&schema_doc).map_err(|e| {
        BenchmarkError::SchemaValidation {
            kind,
            message: e.to_string(),
        }
    })?;

    if let Err(errors) = compiled.validate(value) {
        let message = errors
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(BenchmarkError::SchemaValidation { kind, message });
    }

    Ok(())
}

/// A definition kind that can be (de)serialized through its JSON Schema
pub trait Definition: Serialize + DeserializeOwned {
    /// Definition kind name used in validation errors
    const KIND: &'static str;
    /// Embedded JSON Schema document for this kind
    const SCHEMA: &'static str;

    /// Validate a raw JSON value against this kind's schema
    fn validate(value: &Value) -> Result<()> {
        validate_schema(Self::KIND, Self::SCHEMA, value)
    }

    /// Validate and then extract a definition from a raw JSON value
    fn deserialize_json(value: Value) -> Result<Self> {
        Self::validate(&value)?;
        serde_json::from_value(value).map_err(Into::into)
    }

    /// Serialize into a JSON value
    fn serialize_json(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Into::into)
    }

    /// Load a definition from a JSON file
    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        Self::deserialize_json(value)
    }

    /// Write a definition to a JSON file, re-validating what is written
    fn to_file(&self, path: &Path) -> Result<()> {
        let value = self.serialize_json()?;
        Self::validate(&value)?;
        fs::write(path, serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }
}

/// Declared statistics of a benchmark: an external script or regex matchers
///
/// The shape is sniffed once, at deserialization: a string or an object with
/// a `command` key is a stats script, anything else is a map of named
/// matchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BenchmarkStats {
    /// External script printing a JSON object of stats to stdout
    Script(CommandInfo),
    /// Named regexes matched against captured output
    Matchers(BTreeMap<String, StatMatchInfo>),
}

/// Match information for a single named stat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatMatchInfo {
    /// Regex with exactly one capturing group yielding a number
    pub regex: String,
    /// File to search instead of the captured run output, relative to the
    /// benchmark dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// A benchmark definition document (`benchmark.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkDefinition {
    pub name: String,
    pub description: String,
    /// Preset used when none is selected; must name an existing preset file
    pub default_preset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_preset: Option<String>,
    #[serde(
        rename = "setup_command",
        default,
        deserialize_with = "opt_commands",
        skip_serializing_if = "Option::is_none"
    )]
    pub setup_commands: Option<Vec<CommandInfo>>,
    /// Run pipeline; preset args are spliced onto the last element only
    #[serde(rename = "run_command", deserialize_with = "commands")]
    pub run_commands: Vec<CommandInfo>,
    #[serde(
        rename = "cleanup_command",
        default,
        deserialize_with = "opt_commands",
        skip_serializing_if = "Option::is_none"
    )]
    pub cleanup_commands: Option<Vec<CommandInfo>>,
    #[serde(rename = "test_command", deserialize_with = "commands")]
    pub test_commands: Vec<CommandInfo>,
    pub stats: BenchmarkStats,
    #[serde(default)]
    pub virtualenv: bool,
}

impl Definition for BenchmarkDefinition {
    const KIND: &'static str = "benchmark";
    const SCHEMA: &'static str = include_str!("jsonschema/benchmark.schema.json");
}

/// A preset definition document (`presets/<name>.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PresetDefinition {
    /// Extra arguments for the last run command; string form is shell-split
    #[serde(
        default,
        deserialize_with = "opt_args",
        skip_serializing_if = "Option::is_none"
    )]
    pub args: Option<Vec<String>>,
    #[serde(
        rename = "init_command",
        default,
        deserialize_with = "opt_commands",
        skip_serializing_if = "Option::is_none"
    )]
    pub init_commands: Option<Vec<CommandInfo>>,
    #[serde(
        rename = "post_command",
        default,
        deserialize_with = "opt_commands",
        skip_serializing_if = "Option::is_none"
    )]
    pub post_commands: Option<Vec<CommandInfo>>,
    /// Environment overrides for the last run command
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Definition for PresetDefinition {
    const KIND: &'static str = "preset";
    const SCHEMA: &'static str = include_str!("jsonschema/preset.schema.json");
}

/// One benchmark+preset selection inside a suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkRunDefinition {
    /// Benchmark id (the benchmark's directory basename)
    pub benchmark_folder: String,
    /// Selected preset names, in run order
    pub presets: Vec<String>,
}

/// A benchmark suite definition document (`suites/<name>.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkSuiteDefinition {
    pub name: String,
    pub description: String,
    pub benchmark_runs: Vec<BenchmarkRunDefinition>,
}

impl Definition for BenchmarkSuiteDefinition {
    const KIND: &'static str = "suite";
    const SCHEMA: &'static str = include_str!("jsonschema/suite.schema.json");
}

/// Embedded schema for stats-script output documents
pub(crate) const STATS_OUTPUT_SCHEMA: &str = include_str!("jsonschema/stats.schema.json");

/// A `*_command` value: one command or an ordered list of commands
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

fn commands<'de, D>(deserializer: D) -> std::result::Result<Vec<CommandInfo>, D::Error>
where
    D: Deserializer<'de>,
{
    OneOrMany::<CommandInfo>::deserialize(deserializer).map(Into::into)
}

fn opt_commands<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<CommandInfo>>, D::Error>
where
    D: Deserializer<'de>,
{
    commands(deserializer).map(Some)
}

fn opt_args<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let args = match ArgvRepr::deserialize(deserializer)? {
        ArgvRepr::Line(line) => shlex::split(&line).ok_or_else(|| {
            serde::de::Error::custom(format!("cannot shell-split args: {line:?}"))
        })?,
        ArgvRepr::List(args) => args,
    };
    Ok(Some(args))
}
