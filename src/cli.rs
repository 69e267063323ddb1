//! CLI argument parsing for Medir

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "medir")]
#[command(version)]
#[command(about = "Benchmark-execution harness for JSON-defined command pipelines", long_about = None)]
pub struct Cli {
    /// Colon-separated root directories scanned for benchmarks/ and suites/
    #[arg(
        short = 's',
        long = "search-path",
        env = "MEDIR_PATH",
        default_value = ".",
        global = true,
        value_name = "PATHS"
    )]
    pub search_path: String,

    /// Enable debug logging to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and run benchmarks
    #[command(subcommand)]
    Benchmark(BenchmarkCommands),
    /// Inspect and run benchmark suites
    #[command(subcommand)]
    Suite(SuiteCommands),
}

#[derive(Subcommand, Debug)]
pub enum BenchmarkCommands {
    /// List benchmarks found in the search path
    List {
        /// Render a table with names and descriptions
        #[arg(short, long)]
        table: bool,
    },
    /// List a benchmark's presets
    ListPresets {
        benchmark_id: String,
    },
    /// Print a benchmark definition as JSON
    Get {
        benchmark_id: String,
    },
    /// Print a preset definition as JSON
    GetPreset {
        benchmark_id: String,
        preset_name: String,
    },
    /// Run a benchmark (with its default preset when none is given)
    Run {
        benchmark_id: String,
        /// Presets to run, in order
        presets: Vec<String>,
        /// Print stats as a JSON object keyed by preset name
        #[arg(long)]
        json: bool,
    },
    /// Run a benchmark's test pipeline with its test preset
    Test {
        benchmark_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SuiteCommands {
    /// List suites found in the search path
    List {
        /// Render a table with descriptions
        #[arg(short, long)]
        table: bool,
    },
    /// Print a suite definition as JSON
    Get {
        name: String,
    },
    /// Run every benchmark run in a suite
    Run {
        name: String,
        /// Print stats as a JSON array, one object per run
        #[arg(long)]
        json: bool,
    },
}
