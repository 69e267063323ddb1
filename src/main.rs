use anyhow::Result;
use clap::Parser;
use medir::benchmark::{self, Benchmark};
use medir::cli::{BenchmarkCommands, Cli, Commands, SuiteCommands};
use medir::error::BenchmarkError;
use medir::json::Definition;
use medir::output;
use medir::runner::{BenchmarkRunner, SuiteRunner};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Resolve a benchmark id or fail with a named error
fn find_benchmark(id: &str, search_path: &str) -> Result<Benchmark> {
    benchmark::find_benchmark(id, search_path)?
        .ok_or_else(|| BenchmarkError::BenchmarkNotFound(id.to_string()).into())
}

fn run_benchmark_command(command: BenchmarkCommands, search_path: &str) -> Result<()> {
    match command {
        BenchmarkCommands::List { table } => {
            let benchmarks = benchmark::get_benchmarks(search_path)?;
            if table {
                println!("{}", output::render_benchmark_table(&benchmarks));
            } else {
                for benchmark in &benchmarks {
                    println!("{}", benchmark.id());
                }
            }
        }
        BenchmarkCommands::ListPresets { benchmark_id } => {
            let benchmark = find_benchmark(&benchmark_id, search_path)?;
            for preset in benchmark.get_presets()? {
                println!("{}", preset.name);
            }
        }
        BenchmarkCommands::Get { benchmark_id } => {
            let benchmark = find_benchmark(&benchmark_id, search_path)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&benchmark.definition.serialize_json()?)?
            );
        }
        BenchmarkCommands::GetPreset {
            benchmark_id,
            preset_name,
        } => {
            let benchmark = find_benchmark(&benchmark_id, search_path)?;
            let preset = benchmark.get_preset(&preset_name)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&preset.definition.serialize_json()?)?
            );
        }
        BenchmarkCommands::Run {
            benchmark_id,
            presets,
            json,
        } => {
            let benchmark = find_benchmark(&benchmark_id, search_path)?;
            let presets = if presets.is_empty() {
                vec![benchmark.get_default_preset()?]
            } else {
                presets
                    .iter()
                    .map(|name| benchmark.get_preset(name))
                    .collect::<medir::error::Result<Vec<_>>>()?
            };

            let mut runner = BenchmarkRunner::new(benchmark.run(presets))?;
            let stats = runner.start()?;

            if json {
                println!("{}", output::stats_to_json(&stats));
            } else {
                println!("{}", output::render_stats_table(&stats));
            }
        }
        BenchmarkCommands::Test { benchmark_id } => {
            let benchmark = find_benchmark(&benchmark_id, search_path)?;
            let preset = benchmark.get_test_preset()?;
            let mut runner = BenchmarkRunner::new(benchmark.run(vec![preset]))?;
            runner.start_test()?;
            eprintln!("Benchmark \"{benchmark_id}\" test passed");
        }
    }
    Ok(())
}

fn run_suite_command(command: SuiteCommands, search_path: &str) -> Result<()> {
    match command {
        SuiteCommands::List { table } => {
            let suites = benchmark::get_suite_definitions(search_path)?;
            if table {
                println!("{}", output::render_suite_table(&suites));
            } else {
                for suite in &suites {
                    println!("{}", suite.name);
                }
            }
        }
        SuiteCommands::Get { name } => {
            let definition = benchmark::find_suite_definition(&name, search_path)?
                .ok_or(BenchmarkError::SuiteNotFound(name))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&definition.serialize_json()?)?
            );
        }
        SuiteCommands::Run { name, json } => {
            let suite = benchmark::find_suite(&name, search_path)?
                .ok_or(BenchmarkError::SuiteNotFound(name))?;
            let results = SuiteRunner::new(suite).start()?;

            if json {
                println!("{}", output::suite_stats_to_json(&results));
            } else {
                println!("{}", output::render_suite_stats(&results));
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    match args.command {
        Commands::Benchmark(command) => run_benchmark_command(command, &args.search_path),
        Commands::Suite(command) => run_suite_command(command, &args.search_path),
    }
}
