//! Runtime benchmark entities: discovery, preset resolution and task
//! composition
//!
//! A `Benchmark` is a definition bound to its owning directory. A
//! `BenchmarkRun` composes a benchmark with the selected presets into the
//! ordered task sequences for the setup/run/test/cleanup phases, and is the
//! single point where cwd resolution and virtualenv context are decided.
//! All cross-references (preset names, benchmark ids) are resolved eagerly,
//! before any subprocess is spawned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{BenchmarkError, Result};
use crate::json::{
    BenchmarkDefinition, BenchmarkStats, BenchmarkSuiteDefinition, Definition, PresetDefinition,
};
use crate::runnable::Runnable;
use crate::stats::{self, StatsMap};

/// A benchmark definition bound to its owning directory
#[derive(Debug, Clone)]
pub struct Benchmark {
    /// The validated definition document
    pub definition: BenchmarkDefinition,
    /// Owning directory, set at load time from the definition file location
    dir: PathBuf,
}

impl Benchmark {
    /// Load a benchmark from its `benchmark.json` definition file
    pub fn from_definition_file(path: &Path) -> Result<Self> {
        let definition = BenchmarkDefinition::from_file(path)?;
        let dir = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .canonicalize()?;
        Ok(Self { definition, dir })
    }

    /// Benchmark id: the owning directory's basename
    pub fn id(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Owning directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List every preset under `presets/`, in directory-listing order
    ///
    /// The order is not semantically meaningful.
    pub fn get_presets(&self) -> Result<Vec<Preset>> {
        let mut presets = Vec::new();
        for entry in std::fs::read_dir(self.dir.join("presets"))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                presets.push(Preset::from_file(&path)?);
            }
        }
        Ok(presets)
    }

    /// Resolve a preset by name from `presets/<name>.json`
    pub fn get_preset(&self, name: &str) -> Result<Preset> {
        let path = self.dir.join("presets").join(format!("{name}.json"));
        if !path.is_file() {
            return Err(BenchmarkError::PresetNotFound {
                benchmark: self.id(),
                preset: name.to_string(),
            });
        }
        Preset::from_file(&path)
    }

    /// Resolve the definition's default preset
    pub fn get_default_preset(&self) -> Result<Preset> {
        self.get_preset(&self.definition.default_preset)
    }

    /// Resolve the test preset, falling back to the default preset
    ///
    /// A configured but missing preset file is a hard error, never silently
    /// substituted.
    pub fn get_test_preset(&self) -> Result<Preset> {
        match &self.definition.test_preset {
            Some(name) => self.get_preset(name),
            None => self.get_default_preset(),
        }
    }

    /// Compose a run over the given presets
    pub fn run(self, presets: Vec<Preset>) -> BenchmarkRun {
        BenchmarkRun::new(self, presets)
    }
}

/// A preset definition bound to its name (filename, extension stripped)
#[derive(Debug, Clone)]
pub struct Preset {
    pub name: String,
    pub definition: PresetDefinition,
}

impl Preset {
    /// Load a preset from `presets/<name>.json`
    pub fn from_file(path: &Path) -> Result<Self> {
        let definition = PresetDefinition::from_file(path)?;
        let name = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, definition })
    }

    /// Extra arguments spliced onto the last run command
    pub fn args(&self) -> &[String] {
        self.definition.args.as_deref().unwrap_or(&[])
    }
}

/// A benchmark composed with selected presets, ready to emit task sequences
#[derive(Debug)]
pub struct BenchmarkRun {
    pub benchmark: Benchmark,
    pub presets: Vec<Preset>,
    /// Run-scoped virtualenv path, set at most once when setup() runs.
    /// Owned exclusively by this run; left on disk afterwards.
    virtualenv: Option<PathBuf>,
}

impl BenchmarkRun {
    /// Create a run over a benchmark and its selected presets
    pub fn new(benchmark: Benchmark, presets: Vec<Preset>) -> Self {
        Self {
            benchmark,
            presets,
            virtualenv: None,
        }
    }

    /// Setup-phase tasks
    ///
    /// With `virtualenv` enabled the first task creates `.venv` in the
    /// benchmark dir; every task composed after it (in any phase) carries
    /// the `VIRTUAL_ENV` marker and a `PATH` entry for the venv's `bin`.
    pub fn setup(&mut self) -> Vec<Runnable> {
        let mut tasks = Vec::new();

        if self.benchmark.definition.virtualenv && self.virtualenv.is_none() {
            let mut venv_task = Runnable::new(
                ["python3", "-m", "venv", ".venv"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            );
            venv_task.cwd = Some(self.benchmark.dir().to_path_buf());
            tasks.push(venv_task);
            self.virtualenv = Some(self.benchmark.dir().join(".venv"));
        }

        for command in self.benchmark.definition.setup_commands.iter().flatten() {
            tasks.push(self.add_context(command.into_runnable()));
        }

        tasks
    }

    /// Run-phase task sequences, one per preset in selection order
    ///
    /// Each sequence is the preset's init commands, then every run command
    /// with the preset's args/env spliced onto the LAST one only, then the
    /// preset's post commands. Multi-step pipelines receive the preset
    /// parameters only on the final invocation.
    pub fn run(&self) -> Vec<(Preset, Vec<Runnable>)> {
        let mut sequences = Vec::new();

        for preset in &self.presets {
            let mut commands = Vec::new();

            commands.extend(preset.definition.init_commands.iter().flatten().cloned());

            if let Some((last, head)) = self.benchmark.definition.run_commands.split_last() {
                commands.extend(head.iter().cloned());
                commands.push(last.extend(preset.args(), &preset.definition.env, None));
            }

            commands.extend(preset.definition.post_commands.iter().flatten().cloned());

            let tasks = commands
                .iter()
                .map(|c| self.add_context(c.into_runnable()))
                .collect();
            sequences.push((preset.clone(), tasks));
        }

        sequences
    }

    /// Test-phase tasks
    pub fn test(&self) -> Vec<Runnable> {
        self.benchmark
            .definition
            .test_commands
            .iter()
            .map(|c| self.add_context(c.into_runnable()))
            .collect()
    }

    /// Cleanup-phase tasks
    pub fn cleanup(&self) -> Vec<Runnable> {
        self.benchmark
            .definition
            .cleanup_commands
            .iter()
            .flatten()
            .map(|c| self.add_context(c.into_runnable()))
            .collect()
    }

    /// Index, within a preset's task sequence, of the task whose captured
    /// out-log feeds stats extraction (the last run command, before any
    /// post commands)
    pub fn stats_task_index(&self, preset: &Preset) -> usize {
        let init = preset.definition.init_commands.as_ref().map_or(0, Vec::len);
        init + self.benchmark.definition.run_commands.len() - 1
    }

    /// Extract stats from a completed preset's captured out-log
    pub fn get_stats(&self, out_log: &Path) -> Result<StatsMap> {
        match &self.benchmark.definition.stats {
            BenchmarkStats::Script(info) => {
                let log_path = out_log.canonicalize()?;
                let extended = info.extend(
                    &[log_path.display().to_string()],
                    &BTreeMap::new(),
                    None,
                );
                let task = self.add_context(extended.into_runnable());
                stats::extract_script_stats(&task)
            }
            BenchmarkStats::Matchers(matchers) => {
                stats::extract_regex_stats(matchers, out_log, self.benchmark.dir())
            }
        }
    }

    /// Apply run context to a task
    ///
    /// The single point deciding "where am I running and with what
    /// environment": relative workdirs resolve against the benchmark dir,
    /// and the virtualenv marker/PATH entry are injected once the venv
    /// exists.
    fn add_context(&self, mut runnable: Runnable) -> Runnable {
        runnable.cwd = Some(match runnable.cwd.take() {
            Some(cwd) if cwd.is_absolute() => cwd,
            Some(cwd) => self.benchmark.dir().join(cwd),
            None => self.benchmark.dir().to_path_buf(),
        });

        if let Some(venv) = &self.virtualenv {
            runnable = runnable.with_path_entry(venv.join("bin"));
            runnable
                .env
                .entry("VIRTUAL_ENV".to_string())
                .or_insert_with(|| venv.display().to_string());
        }

        runnable
    }
}

/// An ordered list of benchmark runs sharing a search path
#[derive(Debug)]
pub struct BenchmarkSuite {
    pub name: String,
    pub description: String,
    pub benchmark_runs: Vec<BenchmarkRun>,
}

impl BenchmarkSuite {
    /// Build a suite from its definition, resolving every reference eagerly
    ///
    /// Construction is all-or-nothing: any unresolved benchmark id or
    /// preset name fails before anything runs.
    pub fn from_definition(
        definition: &BenchmarkSuiteDefinition,
        search_path: &str,
    ) -> Result<Self> {
        let mut benchmark_runs = Vec::new();

        for run_def in &definition.benchmark_runs {
            let benchmark = find_benchmark(&run_def.benchmark_folder, search_path)?
                .ok_or_else(|| {
                    BenchmarkError::BenchmarkNotFound(run_def.benchmark_folder.clone())
                })?;
            let presets = run_def
                .presets
                .iter()
                .map(|name| benchmark.get_preset(name))
                .collect::<Result<Vec<_>>>()?;
            benchmark_runs.push(benchmark.run(presets));
        }

        Ok(Self {
            name: definition.name.clone(),
            description: definition.description.clone(),
            benchmark_runs,
        })
    }

    /// Load a suite definition file and resolve it against the search path
    pub fn from_definition_file(path: &Path, search_path: &str) -> Result<Self> {
        let definition = BenchmarkSuiteDefinition::from_file(path)?;
        Self::from_definition(&definition, search_path)
    }
}

/// List every benchmark found under `<root>/benchmarks/*/benchmark.json`
/// for each `:`-separated search path root
///
/// Directories without a `benchmark.json` are skipped silently; roots
/// without a `benchmarks/` directory are skipped with a warning.
pub fn get_benchmarks(search_path: &str) -> Result<Vec<Benchmark>> {
    let mut benchmarks = Vec::new();

    for root in search_path.split(':') {
        let dir = Path::new(root).join("benchmarks");
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("search path entry {} is not usable: {err}", dir.display());
                continue;
            }
        };

        for entry in entries {
            let definition_file = entry?.path().join("benchmark.json");
            if definition_file.is_file() {
                benchmarks.push(Benchmark::from_definition_file(&definition_file)?);
            }
        }
    }

    Ok(benchmarks)
}

/// Find a benchmark by id (directory basename); first match wins
///
/// Roots are consulted in search-path order and later entries are never
/// loaded once a match is found.
pub fn find_benchmark(id: &str, search_path: &str) -> Result<Option<Benchmark>> {
    for root in search_path.split(':') {
        let definition_file = Path::new(root)
            .join("benchmarks")
            .join(id)
            .join("benchmark.json");
        if definition_file.is_file() {
            return Benchmark::from_definition_file(&definition_file).map(Some);
        }
    }
    Ok(None)
}

/// List every suite definition under `<root>/suites/*.json` across the
/// search path
pub fn get_suite_definitions(search_path: &str) -> Result<Vec<BenchmarkSuiteDefinition>> {
    let mut suites = Vec::new();

    for root in search_path.split(':') {
        let dir = Path::new(root).join("suites");
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("search path entry {} has no suites: {err}", dir.display());
                continue;
            }
        };

        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                suites.push(BenchmarkSuiteDefinition::from_file(&path)?);
            }
        }
    }

    Ok(suites)
}

/// Find a suite definition whose name starts with `search`; first match wins
pub fn find_suite_definition(
    search: &str,
    search_path: &str,
) -> Result<Option<BenchmarkSuiteDefinition>> {
    Ok(get_suite_definitions(search_path)?
        .into_iter()
        .find(|suite| suite.name.starts_with(search)))
}

/// Find and fully resolve a suite by name prefix
pub fn find_suite(search: &str, search_path: &str) -> Result<Option<BenchmarkSuite>> {
    match find_suite_definition(search, search_path)? {
        Some(definition) => BenchmarkSuite::from_definition(&definition, search_path).map(Some),
        None => Ok(None),
    }
}
