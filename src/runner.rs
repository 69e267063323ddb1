//! Execution engine: process lifecycle, live output capture and logging
//!
//! Each task is spawned with separate stdout/stderr pipes which are drained
//! concurrently through poll(2) readiness, so a process writing heavily to
//! one stream while the other is full can never deadlock the harness. Lines
//! are forwarded to the live view as they arrive and appended to per-stream
//! log files. Any task that fails to start or exits non-zero aborts the
//! whole run.

use std::fs::{self, File};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::time::Duration;
use tracing::debug;

use crate::benchmark::{BenchmarkRun, BenchmarkSuite};
use crate::error::{BenchmarkError, Result};
use crate::runnable::Runnable;
use crate::stats::StatsMap;

/// Lifecycle of a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Pending,
    Running,
    Succeeded,
    FailedToStart,
    FailedNonZeroExit,
}

/// Stats for one benchmark run, keyed by preset in selection order
pub type RunStats = Vec<(String, StatsMap)>;

/// Drives one composed benchmark run through its phases
pub struct BenchmarkRunner {
    run: BenchmarkRun,
    log_dir: PathBuf,
}

impl BenchmarkRunner {
    /// Create a runner with a fresh log directory under `<cwd>/logs`
    pub fn new(run: BenchmarkRun) -> Result<Self> {
        let log_dir = create_log_dir(&run.benchmark.id())?;
        Ok(Self { run, log_dir })
    }

    /// Directory receiving this run's task logs
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Run setup, every preset's tasks plus stats extraction, then cleanup
    pub fn start(&mut self) -> Result<RunStats> {
        let benchmark_id = self.run.benchmark.id();

        eprintln!("Running \"{benchmark_id}\" setup commands");
        for (index, task) in self.run.setup().iter().enumerate() {
            self.run_task(task, "setup", index)?;
        }

        let mut stats = RunStats::new();
        for (preset, tasks) in self.run.run() {
            eprintln!("Running \"{benchmark_id}\" preset \"{}\"", preset.name);
            let phase = format!("run_{}", preset.name);
            let stats_index = self.run.stats_task_index(&preset);

            let mut stats_log = None;
            for (index, task) in tasks.iter().enumerate() {
                let out_log = self.run_task(task, &phase, index)?;
                if index == stats_index {
                    stats_log = Some(out_log);
                }
            }

            if let Some(out_log) = stats_log {
                stats.push((preset.name.clone(), self.run.get_stats(&out_log)?));
            }
        }

        for (index, task) in self.run.cleanup().iter().enumerate() {
            self.run_task(task, "cleanup", index)?;
        }

        Ok(stats)
    }

    /// Run setup, the test preset's run tasks and the test commands
    ///
    /// No stats are extracted; the test pipeline's exit codes are the
    /// verdict.
    pub fn start_test(&mut self) -> Result<()> {
        let benchmark_id = self.run.benchmark.id();

        eprintln!("Running \"{benchmark_id}\" setup commands");
        for (index, task) in self.run.setup().iter().enumerate() {
            self.run_task(task, "setup", index)?;
        }

        for (preset, tasks) in self.run.run() {
            eprintln!("Running \"{benchmark_id}\" preset \"{}\"", preset.name);
            let phase = format!("run_{}", preset.name);
            for (index, task) in tasks.iter().enumerate() {
                self.run_task(task, &phase, index)?;
            }
        }

        for (index, task) in self.run.test().iter().enumerate() {
            self.run_task(task, "test", index)?;
        }

        for (index, task) in self.run.cleanup().iter().enumerate() {
            self.run_task(task, "cleanup", index)?;
        }

        Ok(())
    }

    /// Spawn one task, capture its streams and enforce a zero exit
    ///
    /// Returns the path of the task's out-log; its first line is the echoed
    /// command.
    fn run_task(&self, task: &Runnable, phase: &str, index: usize) -> Result<PathBuf> {
        let rendered = task.to_string();
        let out_path = self.log_dir.join(format!("{phase}.{index}.out.log"));
        let err_path = self.log_dir.join(format!("{phase}.{index}.err.log"));

        let mut state = TaskState::Pending;
        debug!("task {rendered:?} [{phase}.{index}]: {state:?}");

        eprintln!("$ {rendered}");
        let mut out_log = File::create(&out_path)?;
        writeln!(out_log, "$ {rendered}")?;
        let err_log = File::create(&err_path)?;

        let mut child = match task
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                state = TaskState::FailedToStart;
                debug!("task {rendered:?}: {state:?}");
                return Err(BenchmarkError::TaskError {
                    command: rendered,
                    source,
                });
            }
        };
        state = TaskState::Running;
        debug!("task {rendered:?}: {state:?}");

        pump_streams(&mut child, out_log, err_log)?;
        let code = wait_for_exit(&mut child)?;

        if code != 0 {
            state = TaskState::FailedNonZeroExit;
            debug!("task {rendered:?}: {state:?} ({code})");
            return Err(BenchmarkError::TaskFailed {
                command: rendered,
                code,
            });
        }

        state = TaskState::Succeeded;
        debug!("task {rendered:?}: {state:?}");
        Ok(out_path)
    }
}

/// Drives a suite's runs sequentially; the first failure aborts the suite
pub struct SuiteRunner {
    suite: BenchmarkSuite,
}

/// Stats for one run inside a suite
pub struct SuiteRunStats {
    pub benchmark_name: String,
    pub stats: RunStats,
}

impl SuiteRunner {
    pub fn new(suite: BenchmarkSuite) -> Self {
        Self { suite }
    }

    /// Run every benchmark run in order, collecting per-run stats
    pub fn start(self) -> Result<Vec<SuiteRunStats>> {
        let mut results = Vec::new();

        for (index, run) in self.suite.benchmark_runs.into_iter().enumerate() {
            eprintln!("Running benchmark run #{}", index + 1);
            let benchmark_name = run.benchmark.definition.name.clone();
            let mut runner = BenchmarkRunner::new(run)?;
            let stats = runner.start()?;
            results.push(SuiteRunStats {
                benchmark_name,
                stats,
            });
        }

        Ok(results)
    }
}

/// Create `<cwd>/logs/<benchmark-id>/<timestamp>`, suffixing on collision
fn create_log_dir(benchmark_id: &str) -> Result<PathBuf> {
    let root = std::env::current_dir()?.join("logs").join(benchmark_id);
    fs::create_dir_all(&root)?;
    unique_subdir(&root, &timestamp())
}

/// Lightweight timestamp without chrono dependency
fn timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_secs())
}

/// Create `<root>/<stamp>` or the first free `<root>/<stamp>_<n>`
fn unique_subdir(root: &Path, stamp: &str) -> Result<PathBuf> {
    let mut suffix = 0u32;
    loop {
        let dir = if suffix == 0 {
            root.join(stamp)
        } else {
            root.join(format!("{stamp}_{suffix}"))
        };
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
            Err(err) => return Err(err.into()),
        }
    }
}

/// Buffered state for one captured stream
struct StreamPump {
    fd: i32,
    log: File,
    /// Prefix for lines forwarded to the live view
    tag: &'static str,
    buf: Vec<u8>,
    eof: bool,
}

impl StreamPump {
    fn new(fd: i32, log: File, tag: &'static str) -> Self {
        Self {
            fd,
            log,
            tag,
            buf: Vec::new(),
            eof: false,
        }
    }

    /// Read once after readiness; a pipe read never blocks here
    fn drain_ready(&mut self) -> Result<()> {
        let mut chunk = [0u8; 4096];
        let n = unsafe {
            libc::read(
                self.fd,
                chunk.as_mut_ptr().cast::<libc::c_void>(),
                chunk.len(),
            )
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err.into());
        }
        if n == 0 {
            self.flush_partial()?;
            self.eof = true;
            return Ok(());
        }
        self.buf.extend_from_slice(&chunk[..n as usize]);
        self.emit_complete_lines()
    }

    fn emit_complete_lines(&mut self) -> Result<()> {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.log.write_all(&line)?;
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            eprintln!("{}{text}", self.tag);
        }
        Ok(())
    }

    /// A stream may end without a trailing newline; log it as a full line
    fn flush_partial(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.log.write_all(&self.buf)?;
            self.log.write_all(b"\n")?;
            eprintln!("{}{}", self.tag, String::from_utf8_lossy(&self.buf));
            self.buf.clear();
        }
        Ok(())
    }
}

/// Drain stdout and stderr concurrently until both report EOF
///
/// Both pipes are registered with poll(2) and read as they become ready.
/// Reading one stream to completion before the other would deadlock once
/// the unread pipe fills, so readiness decides the read order; per-stream
/// line order is preserved, cross-stream interleaving is best-effort.
fn pump_streams(child: &mut Child, out_log: File, err_log: File) -> Result<()> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("child stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("child stderr was not piped"))?;

    let mut out_pump = StreamPump::new(stdout.as_raw_fd(), out_log, "");
    let mut err_pump = StreamPump::new(stderr.as_raw_fd(), err_log, "[err] ");

    while !out_pump.eof || !err_pump.eof {
        let mut fds = Vec::with_capacity(2);
        let mut which = Vec::with_capacity(2);
        for (index, pump) in [&out_pump, &err_pump].iter().enumerate() {
            if !pump.eof {
                fds.push(libc::pollfd {
                    fd: pump.fd,
                    events: libc::POLLIN,
                    revents: 0,
                });
                which.push(index);
            }
        }

        let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }

        for (slot, pollfd) in fds.iter().enumerate() {
            if pollfd.revents == 0 {
                continue;
            }
            let pump = if which[slot] == 0 {
                &mut out_pump
            } else {
                &mut err_pump
            };
            if pollfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
                pump.drain_ready()?;
            } else if pollfd.revents & libc::POLLNVAL != 0 {
                pump.eof = true;
            }
        }
    }

    // stdout/stderr handles drop here, closing our ends of the pipes
    Ok(())
}

/// Sleep-poll for process completion once the streams are drained
///
/// No timeout and no kill: a hung benchmark hangs the run.
fn wait_for_exit(child: &mut Child) -> Result<i32> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status.code().unwrap_or(-1));
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
