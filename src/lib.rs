//! Medir - benchmark-execution harness for JSON-defined command pipelines
//!
//! This library provides the core functionality for declaring benchmarks as
//! JSON documents (setup/run/cleanup/test pipelines plus named presets),
//! executing them as subprocesses with live output capture, and extracting
//! structured numeric statistics from the captured output. The benchmark
//! payload itself is an opaque external command; the harness never inspects
//! it.

pub mod benchmark;
pub mod cli;
pub mod command;
pub mod error;
pub mod json;
pub mod output;
pub mod runnable;
pub mod runner;
pub mod stats;
