//! race-control-core: Race orchestration and metrics collection for benchmarks
//!
//! This crate drives a benchmark race against a provisioned cluster,
//! including:
//!
//! - Named pipelines and their dispatch
//! - The round loop with lap timing and ETA projection
//! - The per-round driver protocol
//! - The metrics log and background resource sampling
//! - Log archival after a successful race
//!
//! Track loading, provisioning, metrics persistence and reporting are
//! supplied by the caller through the traits in [`traits`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod collector;
pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod traits;

pub use archive::ZipArchiver;
pub use collector::{
    DiskCounters, Instrumentation, MetricsError, MetricsSink, ResourceProbe, ResourceSampler,
    SamplerSnapshot, SystemInstrumentation,
};
pub use config::{ConfigError, RaceConfig, SamplingConfig, PROGRAM_NAME};
pub use driver::{
    Driver, DriverFactory, DriverMessage, RoundExecution, RoundResult, RoundState, StartBenchmark,
};
pub use error::*;
pub use metrics::*;
pub use orchestrator::{format_hms, Lap, LapClock, OrchestratorBuilder, RaceOrchestrator, RaceSummary};
pub use pipeline::{render_pipeline_table, Pipeline, PipelineRegistry, RaceContext};
pub use traits::*;
