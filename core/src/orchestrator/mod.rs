//! Race orchestrator
//!
//! The orchestrator runs one race end to end:
//! - loads the track and records it in the metrics store
//! - prepares and starts the cluster, then runs every round on a fresh driver
//! - stops the cluster and closes the metrics sink and store on every path
//! - summarizes and archives the logs once all rounds succeeded
//!
//! # Example
//!
//! ```ignore
//! use race_control_core::{MetricsSink, OrchestratorBuilder, RaceConfig};
//!
//! let config = RaceConfig::new("geonames", "append-no-conflicts", "defaults", root)
//!     .with_rounds(3);
//! let sink = MetricsSink::open(config.log_root(), &config.track, config.start_time)?;
//!
//! let orchestrator = OrchestratorBuilder::new(config)
//!     .track_loader(loader)
//!     .metrics_store(store)
//!     .reporter(reporter)
//!     .drivers(drivers)
//!     .build()?;
//!
//! let summary = orchestrator.run_race(mechanic.as_ref(), sink).await?;
//! ```

mod builder;
mod executor;
mod lap;
mod sweep;

pub use builder::OrchestratorBuilder;
pub use executor::{RaceOrchestrator, RaceSummary};
pub use lap::{format_hms, Lap, LapClock};
