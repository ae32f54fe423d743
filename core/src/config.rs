//! Race configuration types

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Program name used in user-facing hints
pub const PROGRAM_NAME: &str = "race-control";

/// Race configuration
///
/// Read-only bundle describing what to race and where to put its output.
/// Supplied by the caller; the orchestrator never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Name of the pipeline to run
    pub pipeline: String,

    /// Track (workload) name
    pub track: String,

    /// Challenge within the track
    pub challenge: String,

    /// Car (cluster variant) name
    pub car: String,

    /// Number of rounds to run
    pub rounds: usize,

    /// Root directory of this invocation; log archives land here
    pub invocation_root: PathBuf,

    /// Directory holding this race's logs; swept after a successful race
    pub log_root: PathBuf,

    /// When the race was started (names the metrics log file)
    pub start_time: DateTime<Utc>,

    /// Resource sampling settings
    #[serde(default)]
    pub sampling: SamplingConfig,
}

impl RaceConfig {
    /// Create a single-round config for the given track, challenge and car
    ///
    /// Logs go to `<invocation_root>/logs`.
    pub fn new(
        track: impl Into<String>,
        challenge: impl Into<String>,
        car: impl Into<String>,
        invocation_root: impl Into<PathBuf>,
    ) -> Self {
        let invocation_root = invocation_root.into();
        Self {
            pipeline: "from-distribution".to_string(),
            track: track.into(),
            challenge: challenge.into(),
            car: car.into(),
            rounds: 1,
            log_root: invocation_root.join("logs"),
            invocation_root,
            start_time: Utc::now(),
            sampling: SamplingConfig::default(),
        }
    }

    /// Set the pipeline name
    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = pipeline.into();
        self
    }

    /// Set the number of rounds
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set the car name
    pub fn with_car(mut self, car: impl Into<String>) -> Self {
        self.car = car.into();
        self
    }

    /// Set the log root directory
    pub fn with_log_root(mut self, log_root: impl Into<PathBuf>) -> Self {
        self.log_root = log_root.into();
        self
    }

    /// Set the race start time
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Set the resource sampling config
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Path of the log archive produced by the sweep
    pub fn archive_path(&self) -> PathBuf {
        self.invocation_root.join(format!(
            "logs-{}-{}-{}.zip",
            self.track, self.challenge, self.car
        ))
    }

    /// Directory the race's logs are written to
    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("pipeline", &self.pipeline),
            ("track", &self.track),
            ("challenge", &self.challenge),
            ("car", &self.car),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field));
            }
        }

        if self.rounds == 0 {
            return Err(ConfigError::InvalidRounds(
                "rounds must be at least 1".into(),
            ));
        }

        let archive = self.archive_path();
        if archive.starts_with(&self.log_root) {
            return Err(ConfigError::ArchiveInsideLogRoot {
                archive,
                log_root: self.log_root.clone(),
            });
        }

        self.sampling.validate()
    }
}

/// Resource sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Interval between CPU samples
    pub interval: Duration,

    /// Block device to diff I/O counters for; all disks when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_device: Option<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            disk_device: None,
        }
    }
}

impl SamplingConfig {
    /// Set the sampling interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Restrict disk counters to one device
    pub fn with_disk_device(mut self, device: impl Into<String>) -> Self {
        self.disk_device = Some(device.into());
        self
    }

    /// Validate the sampling settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidSampling(
                "sampling interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No pipeline is registered under this name
    #[error(
        "Unknown pipeline [{name}]. List the available pipelines with {program} list pipelines.",
        program = PROGRAM_NAME
    )]
    UnknownPipeline {
        /// Requested pipeline name
        name: String,
    },

    /// A required field is empty
    #[error("Missing required setting: {0}")]
    MissingField(&'static str),

    /// Invalid round count
    #[error("Invalid rounds: {0}")]
    InvalidRounds(String),

    /// Invalid sampling settings
    #[error("Invalid sampling config: {0}")]
    InvalidSampling(String),

    /// The log archive would be swept away with the logs it holds
    #[error(
        "Log archive [{}] lies inside the log directory [{}]",
        archive.display(),
        log_root.display()
    )]
    ArchiveInsideLogRoot {
        /// Archive path
        archive: PathBuf,
        /// Log root that contains it
        log_root: PathBuf,
    },

    /// The orchestrator was built without a collaborator
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}
