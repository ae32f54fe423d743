//! Error types for race-control-core

use std::path::PathBuf;

use thiserror::Error;

use crate::collector::MetricsError;
use crate::config::ConfigError;

/// Boxed error returned by external collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level race error
///
/// Every failure surfaced while running a race is wrapped into one of these
/// variants before it reaches the caller. The original cause is kept as the
/// error source.
#[derive(Error, Debug)]
pub enum RaceError {
    /// Invalid configuration or unknown pipeline; the race never starts
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The track could not be loaded
    #[error("could not load track [{track}]")]
    TrackLoad {
        /// Name of the track that failed to load
        track: String,
        /// Loader error
        #[source]
        source: BoxError,
    },

    /// The provisioning collaborator failed
    #[error("provisioning failed during {stage}")]
    Provisioning {
        /// Lifecycle step that failed (e.g. "start engine")
        stage: &'static str,
        /// Mechanic error
        #[source]
        source: BoxError,
    },

    /// A round returned something other than a terminal result
    #[error("{0}")]
    ProtocolViolation(String),

    /// A round reported its own failure
    #[error("{message}")]
    RoundFailure {
        /// Failure message reported by the driver
        message: String,
        /// Original driver error
        #[source]
        cause: BoxError,
    },

    /// Metrics sink failure
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// The metrics store rejected an operation
    #[error("metrics store failed during {stage}")]
    MetricsStore {
        /// Store operation that failed
        stage: &'static str,
        /// Store error
        #[source]
        source: BoxError,
    },

    /// Report summarization failed
    #[error("could not summarize race results")]
    Report(#[source] BoxError),

    /// Log archival failed
    #[error("could not archive logs to [{}]", path.display())]
    Archive {
        /// Archive that was being written
        path: PathBuf,
        /// Archiver error
        #[source]
        source: BoxError,
    },

    /// The pipeline panicked
    #[error("This race ended with a fatal crash: {0}")]
    Crash(String),
}

impl RaceError {
    /// Create a provisioning error for the given lifecycle stage
    pub fn provisioning(stage: &'static str, source: BoxError) -> Self {
        Self::Provisioning { stage, source }
    }

    /// Create a metrics store error for the given operation
    pub fn metrics_store(stage: &'static str, source: BoxError) -> Self {
        Self::MetricsStore { stage, source }
    }

    /// Create a protocol violation error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation(message.into())
    }

    /// Whether the race was rejected before it started
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type alias
pub type RaceResult<T> = std::result::Result<T, RaceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_round_failure_keeps_cause() {
        let cause: BoxError = "index not found".into();
        let err = RaceError::RoundFailure {
            message: "Benchmark failed".to_string(),
            cause,
        };

        assert_eq!(err.to_string(), "Benchmark failed");
        assert_eq!(err.source().unwrap().to_string(), "index not found");
    }

    #[test]
    fn test_provisioning_message_names_stage() {
        let err = RaceError::provisioning("start engine", "port in use".into());
        assert_eq!(err.to_string(), "provisioning failed during start engine");
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_is_transparent() {
        let err = RaceError::from(ConfigError::UnknownPipeline {
            name: "nope".to_string(),
        });
        assert!(err.is_configuration());
        assert!(err.to_string().starts_with("Unknown pipeline [nope]"));
    }
}
