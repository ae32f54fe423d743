//! Messages exchanged with a round's driver

use std::fmt;

use crate::config::RaceConfig;
use crate::error::{BoxError, RaceError, RaceResult};
use crate::metrics::{MetaInfo, MetricRecord, Track};

/// Request that starts one round
#[derive(Debug, Clone)]
pub struct StartBenchmark {
    /// Race configuration
    pub config: RaceConfig,
    /// Track to run
    pub track: Track,
    /// Metadata to attach to every record
    pub meta_info: MetaInfo,
}

/// Every message of the round protocol
#[derive(Debug)]
pub enum DriverMessage {
    /// Start the round (orchestrator -> driver)
    StartBenchmark(StartBenchmark),

    /// The round ran to completion (driver -> orchestrator)
    BenchmarkComplete {
        /// All records gathered during the round, in order
        metrics: Vec<MetricRecord>,
    },

    /// The round could not complete (driver -> orchestrator)
    BenchmarkFailure {
        /// What went wrong
        message: String,
        /// Original error
        cause: BoxError,
    },
}

impl DriverMessage {
    /// Create a failure reply from any error
    pub fn failure(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::BenchmarkFailure {
            message: message.into(),
            cause: cause.into(),
        }
    }

    /// Short name of the message kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartBenchmark(_) => "StartBenchmark",
            Self::BenchmarkComplete { .. } => "BenchmarkComplete",
            Self::BenchmarkFailure { .. } => "BenchmarkFailure",
        }
    }

    /// Whether this is a legal terminal reply
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::StartBenchmark(_))
    }
}

impl fmt::Display for DriverMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartBenchmark(start) => write!(
                f,
                "StartBenchmark(track={}, challenge={})",
                start.track.name, start.config.challenge
            ),
            Self::BenchmarkComplete { metrics } => {
                write!(f, "BenchmarkComplete({} records)", metrics.len())
            }
            Self::BenchmarkFailure { message, .. } => write!(f, "BenchmarkFailure({message})"),
        }
    }
}

/// Terminal result of one round
#[derive(Debug)]
pub enum RoundResult {
    /// The round completed with these records
    Complete {
        /// Records gathered during the round
        metrics: Vec<MetricRecord>,
    },
    /// The round failed
    Failure {
        /// What went wrong
        message: String,
        /// Original error
        cause: BoxError,
    },
}

impl TryFrom<DriverMessage> for RoundResult {
    type Error = RaceError;

    fn try_from(reply: DriverMessage) -> Result<Self, Self::Error> {
        match reply {
            DriverMessage::BenchmarkComplete { metrics } => Ok(Self::Complete { metrics }),
            DriverMessage::BenchmarkFailure { message, cause } => {
                Ok(Self::Failure { message, cause })
            }
            other => Err(RaceError::protocol(format!(
                "Driver has returned no metrics but instead [{other}]. Terminating race without result."
            ))),
        }
    }
}

impl RoundResult {
    /// The round's records, or the round failure as a race error
    pub fn into_metrics(self) -> RaceResult<Vec<MetricRecord>> {
        match self {
            Self::Complete { metrics } => Ok(metrics),
            Self::Failure { message, cause } => Err(RaceError::RoundFailure { message, cause }),
        }
    }
}
