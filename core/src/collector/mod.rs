//! Metrics collection for a running race
//!
//! A [`MetricsSink`] owns the race's metrics log file. Any number of tasks or
//! threads may [`collect`](MetricsSink::collect) lines into it; writes are
//! serialized by the sink's lock and flushed immediately.
//!
//! While the cluster is running the sink can also drive a
//! [`ResourceSampler`]: a background task that samples the CPU usage of the
//! first server process once per interval and diffs the machine's disk I/O
//! counters between start and finish. When collection stops the sampler's
//! results are appended to the log as summary lines.
//!
//! Resource instrumentation is optional. Without an [`Instrumentation`] (or
//! when it cannot attach to the process) collection simply yields no
//! resource lines.

mod probe;
mod sampler;
mod sink;

pub use probe::{DiskCounters, Instrumentation, ResourceProbe, SystemInstrumentation};
pub use sampler::{ResourceSampler, SamplerSnapshot};
pub use sink::MetricsSink;

use std::path::PathBuf;

/// Metrics collection errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The metrics log could not be created or written
    #[error("could not write metrics log [{}]", path.display())]
    Io {
        /// Log file or directory involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The metrics log was already closed
    #[error("metrics log [{}] is already closed", path.display())]
    Closed {
        /// Log file path
        path: PathBuf,
    },

    /// The sampler task did not finish cleanly
    #[error("resource sampler failed: {0}")]
    Sampler(String),

    /// A record could not be serialized
    #[error("could not encode metric record")]
    Encode(#[from] serde_json::Error),
}

impl MetricsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests;
