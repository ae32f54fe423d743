//! Collaborator traits consumed by the race orchestrator
//!
//! The core never loads tracks, provisions clusters, persists metrics or
//! renders reports itself. It drives these collaborators through the traits
//! below; implementations live with the surrounding harness.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RaceConfig;
use crate::error::BoxError;
use crate::metrics::{MetaInfo, MetricRecord, Track};

// ============================================================================
// Workload
// ============================================================================

/// Loads the track described by the race configuration
#[async_trait]
pub trait TrackLoader: Send + Sync {
    /// Load the track; fails on a malformed or missing workload
    async fn load(&self, config: &RaceConfig) -> Result<Track, BoxError>;
}

// ============================================================================
// Provisioning
// ============================================================================

/// How a mechanic obtains the benchmark candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    /// Build from sources, then provision
    Sources {
        /// Whether to run the build step
        build: bool,
    },
    /// Download and provision a released distribution
    Distribution,
    /// Use an already running cluster
    External,
    /// Run the official container image
    Docker,
}

/// Creates a mechanic for the requested provisioning mode
pub trait MechanicFactory: Send + Sync {
    /// Create a mechanic; the metrics store receives provisioning telemetry
    fn create(
        &self,
        config: &RaceConfig,
        metrics_store: Arc<dyn MetricsStore>,
        provisioning: Provisioning,
    ) -> Result<Box<dyn Mechanic>, BoxError>;
}

/// Prepares, starts and stops the benchmark candidate
///
/// Retry policy, if any, belongs to implementations of this trait.
#[async_trait]
pub trait Mechanic: Send + Sync {
    /// Prepare the candidate (build, download, install)
    async fn prepare_candidate(&self) -> Result<(), BoxError>;

    /// Start the cluster and hand out its handle
    async fn start_engine(&self) -> Result<Box<dyn Cluster>, BoxError>;

    /// Stop the cluster; consumes the handle
    async fn stop_engine(&self, cluster: Box<dyn Cluster>) -> Result<(), BoxError>;
}

/// A process of the running cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Server {
    /// Operating system process id
    pub pid: u32,
}

/// Handle to a running cluster
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Called right before each round starts
    async fn on_benchmark_start(&self) -> Result<(), BoxError>;

    /// Called after a round completed successfully
    async fn on_benchmark_stop(&self) -> Result<(), BoxError>;

    /// Server processes of the cluster, in node order
    fn servers(&self) -> Vec<Server>;
}

// ============================================================================
// Metrics persistence
// ============================================================================

/// Opens the metrics store for a race
pub trait MetricsStoreFactory: Send + Sync {
    /// Open a writable store for the race
    fn open(&self, config: &RaceConfig) -> Result<Arc<dyn MetricsStore>, BoxError>;
}

/// Persistent metrics store
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Record the track descriptor of the race
    async fn store_race(&self, track: &Track) -> Result<(), BoxError>;

    /// Persist the records of one round
    async fn bulk_add(&self, records: Vec<MetricRecord>) -> Result<(), BoxError>;

    /// Metadata attached to every record of this race
    fn meta_info(&self) -> MetaInfo;

    /// Flush and close the store
    async fn close(&self) -> Result<(), BoxError>;
}

// ============================================================================
// Reporting and archival
// ============================================================================

/// Summarizes the results of a finished race
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Summarize the race; invoked once after all rounds succeeded
    async fn summarize(&self, config: &RaceConfig, track: &Track) -> Result<(), BoxError>;
}

/// Filesystem operations used by the log sweep
///
/// Both operations block; callers run them off the async executor.
pub trait Archiver: Send + Sync {
    /// Compress `source` into the archive at `archive`
    fn compress(&self, source: &Path, archive: &Path) -> Result<(), BoxError>;

    /// Recursively delete `dir`
    fn remove_tree(&self, dir: &Path) -> Result<(), BoxError>;
}
