//! Builder pattern for RaceOrchestrator construction

use std::sync::Arc;

use crate::archive::ZipArchiver;
use crate::config::{ConfigError, RaceConfig};
use crate::driver::DriverFactory;
use crate::error::RaceResult;
use crate::traits::{Archiver, MetricsStore, Reporter, TrackLoader};

use super::executor::RaceOrchestrator;

/// Builder for a [`RaceOrchestrator`]
///
/// The archiver defaults to [`ZipArchiver`]; every other collaborator is
/// required.
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new(config)
///     .track_loader(loader)
///     .metrics_store(store)
///     .reporter(reporter)
///     .drivers(drivers)
///     .build()?;
///
/// let summary = orchestrator.run_race(mechanic.as_ref(), sink).await?;
/// ```
pub struct OrchestratorBuilder {
    config: RaceConfig,
    track_loader: Option<Arc<dyn TrackLoader>>,
    metrics_store: Option<Arc<dyn MetricsStore>>,
    reporter: Option<Arc<dyn Reporter>>,
    archiver: Arc<dyn Archiver>,
    drivers: Option<Arc<dyn DriverFactory>>,
}

impl OrchestratorBuilder {
    /// Create a builder for the given race
    pub fn new(config: RaceConfig) -> Self {
        Self {
            config,
            track_loader: None,
            metrics_store: None,
            reporter: None,
            archiver: Arc::new(ZipArchiver),
            drivers: None,
        }
    }

    /// Set the number of rounds
    pub fn rounds(mut self, rounds: usize) -> Self {
        self.config.rounds = rounds;
        self
    }

    /// Set the track loader
    pub fn track_loader(mut self, loader: Arc<dyn TrackLoader>) -> Self {
        self.track_loader = Some(loader);
        self
    }

    /// Set the metrics store
    pub fn metrics_store(mut self, store: Arc<dyn MetricsStore>) -> Self {
        self.metrics_store = Some(store);
        self
    }

    /// Set the reporter
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Replace the log archiver
    pub fn archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Set the factory creating each round's driver
    pub fn drivers(mut self, drivers: Arc<dyn DriverFactory>) -> Self {
        self.drivers = Some(drivers);
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required collaborator is missing
    /// or the race configuration is invalid.
    pub fn build(self) -> RaceResult<RaceOrchestrator> {
        let track_loader = self
            .track_loader
            .ok_or(ConfigError::MissingCollaborator("track loader"))?;

        let metrics_store = self
            .metrics_store
            .ok_or(ConfigError::MissingCollaborator("metrics store"))?;

        let reporter = self
            .reporter
            .ok_or(ConfigError::MissingCollaborator("reporter"))?;

        let drivers = self
            .drivers
            .ok_or(ConfigError::MissingCollaborator("driver factory"))?;

        self.config.validate()?;

        Ok(RaceOrchestrator {
            config: self.config,
            track_loader,
            metrics_store,
            reporter,
            archiver: self.archiver,
            drivers,
        })
    }
}
