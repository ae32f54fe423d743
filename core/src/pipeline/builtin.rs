//! Built-in pipelines

use std::sync::Arc;

use crate::archive::ZipArchiver;
use crate::collector::{Instrumentation, MetricsSink, SystemInstrumentation};
use crate::config::RaceConfig;
use crate::driver::DriverFactory;
use crate::error::{RaceError, RaceResult};
use crate::orchestrator::{OrchestratorBuilder, RaceSummary};
use crate::traits::{
    Archiver, Mechanic, MechanicFactory, MetricsStore, MetricsStoreFactory, Provisioning,
    Reporter, TrackLoader,
};

use super::registry::PipelineRegistry;

/// Car name forced by the `benchmark-only` pipeline
pub const EXTERNAL_CAR: &str = "external";

/// Collaborators shared by the built-in pipelines
pub struct RaceContext {
    /// Loads the track
    pub track_loader: Arc<dyn TrackLoader>,
    /// Creates the mechanic for a provisioning mode
    pub mechanics: Arc<dyn MechanicFactory>,
    /// Opens the race's metrics store
    pub metrics_stores: Arc<dyn MetricsStoreFactory>,
    /// Summarizes finished races
    pub reporter: Arc<dyn Reporter>,
    /// Archives the logs after a successful race
    pub archiver: Arc<dyn Archiver>,
    /// Creates each round's driver
    pub drivers: Arc<dyn DriverFactory>,
    /// Resource instrumentation; no resource stats without it
    pub instrumentation: Option<Arc<dyn Instrumentation>>,
}

impl RaceContext {
    /// Create a context archiving with zip and sampling with [`SystemInstrumentation`]
    pub fn new(
        track_loader: Arc<dyn TrackLoader>,
        mechanics: Arc<dyn MechanicFactory>,
        metrics_stores: Arc<dyn MetricsStoreFactory>,
        reporter: Arc<dyn Reporter>,
        drivers: Arc<dyn DriverFactory>,
    ) -> Self {
        Self {
            track_loader,
            mechanics,
            metrics_stores,
            reporter,
            archiver: Arc::new(ZipArchiver),
            drivers,
            instrumentation: Some(Arc::new(SystemInstrumentation)),
        }
    }

    /// Replace the log archiver
    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Replace or disable the resource instrumentation
    pub fn with_instrumentation(mut self, instrumentation: Option<Arc<dyn Instrumentation>>) -> Self {
        self.instrumentation = instrumentation;
        self
    }
}

impl std::fmt::Debug for RaceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceContext")
            .field("instrumented", &self.instrumentation.is_some())
            .finish_non_exhaustive()
    }
}

pub(super) fn register_all(registry: &mut PipelineRegistry) {
    registry
        .register(
            "from-sources-complete",
            "Builds and provisions the candidate from sources, then benchmarks it.",
            from_sources_complete,
            true,
        )
        .register(
            "from-sources-skip-build",
            "Provisions the candidate from previously built sources, then benchmarks it.",
            from_sources_skip_build,
            true,
        )
        .register(
            "from-distribution",
            "Downloads a distribution, provisions it, then benchmarks it.",
            from_distribution,
            true,
        )
        .register(
            "benchmark-only",
            "Assumes an already running cluster and only benchmarks it.",
            benchmark_only,
            true,
        )
        .register(
            "docker",
            "Runs the candidate in a container, then benchmarks it.",
            docker,
            false,
        );
}

async fn from_sources_complete(
    config: RaceConfig,
    ctx: Arc<RaceContext>,
) -> RaceResult<RaceSummary> {
    benchmark(config, ctx, Provisioning::Sources { build: true }).await
}

async fn from_sources_skip_build(
    config: RaceConfig,
    ctx: Arc<RaceContext>,
) -> RaceResult<RaceSummary> {
    benchmark(config, ctx, Provisioning::Sources { build: false }).await
}

async fn from_distribution(config: RaceConfig, ctx: Arc<RaceContext>) -> RaceResult<RaceSummary> {
    benchmark(config, ctx, Provisioning::Distribution).await
}

async fn benchmark_only(config: RaceConfig, ctx: Arc<RaceContext>) -> RaceResult<RaceSummary> {
    // The cluster is not ours, so its car is unknown
    let config = config.with_car(EXTERNAL_CAR);
    benchmark(config, ctx, Provisioning::External).await
}

async fn docker(config: RaceConfig, ctx: Arc<RaceContext>) -> RaceResult<RaceSummary> {
    benchmark(config, ctx, Provisioning::Docker).await
}

/// Open the metrics store and sink, create the mechanic and run the race
///
/// The configuration is validated before any collaborator is touched.
async fn benchmark(
    config: RaceConfig,
    ctx: Arc<RaceContext>,
    provisioning: Provisioning,
) -> RaceResult<RaceSummary> {
    config.validate()?;
    tracing::debug!(?provisioning, car = %config.car, "Preparing race");

    let metrics_store = ctx
        .metrics_stores
        .open(&config)
        .map_err(|e| RaceError::metrics_store("open", e))?;

    match prepare(&config, &ctx, &metrics_store, provisioning) {
        Ok((mechanic, sink)) => {
            let orchestrator = OrchestratorBuilder::new(config)
                .track_loader(Arc::clone(&ctx.track_loader))
                .metrics_store(metrics_store)
                .reporter(Arc::clone(&ctx.reporter))
                .archiver(Arc::clone(&ctx.archiver))
                .drivers(Arc::clone(&ctx.drivers))
                .build()?;

            orchestrator.run_race(mechanic.as_ref(), sink).await
        }
        Err(e) => {
            if let Err(close) = metrics_store.close().await {
                tracing::error!(error = %close, "Could not close metrics store");
            }
            Err(e)
        }
    }
}

fn prepare(
    config: &RaceConfig,
    ctx: &RaceContext,
    metrics_store: &Arc<dyn MetricsStore>,
    provisioning: Provisioning,
) -> RaceResult<(Box<dyn Mechanic>, MetricsSink)> {
    let mechanic = ctx
        .mechanics
        .create(config, Arc::clone(metrics_store), provisioning)
        .map_err(|e| RaceError::provisioning("create mechanic", e))?;

    let mut sink = MetricsSink::open(config.log_root(), &config.track, config.start_time)?
        .with_sampling(config.sampling.clone());
    if let Some(instrumentation) = &ctx.instrumentation {
        sink = sink.with_instrumentation(Arc::clone(instrumentation));
    }

    Ok((mechanic, sink))
}
