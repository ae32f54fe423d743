//! Named race pipelines
//!
//! A pipeline is a named entry point that provisions a cluster in some way
//! and then runs the race orchestrator against it. Pipelines live in an
//! explicit [`PipelineRegistry`]; [`run`] resolves the configured pipeline
//! and runs it.
//!
//! # Example
//!
//! ```ignore
//! use race_control_core::{pipeline, PipelineRegistry, RaceConfig, RaceContext};
//!
//! let registry = PipelineRegistry::with_builtin();
//! let ctx = Arc::new(RaceContext::new(loader, mechanics, stores, reporter, drivers));
//! let config = RaceConfig::new("geonames", "append-no-conflicts", "defaults", root)
//!     .with_pipeline("benchmark-only");
//!
//! let summary = pipeline::run(&registry, config, ctx).await?;
//! ```

mod builtin;
mod registry;

use std::any::Any;
use std::sync::Arc;

pub use builtin::{RaceContext, EXTERNAL_CAR};
pub use registry::{render_pipeline_table, Pipeline, PipelineRegistry, PipelineTarget};

use crate::config::RaceConfig;
use crate::error::{RaceError, RaceResult};
use crate::orchestrator::RaceSummary;

/// Resolve `config.pipeline` and run it
///
/// The pipeline runs on its own task, so a panic inside it is reported as
/// [`RaceError::Crash`] instead of unwinding into the caller.
///
/// # Errors
///
/// Fails with a configuration error for an unknown pipeline; otherwise
/// returns whatever the pipeline returns.
pub async fn run(
    registry: &PipelineRegistry,
    config: RaceConfig,
    ctx: Arc<RaceContext>,
) -> RaceResult<RaceSummary> {
    let pipeline = registry.resolve(&config.pipeline)?;
    tracing::info!(pipeline = %pipeline.name, "Running pipeline");

    let race = (pipeline.target)(config, ctx);
    match tokio::spawn(race).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            let reason = panic_message(e.into_panic());
            tracing::error!(reason = %reason, "Race crashed");
            Err(RaceError::Crash(reason))
        }
        Err(e) => Err(RaceError::Crash(e.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
