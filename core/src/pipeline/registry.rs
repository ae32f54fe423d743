//! Named pipeline registry

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;

use crate::config::{ConfigError, RaceConfig};
use crate::error::RaceResult;
use crate::orchestrator::RaceSummary;

use super::builtin::{self, RaceContext};

/// Entry point of a pipeline
pub type PipelineTarget =
    Arc<dyn Fn(RaceConfig, Arc<RaceContext>) -> BoxFuture<'static, RaceResult<RaceSummary>> + Send + Sync>;

/// A named race entry point
#[derive(Clone)]
pub struct Pipeline {
    /// Unique name
    pub name: String,
    /// One-line description shown when listing pipelines
    pub description: String,
    /// Entry point
    pub target: PipelineTarget,
    /// Whether the pipeline is listed to users
    pub stable: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("stable", &self.stable)
            .finish_non_exhaustive()
    }
}

/// Name to pipeline table
///
/// Populated once before any race runs. Registering an existing name
/// replaces its entry in place.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: IndexMap<String, Pipeline>,
}

impl PipelineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in pipelines
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register a pipeline, replacing any entry with the same name
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        target: F,
        stable: bool,
    ) -> &mut Self
    where
        F: Fn(RaceConfig, Arc<RaceContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RaceResult<RaceSummary>> + Send + 'static,
    {
        let name = name.into();
        let target: PipelineTarget =
            Arc::new(move |config: RaceConfig, ctx: Arc<RaceContext>| target(config, ctx).boxed());
        let pipeline = Pipeline {
            name: name.clone(),
            description: description.into(),
            target,
            stable,
        };

        if self.pipelines.insert(name.clone(), pipeline).is_some() {
            tracing::debug!(pipeline = %name, "Replaced registered pipeline");
        }
        self
    }

    /// Look up a pipeline by name
    pub fn resolve(&self, name: &str) -> Result<&Pipeline, ConfigError> {
        self.pipelines
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPipeline {
                name: name.to_string(),
            })
    }

    /// `(name, description)` of every stable pipeline, in registration order
    pub fn list_stable(&self) -> Vec<(&str, &str)> {
        self.pipelines
            .values()
            .filter(|p| p.stable)
            .map(|p| (p.name.as_str(), p.description.as_str()))
            .collect()
    }

    /// Number of registered pipelines
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Whether no pipeline is registered
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

/// Render the stable pipelines as a two-column table
pub fn render_pipeline_table(registry: &PipelineRegistry) -> String {
    let pipelines = registry.list_stable();
    let width = pipelines
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0)
        .max("Name".len());

    let mut out = String::from("Available pipelines:\n\n");
    let _ = writeln!(out, "{:<width$}  Description", "Name");
    let _ = writeln!(out, "{}  {}", "-".repeat(width), "-".repeat("Description".len()));
    for (name, description) in pipelines {
        let _ = writeln!(out, "{name:<width$}  {description}");
    }
    out
}
