//! Race execution logic

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::collector::MetricsSink;
use crate::config::RaceConfig;
use crate::driver::{DriverFactory, RoundExecution, RoundResult, StartBenchmark};
use crate::error::{RaceError, RaceResult};
use crate::metrics::{MetricRecord, Track};
use crate::traits::{Archiver, Cluster, Mechanic, MetricsStore, Reporter, TrackLoader};

use super::lap::{format_hms, Lap, LapClock};
use super::sweep::sweep;

/// Outcome of a successful race
#[derive(Debug, Clone)]
pub struct RaceSummary {
    /// Track that was raced
    pub track: Track,
    /// Challenge that was raced
    pub challenge: String,
    /// Car that was raced
    pub car: String,
    /// Number of rounds that completed
    pub rounds_completed: usize,
    /// Timing of every completed round
    pub laps: Vec<Lap>,
    /// Wall-clock duration from the first round to the end of the sweep
    pub total_duration: Duration,
    /// Log archive written by the sweep
    pub archive: PathBuf,
}

/// Runs one race against a provisioned cluster
///
/// Sequences the cluster lifecycle around the rounds, closes the metrics sink
/// and store, then summarizes and archives on success.
pub struct RaceOrchestrator {
    pub(crate) config: RaceConfig,
    pub(crate) track_loader: Arc<dyn TrackLoader>,
    pub(crate) metrics_store: Arc<dyn MetricsStore>,
    pub(crate) reporter: Arc<dyn Reporter>,
    pub(crate) archiver: Arc<dyn Archiver>,
    pub(crate) drivers: Arc<dyn DriverFactory>,
}

impl RaceOrchestrator {
    /// Race configuration
    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Run the race
    ///
    /// The cluster is stopped whenever it was started, and the sink and the
    /// metrics store are closed on every path. Summarization and the log
    /// sweep only happen after every round succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first error of the race. Teardown errors that follow an
    /// earlier error are logged and dropped.
    pub async fn run_race(
        &self,
        mechanic: &dyn Mechanic,
        sink: MetricsSink,
    ) -> RaceResult<RaceSummary> {
        tracing::info!(
            "Racing on track [{}], challenge [{}] and car [{}]",
            self.config.track,
            self.config.challenge,
            self.config.car
        );

        let raced = self.race(mechanic, &sink).await;
        let closed = self.close_metrics(&sink).await;

        let (track, laps, clock) = match (raced, closed) {
            (Ok(raced), Ok(())) => raced,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), closed) => {
                if let Err(teardown) = closed {
                    tracing::error!(error = %teardown, "Could not close metrics after failed race");
                }
                return Err(e);
            }
        };

        self.reporter
            .summarize(&self.config, &track)
            .await
            .map_err(RaceError::Report)?;

        let archive = self.config.archive_path();
        sweep(
            Arc::clone(&self.archiver),
            self.config.log_root.clone(),
            archive.clone(),
        )
        .await?;

        Ok(RaceSummary {
            track,
            challenge: self.config.challenge.clone(),
            car: self.config.car.clone(),
            rounds_completed: laps.len(),
            laps,
            total_duration: clock.elapsed(),
            archive,
        })
    }

    async fn race(
        &self,
        mechanic: &dyn Mechanic,
        sink: &MetricsSink,
    ) -> RaceResult<(Track, Vec<Lap>, LapClock)> {
        let track = self
            .track_loader
            .load(&self.config)
            .await
            .map_err(|source| RaceError::TrackLoad {
                track: self.config.track.clone(),
                source,
            })?;

        self.metrics_store
            .store_race(&track)
            .await
            .map_err(|e| RaceError::metrics_store("store race", e))?;

        mechanic
            .prepare_candidate()
            .await
            .map_err(|e| RaceError::provisioning("prepare candidate", e))?;

        let cluster = mechanic
            .start_engine()
            .await
            .map_err(|e| RaceError::provisioning("start engine", e))?;

        sink.start_collection(cluster.as_ref());

        let rounds = self.run_rounds(cluster.as_ref(), &track, sink).await;
        let stopped = mechanic
            .stop_engine(cluster)
            .await
            .map_err(|e| RaceError::provisioning("stop engine", e));

        match (rounds, stopped) {
            (Ok((laps, clock)), Ok(())) => Ok((track, laps, clock)),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), stopped) => {
                if let Err(teardown) = stopped {
                    tracing::error!(error = %teardown, "Could not stop engine after failed race");
                }
                Err(e)
            }
        }
    }

    async fn run_rounds(
        &self,
        cluster: &dyn Cluster,
        track: &Track,
        sink: &MetricsSink,
    ) -> RaceResult<(Vec<Lap>, LapClock)> {
        let rounds = self.config.rounds;
        let meta_info = self.metrics_store.meta_info();
        let mut laps = Vec::with_capacity(rounds);
        let mut clock = LapClock::start(rounds);

        for round in 0..rounds {
            if rounds > 1 {
                tracing::info!("Round [{}/{}]", round + 1, rounds);
            }

            cluster
                .on_benchmark_start()
                .await
                .map_err(|e| RaceError::provisioning("benchmark start", e))?;

            let mut execution = RoundExecution::new(round, self.drivers.create());
            let reply = execution
                .start(StartBenchmark {
                    config: self.config.clone(),
                    track: track.clone(),
                    meta_info: meta_info.clone(),
                })
                .await?;
            let metrics = RoundResult::try_from(reply)?.into_metrics()?;

            cluster
                .on_benchmark_stop()
                .await
                .map_err(|e| RaceError::provisioning("benchmark stop", e))?;

            self.record_metrics(round, metrics, sink).await?;

            let lap = clock.lap();
            if rounds > 1 {
                match lap.eta {
                    Some(eta) => tracing::info!(
                        "Lap time {} (ETA: {})",
                        format_hms(lap.lap_time),
                        format_hms(eta)
                    ),
                    None => tracing::info!("Lap time {}", format_hms(lap.lap_time)),
                }
            }
            laps.push(lap);
        }

        Ok((laps, clock))
    }

    async fn record_metrics(
        &self,
        round: usize,
        metrics: Vec<MetricRecord>,
        sink: &MetricsSink,
    ) -> RaceResult<()> {
        let metrics: Vec<MetricRecord> = metrics
            .into_iter()
            .map(|record| record.with_round(round))
            .collect();

        for record in &metrics {
            sink.collect_record(record)?;
        }

        tracing::debug!(round, records = metrics.len(), "Storing round metrics");
        self.metrics_store
            .bulk_add(metrics)
            .await
            .map_err(|e| RaceError::metrics_store("bulk add", e))
    }

    async fn close_metrics(&self, sink: &MetricsSink) -> RaceResult<()> {
        let sink_closed = sink.stop_collection().await.map_err(RaceError::from);
        let store_closed = self
            .metrics_store
            .close()
            .await
            .map_err(|e| RaceError::metrics_store("close", e));

        match (sink_closed, store_closed) {
            (Err(e), Err(masked)) => {
                tracing::error!(error = %masked, "Could not close metrics store");
                Err(e)
            }
            (sink_closed, store_closed) => sink_closed.and(store_closed),
        }
    }
}

impl std::fmt::Debug for RaceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
