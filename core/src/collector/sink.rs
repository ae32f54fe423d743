//! Per-race metrics log

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::config::SamplingConfig;
use crate::metrics::{median, MetricRecord};
use crate::traits::Cluster;

use super::probe::Instrumentation;
use super::sampler::{ResourceSampler, SamplerSnapshot};
use super::MetricsError;

/// Append-only metrics log of one bucket
///
/// The log file is opened once in [`open`](Self::open) and closed once in
/// [`stop_collection`](Self::stop_collection).
pub struct MetricsSink {
    bucket_name: String,
    log_path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    sampler: Mutex<Option<ResourceSampler>>,
    instrumentation: Option<Arc<dyn Instrumentation>>,
    sampling: SamplingConfig,
}

impl MetricsSink {
    /// Open the log `<log_root>/<bucket_name>/<timestamp>.txt`
    ///
    /// # Errors
    ///
    /// Fails if the bucket directory cannot be created or the file cannot be
    /// opened.
    pub fn open(
        log_root: &Path,
        bucket_name: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, MetricsError> {
        let bucket_dir = log_root.join(bucket_name);
        fs::create_dir_all(&bucket_dir).map_err(|e| MetricsError::io(&bucket_dir, e))?;

        let log_path = bucket_dir.join(format!("{}.txt", timestamp.format("%Y-%m-%d-%H-%M-%S")));
        let file = File::create(&log_path).map_err(|e| MetricsError::io(&log_path, e))?;

        tracing::debug!(bucket = bucket_name, path = %log_path.display(), "Opened metrics log");

        Ok(Self {
            bucket_name: bucket_name.to_string(),
            log_path,
            writer: Mutex::new(Some(BufWriter::new(file))),
            sampler: Mutex::new(None),
            instrumentation: None,
            sampling: SamplingConfig::default(),
        })
    }

    /// Enable resource sampling through the given instrumentation
    pub fn with_instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.instrumentation = Some(instrumentation);
        self
    }

    /// Set the sampling interval and disk device
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Bucket name
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Path of the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Whether the log file is still open
    pub fn is_open(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Append one line and flush it
    ///
    /// Safe to call concurrently; each line is written whole.
    pub fn collect(&self, line: &str) -> Result<(), MetricsError> {
        let mut guard = self.writer.lock();
        let Some(writer) = guard.as_mut() else {
            return Err(MetricsError::Closed {
                path: self.log_path.clone(),
            });
        };

        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush())
            .map_err(|e| MetricsError::io(&self.log_path, e))
    }

    /// Append a metric record as one JSON line
    pub fn collect_record(&self, record: &MetricRecord) -> Result<(), MetricsError> {
        let line = serde_json::to_string(record)?;
        self.collect(&line)
    }

    /// Start sampling the first server process of the cluster
    ///
    /// Does nothing if no instrumentation is configured, the cluster reports
    /// no servers, or the process cannot be observed. Must be called from
    /// within a tokio runtime.
    pub fn start_collection(&self, cluster: &dyn Cluster) {
        let Some(instrumentation) = &self.instrumentation else {
            tracing::debug!("No resource instrumentation; skipping resource stats");
            return;
        };

        let Some(server) = cluster.servers().first().copied() else {
            tracing::warn!("Cluster reports no servers; skipping resource stats");
            return;
        };

        let mut active = self.sampler.lock();
        if active.is_some() {
            tracing::warn!("Resource collection already running");
            return;
        }

        let Some(probe) = instrumentation.attach(server.pid, self.sampling.disk_device.as_deref())
        else {
            return;
        };

        match ResourceSampler::start(probe, self.sampling.interval) {
            Ok(sampler) => {
                tracing::debug!(pid = server.pid, "Collecting resource stats");
                *active = Some(sampler);
            }
            Err(e) => {
                tracing::warn!(pid = server.pid, error = %e, "Could not start resource sampler");
            }
        }
    }

    /// Stop sampling, write the resource summary and close the log
    ///
    /// Summary lines follow everything collected so far:
    /// write totals, read totals, CPU median, then every CPU sample in
    /// collection order.
    ///
    /// # Errors
    ///
    /// Fails with [`MetricsError::Closed`] if the log was already closed. The
    /// log is closed even if writing the summary fails.
    pub async fn stop_collection(&self) -> Result<(), MetricsError> {
        let sampler = self.sampler.lock().take();

        let summarized = match sampler {
            Some(sampler) => match sampler.finish().await {
                Ok(snapshot) => self.write_summary(&snapshot),
                Err(e) => {
                    tracing::warn!(error = %e, "Resource sampler failed; no resource stats recorded");
                    Ok(())
                }
            },
            None => Ok(()),
        };

        let closed = self.close();
        summarized.and(closed)
    }

    fn write_summary(&self, snapshot: &SamplerSnapshot) -> Result<(), MetricsError> {
        if let Some(disk) = &snapshot.disk {
            self.collect(&format!(
                "WRITES: {} bytes, {} time, {} count",
                disk.write_bytes, disk.write_time, disk.write_count
            ))?;
            self.collect(&format!(
                "READS: {} bytes, {} time, {} count",
                disk.read_bytes, disk.read_time, disk.read_count
            ))?;
        }

        if let Some(cpu_median) = median(&snapshot.cpu_samples) {
            self.collect(&format!("CPU median: {cpu_median}"))?;
            for percent in &snapshot.cpu_samples {
                self.collect(&format!("  {percent}"))?;
            }
        }

        Ok(())
    }

    fn close(&self) -> Result<(), MetricsError> {
        let writer = self.writer.lock().take();
        let Some(mut writer) = writer else {
            return Err(MetricsError::Closed {
                path: self.log_path.clone(),
            });
        };

        writer
            .flush()
            .map_err(|e| MetricsError::io(&self.log_path, e))?;
        tracing::debug!(path = %self.log_path.display(), "Closed metrics log");
        Ok(())
    }
}

impl std::fmt::Debug for MetricsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsSink")
            .field("bucket_name", &self.bucket_name)
            .field("log_path", &self.log_path)
            .field("open", &self.is_open())
            .field("instrumented", &self.instrumentation.is_some())
            .finish()
    }
}
