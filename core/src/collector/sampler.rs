//! Background resource sampling

use std::io;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::probe::{DiskCounters, ResourceProbe};
use super::MetricsError;

/// Result of a finished sampling period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplerSnapshot {
    /// CPU samples in collection order
    pub cpu_samples: Vec<f32>,
    /// Disk counter increase over the period; `None` if the end counters
    /// could not be read
    pub disk: Option<DiskCounters>,
}

/// Samples a process's CPU usage on a background task
///
/// Baseline disk counters are read once in [`start`](Self::start). The
/// sampling task ticks every `interval` until [`finish`](Self::finish)
/// cancels it. Each tick reads CPU usage on the blocking pool. Dropping an
/// unfinished sampler also stops the task.
pub struct ResourceSampler {
    baseline: DiskCounters,
    cancel: CancellationToken,
    _stop_on_drop: DropGuard,
    handle: JoinHandle<(Option<Box<dyn ResourceProbe>>, Vec<f32>)>,
}

impl ResourceSampler {
    /// Capture the baseline and start sampling
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if the baseline disk counters cannot be read.
    pub fn start(mut probe: Box<dyn ResourceProbe>, interval: Duration) -> io::Result<Self> {
        let baseline = probe.disk_counters()?;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sample_loop(probe, interval, cancel.clone()));

        tracing::debug!(interval_ms = interval.as_millis() as u64, "Resource sampler started");

        Ok(Self {
            baseline,
            _stop_on_drop: cancel.clone().drop_guard(),
            cancel,
            handle,
        })
    }

    /// Stop sampling and diff the disk counters against the baseline
    ///
    /// Waits for the sampling task to exit, so no sample is recorded after
    /// this returns. Consumes the sampler.
    pub async fn finish(self) -> Result<SamplerSnapshot, MetricsError> {
        self.cancel.cancel();
        let (probe, cpu_samples) = self
            .handle
            .await
            .map_err(|e| MetricsError::Sampler(e.to_string()))?;

        let disk = match probe.map(|mut probe| probe.disk_counters()) {
            Some(Ok(end)) => Some(end.delta_since(&self.baseline)),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Could not read disk counters at end of collection");
                None
            }
            None => {
                tracing::warn!("Sampling ended abnormally; no disk counters at end of collection");
                None
            }
        };

        tracing::debug!(samples = cpu_samples.len(), "Resource sampler finished");

        Ok(SamplerSnapshot { cpu_samples, disk })
    }
}

impl std::fmt::Debug for ResourceSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSampler")
            .field("baseline", &self.baseline)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Tick until cancelled
///
/// Hands back the samples, and the reader unless a CPU read panicked.
async fn sample_loop(
    mut probe: Box<dyn ResourceProbe>,
    interval: Duration,
    cancel: CancellationToken,
) -> (Option<Box<dyn ResourceProbe>>, Vec<f32>) {
    let mut samples = Vec::new();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = tokio::time::sleep(interval) => {
                // Process refreshes read /proc and block
                let tick = tokio::task::spawn_blocking(move || {
                    let sample = probe.cpu_percent();
                    (probe, sample)
                });

                let sample = match tick.await {
                    Ok((returned, sample)) => {
                        probe = returned;
                        sample
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "CPU read panicked; sampling stopped");
                        return (None, samples);
                    }
                };

                match sample {
                    Some(percent) => {
                        tracing::trace!(cpu = percent, "CPU sample");
                        samples.push(percent);
                    }
                    None => tracing::debug!("Sampled process is gone; skipping tick"),
                }
            }
        }
    }

    (Some(probe), samples)
}
