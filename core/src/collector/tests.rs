//! Tests for the metrics sink and resource sampler

use super::*;
use crate::config::SamplingConfig;
use crate::error::BoxError;
use crate::metrics::MetricRecord;
use crate::traits::{Cluster, Server};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fakes
// ============================================================================

/// Probe with scripted CPU values and disk counters
struct FakeProbe {
    cpu: Vec<f32>,
    next_cpu: usize,
    disk: VecDeque<io::Result<DiskCounters>>,
    last_disk: DiskCounters,
    dropped: Arc<AtomicBool>,
}

impl FakeProbe {
    fn new(cpu: Vec<f32>, disk: Vec<DiskCounters>) -> Self {
        Self {
            cpu,
            next_cpu: 0,
            disk: disk.into_iter().map(Ok).collect(),
            last_disk: DiskCounters::default(),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    fn failing_end_counters(mut self) -> Self {
        self.disk.push_back(Err(io::Error::other("device gone")));
        self
    }

    fn dropped_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.dropped)
    }
}

impl ResourceProbe for FakeProbe {
    fn cpu_percent(&mut self) -> Option<f32> {
        if self.cpu.is_empty() {
            return None;
        }
        let value = self.cpu[self.next_cpu % self.cpu.len()];
        self.next_cpu += 1;
        Some(value)
    }

    fn disk_counters(&mut self) -> io::Result<DiskCounters> {
        match self.disk.pop_front() {
            Some(Ok(counters)) => {
                self.last_disk = counters;
                Ok(counters)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last_disk),
        }
    }
}

impl Drop for FakeProbe {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Hands out one prepared probe, then refuses
struct FakeInstrumentation {
    probe: parking_lot::Mutex<Option<FakeProbe>>,
    attached: parking_lot::Mutex<Vec<u32>>,
}

impl FakeInstrumentation {
    fn new(probe: FakeProbe) -> Arc<Self> {
        Arc::new(Self {
            probe: parking_lot::Mutex::new(Some(probe)),
            attached: parking_lot::Mutex::new(Vec::new()),
        })
    }

    fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            probe: parking_lot::Mutex::new(None),
            attached: parking_lot::Mutex::new(Vec::new()),
        })
    }
}

impl Instrumentation for FakeInstrumentation {
    fn attach(&self, pid: u32, _disk_device: Option<&str>) -> Option<Box<dyn ResourceProbe>> {
        self.attached.lock().push(pid);
        let probe = self.probe.lock().take()?;
        Some(Box::new(probe))
    }
}

struct FakeCluster {
    servers: Vec<Server>,
}

impl FakeCluster {
    fn with_pids(pids: &[u32]) -> Self {
        Self {
            servers: pids.iter().map(|&pid| Server { pid }).collect(),
        }
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn on_benchmark_start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_benchmark_stop(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn servers(&self) -> Vec<Server> {
        self.servers.clone()
    }
}

fn counters(write_bytes: u64, read_bytes: u64) -> DiskCounters {
    DiskCounters {
        write_bytes,
        write_count: write_bytes / 512,
        write_time: write_bytes / 1024,
        read_bytes,
        read_count: read_bytes / 512,
        read_time: read_bytes / 1024,
    }
}

fn open_sink(dir: &tempfile::TempDir) -> MetricsSink {
    let timestamp = Utc.with_ymd_and_hms(2026, 10, 16, 12, 30, 45).unwrap();
    MetricsSink::open(dir.path(), "geonames", timestamp).unwrap()
}

fn log_lines(sink: &MetricsSink) -> Vec<String> {
    std::fs::read_to_string(sink.log_path())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// ============================================================================
// MetricsSink
// ============================================================================

#[test]
fn test_open_creates_bucket_file() {
    let dir = tempfile::tempdir().unwrap();
    let sink = open_sink(&dir);

    assert_eq!(sink.bucket_name(), "geonames");
    assert_eq!(
        sink.log_path(),
        dir.path().join("geonames").join("2026-10-16-12-30-45.txt")
    );
    assert!(sink.log_path().exists());
    assert!(sink.is_open());
}

#[test]
fn test_open_fails_when_log_root_is_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();

    let err = MetricsSink::open(&blocker, "geonames", Utc::now()).unwrap_err();
    assert!(matches!(err, MetricsError::Io { .. }));
}

#[tokio::test]
async fn test_collect_appends_lines_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let sink = open_sink(&dir);

    sink.collect("a").unwrap();
    sink.collect("b").unwrap();
    sink.stop_collection().await.unwrap();

    assert_eq!(log_lines(&sink), vec!["a", "b"]);
    assert!(!sink.is_open());
}

#[test]
fn test_collected_lines_are_flushed_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let sink = open_sink(&dir);

    sink.collect("first").unwrap();
    assert_eq!(log_lines(&sink), vec!["first"]);
}

#[tokio::test]
async fn test_collect_record_writes_json_line() {
    let dir = tempfile::tempdir().unwrap();
    let sink = open_sink(&dir);

    let record = MetricRecord::new("service_time", 12.5, "ms")
        .with_operation("index-append")
        .with_round(1);
    sink.collect_record(&record).unwrap();
    sink.stop_collection().await.unwrap();

    let lines = log_lines(&sink);
    assert_eq!(lines.len(), 1);
    let parsed: MetricRecord = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(parsed.name, "service_time");
    assert_eq!(parsed.operation.as_deref(), Some("index-append"));
    assert_eq!(parsed.round, 1);
}

#[test]
fn test_concurrent_collect_keeps_lines_whole() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(open_sink(&dir));

    std::thread::scope(|scope| {
        for thread in 0..8 {
            let sink = Arc::clone(&sink);
            scope.spawn(move || {
                for i in 0..100 {
                    sink.collect(&format!("thread-{thread}-line-{i}")).unwrap();
                }
            });
        }
    });

    let lines = log_lines(&sink);
    assert_eq!(lines.len(), 800);

    let unique: HashSet<_> = lines.iter().collect();
    assert_eq!(unique.len(), 800);
    assert!(lines.iter().all(|line| line.starts_with("thread-")));
}

#[tokio::test]
async fn test_stop_twice_reports_closed() {
    let dir = tempfile::tempdir().unwrap();
    let sink = open_sink(&dir);

    sink.stop_collection().await.unwrap();
    let err = sink.stop_collection().await.unwrap_err();
    assert!(matches!(err, MetricsError::Closed { .. }));
}

#[tokio::test]
async fn test_collect_after_close_fails() {
    let dir = tempfile::tempdir().unwrap();
    let sink = open_sink(&dir);
    sink.stop_collection().await.unwrap();

    let err = sink.collect("late").unwrap_err();
    assert!(matches!(err, MetricsError::Closed { .. }));
    assert!(log_lines(&sink).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_collection_writes_resource_summary() {
    let dir = tempfile::tempdir().unwrap();
    let probe = FakeProbe::new(
        vec![30.0, 10.0, 20.0],
        vec![counters(1024, 4096), counters(9216, 6144)],
    );
    let instrumentation = FakeInstrumentation::new(probe);
    let sink = open_sink(&dir)
        .with_instrumentation(instrumentation.clone())
        .with_sampling(SamplingConfig::default().with_interval(Duration::from_secs(1)));

    sink.start_collection(&FakeCluster::with_pids(&[4242, 4243]));
    sink.collect("a").unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    sink.collect("b").unwrap();
    sink.stop_collection().await.unwrap();

    assert_eq!(*instrumentation.attached.lock(), vec![4242]);
    assert_eq!(
        log_lines(&sink),
        vec![
            "a",
            "b",
            "WRITES: 8192 bytes, 8 time, 16 count",
            "READS: 2048 bytes, 2 time, 4 count",
            "CPU median: 20",
            "  30",
            "  10",
            "  20",
        ]
    );
}

#[tokio::test]
async fn test_no_instrumentation_writes_no_summary() {
    let dir = tempfile::tempdir().unwrap();
    let sink = open_sink(&dir);

    sink.start_collection(&FakeCluster::with_pids(&[4242]));
    sink.collect("a").unwrap();
    sink.stop_collection().await.unwrap();

    assert_eq!(log_lines(&sink), vec!["a"]);
}

#[tokio::test]
async fn test_cluster_without_servers_writes_no_summary() {
    let dir = tempfile::tempdir().unwrap();
    let probe = FakeProbe::new(vec![50.0], vec![counters(0, 0)]);
    let instrumentation = FakeInstrumentation::new(probe);
    let sink = open_sink(&dir).with_instrumentation(instrumentation.clone());

    sink.start_collection(&FakeCluster::with_pids(&[]));
    sink.stop_collection().await.unwrap();

    assert!(instrumentation.attached.lock().is_empty());
    assert!(log_lines(&sink).is_empty());
}

#[tokio::test]
async fn test_unobservable_process_writes_no_summary() {
    let dir = tempfile::tempdir().unwrap();
    let sink = open_sink(&dir).with_instrumentation(FakeInstrumentation::unavailable());

    sink.start_collection(&FakeCluster::with_pids(&[4242]));
    sink.collect("a").unwrap();
    sink.stop_collection().await.unwrap();

    assert_eq!(log_lines(&sink), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_end_counters_skip_io_lines() {
    let dir = tempfile::tempdir().unwrap();
    let probe = FakeProbe::new(vec![40.0], vec![counters(0, 0)]).failing_end_counters();
    let sink = open_sink(&dir).with_instrumentation(FakeInstrumentation::new(probe));

    sink.start_collection(&FakeCluster::with_pids(&[7]));
    tokio::time::sleep(Duration::from_millis(2500)).await;
    sink.stop_collection().await.unwrap();

    assert_eq!(log_lines(&sink), vec!["CPU median: 40", "  40", "  40"]);
}

// ============================================================================
// ResourceSampler
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_sampler_diffs_counters_against_baseline() {
    let probe = FakeProbe::new(vec![12.0], vec![counters(1000, 500), counters(1512, 500)]);
    let sampler = ResourceSampler::start(Box::new(probe), Duration::from_millis(100)).unwrap();

    tokio::time::sleep(Duration::from_millis(1050)).await;
    let snapshot = sampler.finish().await.unwrap();

    let disk = snapshot.disk.unwrap();
    assert_eq!(disk.write_bytes, 512);
    assert_eq!(disk.read_bytes, 0);

    // One sample per elapsed interval, give or take the boundary tick
    let samples = snapshot.cpu_samples.len();
    assert!((9..=11).contains(&samples), "got {samples} samples");
    assert!(snapshot.cpu_samples.iter().all(|&cpu| cpu == 12.0));
}

#[tokio::test(start_paused = true)]
async fn test_sampler_finished_before_first_tick_has_no_samples() {
    let probe = FakeProbe::new(vec![12.0], vec![counters(0, 0)]);
    let sampler = ResourceSampler::start(Box::new(probe), Duration::from_secs(1)).unwrap();

    let snapshot = sampler.finish().await.unwrap();
    assert!(snapshot.cpu_samples.is_empty());
    assert_eq!(snapshot.disk, Some(DiskCounters::default()));
}

#[tokio::test]
async fn test_sampler_start_fails_without_baseline() {
    let probe = FakeProbe::new(vec![], vec![]).failing_end_counters();
    let result = ResourceSampler::start(Box::new(probe), Duration::from_secs(1));
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_sampler_stops_its_task() {
    let probe = FakeProbe::new(vec![12.0], vec![counters(0, 0)]);
    let dropped = probe.dropped_flag();
    let sampler = ResourceSampler::start(Box::new(probe), Duration::from_secs(1)).unwrap();

    drop(sampler);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(dropped.load(Ordering::SeqCst));
}

/// Blocks in `cpu_percent` until the test hands it a value
struct GatedCpu {
    gate: std::sync::mpsc::Receiver<f32>,
    timed_out: Arc<AtomicBool>,
}

impl ResourceProbe for GatedCpu {
    fn cpu_percent(&mut self) -> Option<f32> {
        match self.gate.recv_timeout(Duration::from_secs(5)) {
            Ok(value) => Some(value),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                self.timed_out.store(true, Ordering::SeqCst);
                None
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => None,
        }
    }

    fn disk_counters(&mut self) -> io::Result<DiskCounters> {
        Ok(DiskCounters::default())
    }
}

#[tokio::test]
async fn test_blocking_cpu_read_does_not_stall_runtime() {
    // Single-threaded runtime: a CPU read on the worker would block this task
    let (tx, gate) = std::sync::mpsc::channel();
    let timed_out = Arc::new(AtomicBool::new(false));
    let gated = GatedCpu {
        gate,
        timed_out: Arc::clone(&timed_out),
    };
    let sampler = ResourceSampler::start(Box::new(gated), Duration::from_millis(10)).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(55.0).unwrap();
    drop(tx);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = sampler.finish().await.unwrap();
    assert!(!timed_out.load(Ordering::SeqCst));
    assert_eq!(snapshot.cpu_samples, vec![55.0]);
    assert_eq!(snapshot.disk, Some(DiskCounters::default()));
}

struct PanickingCpu;

impl ResourceProbe for PanickingCpu {
    fn cpu_percent(&mut self) -> Option<f32> {
        panic!("procfs read failed");
    }

    fn disk_counters(&mut self) -> io::Result<DiskCounters> {
        Ok(DiskCounters::default())
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_cpu_read_stops_sampling_without_disk_delta() {
    let sampler = ResourceSampler::start(Box::new(PanickingCpu), Duration::from_secs(1)).unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let snapshot = sampler.finish().await.unwrap();

    assert!(snapshot.cpu_samples.is_empty());
    assert_eq!(snapshot.disk, None);
}
