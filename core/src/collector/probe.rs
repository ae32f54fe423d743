//! OS-level resource probes

use std::io;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Cumulative disk I/O counters
///
/// Times are in milliseconds spent on I/O, as reported by the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCounters {
    /// Bytes written
    pub write_bytes: u64,
    /// Completed writes
    pub write_count: u64,
    /// Time spent writing (ms)
    pub write_time: u64,
    /// Bytes read
    pub read_bytes: u64,
    /// Completed reads
    pub read_count: u64,
    /// Time spent reading (ms)
    pub read_time: u64,
}

impl DiskCounters {
    /// Counter increase since `baseline`
    ///
    /// Counters that went backwards (device reset, wrap) yield zero.
    pub fn delta_since(&self, baseline: &DiskCounters) -> DiskCounters {
        DiskCounters {
            write_bytes: self.write_bytes.saturating_sub(baseline.write_bytes),
            write_count: self.write_count.saturating_sub(baseline.write_count),
            write_time: self.write_time.saturating_sub(baseline.write_time),
            read_bytes: self.read_bytes.saturating_sub(baseline.read_bytes),
            read_count: self.read_count.saturating_sub(baseline.read_count),
            read_time: self.read_time.saturating_sub(baseline.read_time),
        }
    }
}

/// Reads resource usage of one process and of the machine's disks
pub trait ResourceProbe: Send + 'static {
    /// CPU utilization of the process since the previous call, in percent
    ///
    /// Returns `None` once the process is gone.
    fn cpu_percent(&mut self) -> Option<f32>;

    /// Current cumulative disk counters
    fn disk_counters(&mut self) -> io::Result<DiskCounters>;
}

/// Optional capability that produces probes
pub trait Instrumentation: Send + Sync {
    /// Attach a probe to the process
    ///
    /// Returns `None` if the process cannot be observed in this environment.
    fn attach(&self, pid: u32, disk_device: Option<&str>) -> Option<Box<dyn ResourceProbe>>;
}

/// Instrumentation backed by `sysinfo` (CPU) and `/proc/diskstats` (disks)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInstrumentation;

impl Instrumentation for SystemInstrumentation {
    fn attach(&self, pid: u32, disk_device: Option<&str>) -> Option<Box<dyn ResourceProbe>> {
        let probe = SystemProbe::attach(pid, disk_device)?;
        Some(Box::new(probe))
    }
}

struct SystemProbe {
    system: System,
    pid: Pid,
    disk_device: Option<String>,
}

impl SystemProbe {
    fn attach(pid: u32, disk_device: Option<&str>) -> Option<Self> {
        let mut probe = Self {
            system: System::new(),
            pid: Pid::from_u32(pid),
            disk_device: disk_device.map(str::to_string),
        };

        // First refresh establishes the CPU baseline
        if !probe.refresh() {
            tracing::warn!(pid, "Process not found; no resource stats will be recorded");
            return None;
        }

        if let Err(e) = probe.disk_counters() {
            tracing::warn!(
                pid,
                error = %e,
                "Disk counters unavailable; no resource stats will be recorded"
            );
            return None;
        }

        Some(probe)
    }

    fn refresh(&mut self) -> bool {
        let updated = self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
        updated > 0 && self.system.process(self.pid).is_some()
    }
}

impl ResourceProbe for SystemProbe {
    fn cpu_percent(&mut self) -> Option<f32> {
        if !self.refresh() {
            return None;
        }
        self.system.process(self.pid).map(|process| process.cpu_usage())
    }

    fn disk_counters(&mut self) -> io::Result<DiskCounters> {
        read_disk_counters(self.disk_device.as_deref())
    }
}

#[cfg(target_os = "linux")]
fn read_disk_counters(device: Option<&str>) -> io::Result<DiskCounters> {
    // /proc/diskstats counts 512-byte sectors regardless of the device
    const SECTOR_SIZE: u64 = 512;

    let stats = procfs::diskstats().map_err(io::Error::other)?;
    let counters = stats.into_iter().map(|stat| {
        let counters = DiskCounters {
            write_bytes: stat.sectors_written * SECTOR_SIZE,
            write_count: stat.writes,
            write_time: stat.time_writing,
            read_bytes: stat.sectors_read * SECTOR_SIZE,
            read_count: stat.reads,
            read_time: stat.time_reading,
        };
        (stat.name, counters)
    });

    sum_disk_counters(counters, device, |name| {
        std::path::Path::new("/sys/block").join(name).exists()
    })
}

/// Sum the counters of the selected disks
///
/// With a device name only that device is counted. Without one, only the
/// devices `is_whole_disk` accepts are counted so partitions are not counted
/// twice. Fails with `NotFound` when nothing was selected.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn sum_disk_counters<I, F>(
    stats: I,
    device: Option<&str>,
    is_whole_disk: F,
) -> io::Result<DiskCounters>
where
    I: IntoIterator<Item = (String, DiskCounters)>,
    F: Fn(&str) -> bool,
{
    let mut total = DiskCounters::default();
    let mut found = false;

    for (name, counters) in stats {
        let selected = match device {
            Some(device) => name == device,
            None => is_whole_disk(&name),
        };
        if !selected {
            continue;
        }

        found = true;
        total.write_bytes += counters.write_bytes;
        total.write_count += counters.write_count;
        total.write_time += counters.write_time;
        total.read_bytes += counters.read_bytes;
        total.read_count += counters.read_count;
        total.read_time += counters.read_time;
    }

    if found {
        return Ok(total);
    }

    let message = match device {
        Some(device) => format!("disk device [{device}] not found in /proc/diskstats"),
        None => "no whole disk found in /proc/diskstats".to_string(),
    };
    Err(io::Error::new(io::ErrorKind::NotFound, message))
}

#[cfg(not(target_os = "linux"))]
fn read_disk_counters(_device: Option<&str>) -> io::Result<DiskCounters> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "disk I/O counters are only collected on Linux",
    ))
}
