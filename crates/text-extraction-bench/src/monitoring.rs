//! Resource sampling for a single bracketed unit of work
//!
//! A [`ResourceMonitor`] records one [`ResourceSample`] per interval between
//! [`start`](ResourceMonitor::start) and [`stop`](ResourceMonitor::stop), then
//! reduces the series to [`ResourceStats`]. Two sampling loops produce the same
//! schema:
//!
//! - [`SamplingMode::Async`]: a tokio task woken by an interval timer, for
//!   extractions that yield to the scheduler.
//! - [`SamplingMode::Thread`]: a dedicated OS thread, for synchronous extractions
//!   that occupy a worker thread until they return.
//!
//! The monitor stops its loop when dropped, so a session is torn down on every
//! exit path. Capabilities the platform does not expose (I/O counters, open
//! file counts, thread lists) are reported as `None` rather than failing the
//! sample.

use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Minimum elapsed time reported for a session, in seconds
const MIN_ELAPSED_SECS: f64 = 0.001;

/// Samples between full process-table scans for new descendants
const TREE_DISCOVERY_TICKS: u32 = 5;

/// A single point-in-time reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// Seconds since the session started (monotonic)
    pub timestamp: f64,
    pub cpu_percent: f64,
    pub memory_rss: u64,
    pub memory_vms: u64,
    pub num_threads: Option<usize>,
    pub open_files: Option<usize>,
    /// Cumulative deltas against the session baseline
    pub io_read_bytes: Option<u64>,
    pub io_write_bytes: Option<u64>,
    pub io_read_count: Option<u64>,
    pub io_write_count: Option<u64>,
}

/// Peak/average statistics derived from one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStats {
    /// Last sample timestamp minus first, in seconds
    pub elapsed_secs: f64,
    pub peak_memory_mb: f64,
    pub avg_memory_mb: f64,
    pub peak_cpu_percent: f64,
    /// Average over positive readings only
    pub avg_cpu_percent: f64,
    pub io_read_mb: Option<f64>,
    pub io_write_mb: Option<f64>,
    pub sample_count: usize,
}

/// Which sampling loop backs a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    Async,
    Thread,
}

/// Which processes are accounted in a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorScope {
    /// The harness process only
    CurrentProcess,
    /// The harness process plus every descendant (subprocess-backed frameworks)
    #[default]
    ProcessTree,
}

#[derive(Debug, Clone, Copy, Default)]
struct IoCounters {
    read_bytes: u64,
    write_bytes: u64,
    read_count: Option<u64>,
    write_count: Option<u64>,
}

/// Reads process statistics through sysinfo, holding the CPU and I/O baselines
struct ProcessProbe {
    system: System,
    pid: Option<Pid>,
    scope: MonitorScope,
    origin: Instant,
    io_baseline: Option<IoCounters>,
    /// Known process tree, rescanned every [`TREE_DISCOVERY_TICKS`] samples
    tree: Vec<Pid>,
    ticks_since_discovery: u32,
}

impl ProcessProbe {
    fn new(scope: MonitorScope, origin: Instant) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::debug!("Resource sampling disabled, current pid unavailable: {}", e);
                None
            }
        };

        let mut probe = Self {
            system: System::new(),
            pid,
            scope,
            origin,
            io_baseline: None,
            tree: Vec::new(),
            ticks_since_discovery: 0,
        };

        // The first CPU reading only establishes the baseline.
        let pids = probe.refresh();
        probe.io_baseline = probe.read_io(&pids);
        if probe.io_baseline.is_none() {
            tracing::debug!("I/O counters unavailable on this platform, omitting I/O metrics");
        }
        probe
    }

    /// Refresh the monitored processes and return the pids to account
    fn refresh(&mut self) -> Vec<Pid> {
        let Some(pid) = self.pid else {
            return Vec::new();
        };

        let kind = ProcessRefreshKind::nothing()
            .with_cpu()
            .with_memory()
            .with_disk_usage()
            .with_tasks();

        match self.scope {
            MonitorScope::CurrentProcess => {
                self.system
                    .refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, kind);
                vec![pid]
            }
            MonitorScope::ProcessTree => {
                if self.tree.is_empty() || self.ticks_since_discovery >= TREE_DISCOVERY_TICKS {
                    // Parent links only; unrelated processes get no stats
                    self.system
                        .refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());
                    self.tree = self.descendants_of(pid);
                    self.ticks_since_discovery = 0;
                }
                self.ticks_since_discovery += 1;

                self.system
                    .refresh_processes_specifics(ProcessesToUpdate::Some(&self.tree), true, kind);
                self.tree.retain(|p| self.system.process(*p).is_some());
                self.tree.clone()
            }
        }
    }

    fn descendants_of(&self, root: Pid) -> Vec<Pid> {
        let mut tree = vec![root];
        let mut cursor = 0;
        while cursor < tree.len() {
            let parent = tree[cursor];
            tree.extend(
                self.system
                    .processes()
                    .iter()
                    .filter(|(_, p)| p.parent() == Some(parent) && p.thread_kind().is_none())
                    .map(|(pid, _)| *pid),
            );
            cursor += 1;
        }
        tree
    }

    fn read_io(&self, pids: &[Pid]) -> Option<IoCounters> {
        #[cfg(target_os = "linux")]
        {
            let mut total: Option<IoCounters> = None;
            for pid in pids {
                if let Some(counters) = read_proc_io(*pid) {
                    let acc = total.get_or_insert_with(IoCounters::default);
                    acc.read_bytes += counters.read_bytes;
                    acc.write_bytes += counters.write_bytes;
                    acc.read_count = Some(acc.read_count.unwrap_or(0) + counters.read_count.unwrap_or(0));
                    acc.write_count = Some(acc.write_count.unwrap_or(0) + counters.write_count.unwrap_or(0));
                }
            }
            total
        }

        #[cfg(not(target_os = "linux"))]
        {
            let mut total: Option<IoCounters> = None;
            for pid in pids {
                if let Some(process) = self.system.process(*pid) {
                    let usage = process.disk_usage();
                    let acc = total.get_or_insert_with(IoCounters::default);
                    acc.read_bytes += usage.total_read_bytes;
                    acc.write_bytes += usage.total_written_bytes;
                }
            }
            total
        }
    }

    fn sample(&mut self) -> Option<ResourceSample> {
        let pids = self.refresh();
        if pids.is_empty() {
            return None;
        }

        let mut cpu_percent = 0.0f64;
        let mut memory_rss = 0u64;
        let mut memory_vms = 0u64;
        let mut num_threads: Option<usize> = None;
        let mut open_files: Option<usize> = None;
        let mut seen = false;

        for pid in &pids {
            let Some(process) = self.system.process(*pid) else {
                continue;
            };
            seen = true;
            cpu_percent += f64::from(process.cpu_usage());
            memory_rss += process.memory();
            memory_vms += process.virtual_memory();
            if let Some(tasks) = process.tasks() {
                *num_threads.get_or_insert(0) += tasks.len().max(1);
            }
            if let Some(files) = process.open_files() {
                *open_files.get_or_insert(0) += files;
            }
        }

        if !seen {
            return None;
        }

        let io = match (self.read_io(&pids), self.io_baseline) {
            (Some(current), Some(baseline)) => Some(IoCounters {
                read_bytes: current.read_bytes.saturating_sub(baseline.read_bytes),
                write_bytes: current.write_bytes.saturating_sub(baseline.write_bytes),
                read_count: current
                    .read_count
                    .zip(baseline.read_count)
                    .map(|(c, b)| c.saturating_sub(b)),
                write_count: current
                    .write_count
                    .zip(baseline.write_count)
                    .map(|(c, b)| c.saturating_sub(b)),
            }),
            _ => None,
        };

        Some(ResourceSample {
            timestamp: self.origin.elapsed().as_secs_f64(),
            cpu_percent,
            memory_rss,
            memory_vms,
            num_threads,
            open_files,
            io_read_bytes: io.map(|c| c.read_bytes),
            io_write_bytes: io.map(|c| c.write_bytes),
            io_read_count: io.and_then(|c| c.read_count),
            io_write_count: io.and_then(|c| c.write_count),
        })
    }
}

/// Parse the counters of a `/proc/<pid>/io` file
fn parse_proc_io(content: &str) -> Option<IoCounters> {
    let mut read_bytes = None;
    let mut write_bytes = None;
    let mut read_count = None;
    let mut write_count = None;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().parse::<u64>().ok();
        match key.trim() {
            "read_bytes" => read_bytes = value,
            "write_bytes" => write_bytes = value,
            "syscr" => read_count = value,
            "syscw" => write_count = value,
            _ => {}
        }
    }

    Some(IoCounters {
        read_bytes: read_bytes?,
        write_bytes: write_bytes?,
        read_count,
        write_count,
    })
}

#[cfg(target_os = "linux")]
fn read_proc_io(pid: Pid) -> Option<IoCounters> {
    let content = std::fs::read_to_string(format!("/proc/{}/io", pid.as_u32())).ok()?;
    parse_proc_io(&content)
}

type SessionResult = (ProcessProbe, Vec<ResourceSample>);

enum Worker {
    Task {
        handle: tokio::task::JoinHandle<SessionResult>,
        stop: CancellationToken,
    },
    Thread {
        result: oneshot::Receiver<SessionResult>,
        // Dropping the sender wakes the thread and ends the loop.
        stop: mpsc::Sender<()>,
    },
}

/// Samples resource usage while one unit of work executes
pub struct ResourceMonitor {
    interval: Duration,
    scope: MonitorScope,
    worker: Option<Worker>,
}

impl ResourceMonitor {
    /// Create a monitor sampling every `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            scope: MonitorScope::default(),
            worker: None,
        }
    }

    pub fn with_scope(mut self, scope: MonitorScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Begin a new session, discarding anything left from a previous one
    ///
    /// # Errors
    ///
    /// Returns [`Error::Benchmark`](crate::Error::Benchmark) if async sampling is
    /// requested outside a tokio runtime, or the sampling thread cannot be spawned.
    pub fn start(&mut self, mode: SamplingMode) -> crate::Result<()> {
        self.halt();

        let origin = Instant::now();
        let probe = ProcessProbe::new(self.scope, origin);
        let interval = self.interval;

        let worker = match mode {
            SamplingMode::Async => {
                let runtime = tokio::runtime::Handle::try_current()
                    .map_err(|e| crate::Error::Benchmark(format!("Async sampling requires a tokio runtime: {}", e)))?;
                let stop = CancellationToken::new();
                let handle = runtime.spawn(async_sampling_loop(probe, interval, stop.clone()));
                Worker::Task { handle, stop }
            }
            SamplingMode::Thread => {
                let (stop_tx, stop_rx) = mpsc::channel::<()>();
                let (result_tx, result_rx) = oneshot::channel();
                std::thread::Builder::new()
                    .name("resource-sampler".to_string())
                    .spawn(move || {
                        let session = thread_sampling_loop(probe, interval, stop_rx);
                        let _ = result_tx.send(session);
                    })
                    .map_err(|e| crate::Error::Benchmark(format!("Failed to spawn sampling thread: {}", e)))?;
                Worker::Thread {
                    result: result_rx,
                    stop: stop_tx,
                }
            }
        };

        self.worker = Some(worker);
        Ok(())
    }

    /// End the session and reduce its samples
    ///
    /// A final sample is taken when the session is shorter than one interval,
    /// so fast extractions still report a baseline and a final reading.
    pub async fn stop(&mut self) -> (ResourceStats, Vec<ResourceSample>) {
        let session = match self.worker.take() {
            Some(Worker::Task { handle, stop }) => {
                stop.cancel();
                handle.await.ok()
            }
            Some(Worker::Thread { result, stop }) => {
                drop(stop);
                result.await.ok()
            }
            None => None,
        };

        let samples = match session {
            Some((mut probe, mut samples)) => {
                if samples.len() < 2
                    && let Some(last) = probe.sample()
                {
                    samples.push(last);
                }
                samples
            }
            None => Vec::new(),
        };

        (Self::calculate_stats(&samples), samples)
    }

    /// Reduce a sample series to peak/average statistics
    pub fn calculate_stats(samples: &[ResourceSample]) -> ResourceStats {
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return ResourceStats::default();
        };

        let count = samples.len() as f64;
        let memory_mb: Vec<f64> = samples.iter().map(|s| s.memory_rss as f64 / BYTES_PER_MB).collect();
        let peak_memory_mb = memory_mb.iter().copied().fold(0.0, f64::max);
        let avg_memory_mb = memory_mb.iter().sum::<f64>() / count;

        let valid_cpu: Vec<f64> = samples.iter().map(|s| s.cpu_percent).filter(|c| *c > 0.0).collect();
        let peak_cpu_percent = valid_cpu.iter().copied().fold(0.0, f64::max);
        let avg_cpu_percent = if valid_cpu.is_empty() {
            0.0
        } else {
            valid_cpu.iter().sum::<f64>() / valid_cpu.len() as f64
        };

        // Deltas can shrink when a child process exits, so report the largest observed.
        let io_read_mb = samples
            .iter()
            .filter_map(|s| s.io_read_bytes)
            .max()
            .map(|b| b as f64 / BYTES_PER_MB);
        let io_write_mb = samples
            .iter()
            .filter_map(|s| s.io_write_bytes)
            .max()
            .map(|b| b as f64 / BYTES_PER_MB);

        ResourceStats {
            elapsed_secs: (last.timestamp - first.timestamp).max(MIN_ELAPSED_SECS),
            peak_memory_mb,
            avg_memory_mb,
            peak_cpu_percent,
            avg_cpu_percent,
            io_read_mb,
            io_write_mb,
            sample_count: samples.len(),
        }
    }

    fn halt(&mut self) {
        match self.worker.take() {
            Some(Worker::Task { stop, .. }) => stop.cancel(),
            Some(Worker::Thread { stop, .. }) => drop(stop),
            None => {}
        }
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.halt();
    }
}

async fn async_sampling_loop(mut probe: ProcessProbe, interval: Duration, stop: CancellationToken) -> SessionResult {
    let mut samples = Vec::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(sample) = probe.sample() {
                    samples.push(sample);
                }
            }
        }
    }

    (probe, samples)
}

fn thread_sampling_loop(mut probe: ProcessProbe, interval: Duration, stop: mpsc::Receiver<()>) -> SessionResult {
    let mut samples = Vec::new();

    loop {
        if let Some(sample) = probe.sample() {
            samples.push(sample);
        }
        match stop.recv_timeout(interval) {
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }

    (probe, samples)
}
