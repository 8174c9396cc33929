//! Serial telemetry link.
//!
//! One background thread owns the device: it walks the candidate paths in
//! order, reads newline-delimited text, decodes each line, and publishes the
//! result into the shared store. A lost device puts the thread back into the
//! search loop; it never gives up until told to stop.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::store::{now_millis, TelemetryStore};
use crate::wire::decode_line;

/// Longest wire line kept whole; anything beyond this is counted and dropped
/// up to the next newline.
pub const MAX_LINE_BYTES: usize = 512;

pub const DEFAULT_DEVICE_PATHS: [&str; 3] = ["/dev/ttyUSB0", "/dev/ttyACM0", "/dev/ttyS0"];
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 200;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);
const READ_CHUNK_BYTES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub device_paths: Vec<String>,
    pub baud_rate: u32,
    pub reconnect_delay: Duration,
    pub read_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_paths: DEFAULT_DEVICE_PATHS.iter().map(ToString::to_string).collect(),
            baud_rate: DEFAULT_BAUD_RATE,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Searching,
    Connected,
    Stopped,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LinkState::Searching,
            1 => LinkState::Connected,
            _ => LinkState::Stopped,
        }
    }
}

/// Point-in-time snapshot of the receiver, safe to serialize into a status
/// response while the worker keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReport {
    pub state: LinkState,
    pub device_path: Option<String>,
    pub lines_decoded: u64,
    pub oversize_lines: u64,
    pub connects: u64,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no serial device reachable ({attempted} paths tried)")]
    DeviceUnavailable { attempted: usize },
    #[error("receiver thread panicked")]
    WorkerPanicked,
}

/// Seam between the receiver and the hardware: production opens real serial
/// devices, tests hand back scripted readers.
pub trait PortOpener: Send + Sync {
    fn open(
        &self,
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> io::Result<Box<dyn Read + Send>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(
        &self,
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> io::Result<Box<dyn Read + Send>> {
        let port = serialport::new(path, baud_rate)
            .timeout(read_timeout)
            .open()?;
        Ok(Box::new(port))
    }
}

/// Starts the receiver thread and returns its handle. The thread runs until
/// [`LinkHandle::stop`] or drop.
pub fn spawn(
    config: LinkConfig,
    store: Arc<TelemetryStore>,
    opener: Arc<dyn PortOpener>,
) -> LinkHandle {
    let stop_signal = Arc::new(AtomicBool::new(false));
    let monitor = Arc::new(LinkMonitor::new());

    let worker_stop = Arc::clone(&stop_signal);
    let worker_monitor = Arc::clone(&monitor);
    let worker = thread::Builder::new()
        .name("telemetry-link".to_string())
        .spawn(move || run(&config, &store, opener.as_ref(), &worker_monitor, &worker_stop));

    match worker {
        Ok(handle) => LinkHandle {
            stop_signal,
            monitor,
            worker: Some(handle),
        },
        Err(e) => {
            // Thread creation only fails when the OS is out of resources;
            // the handle then reports a permanently stopped link.
            error!("Failed to spawn telemetry link thread: {}", e);
            monitor.set_stopped();
            LinkHandle {
                stop_signal,
                monitor,
                worker: None,
            }
        }
    }
}

pub struct LinkHandle {
    stop_signal: Arc<AtomicBool>,
    monitor: Arc<LinkMonitor>,
    worker: Option<JoinHandle<()>>,
}

impl LinkHandle {
    pub fn report(&self) -> LinkReport {
        self.monitor.report()
    }

    /// Signals the worker and waits for it to exit.
    pub fn stop(&mut self) -> Result<(), LinkError> {
        self.stop_signal.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                return Err(LinkError::WorkerPanicked);
            }
        }
        Ok(())
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                error!("Error stopping telemetry link: {}", e);
            }
        }
    }
}

#[derive(Debug)]
struct LinkMonitor {
    state: AtomicU8,
    device_path: Mutex<Option<String>>,
    lines_decoded: AtomicU64,
    oversize_lines: AtomicU64,
    connects: AtomicU64,
}

impl LinkMonitor {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(LinkState::Searching as u8),
            device_path: Mutex::new(None),
            lines_decoded: AtomicU64::new(0),
            oversize_lines: AtomicU64::new(0),
            connects: AtomicU64::new(0),
        }
    }

    fn set_searching(&self) {
        self.state.store(LinkState::Searching as u8, Ordering::Relaxed);
        *self.lock_path() = None;
    }

    fn set_connected(&self, path: &str) {
        self.state.store(LinkState::Connected as u8, Ordering::Relaxed);
        *self.lock_path() = Some(path.to_string());
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    fn set_stopped(&self) {
        self.state.store(LinkState::Stopped as u8, Ordering::Relaxed);
    }

    fn count_line(&self) {
        self.lines_decoded.fetch_add(1, Ordering::Relaxed);
    }

    fn count_oversize(&self) {
        self.oversize_lines.fetch_add(1, Ordering::Relaxed);
    }

    fn report(&self) -> LinkReport {
        LinkReport {
            state: LinkState::from_u8(self.state.load(Ordering::Relaxed)),
            device_path: self.lock_path().clone(),
            lines_decoded: self.lines_decoded.load(Ordering::Relaxed),
            oversize_lines: self.oversize_lines.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
        }
    }

    fn lock_path(&self) -> MutexGuard<'_, Option<String>> {
        match self.device_path.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn run(
    config: &LinkConfig,
    store: &TelemetryStore,
    opener: &dyn PortOpener,
    monitor: &LinkMonitor,
    stop: &AtomicBool,
) {
    info!("Telemetry link started, {} candidate devices", config.device_paths.len());

    while !stop.load(Ordering::Relaxed) {
        monitor.set_searching();
        let (reader, path) = match connect_any(config, opener) {
            Ok(pair) => pair,
            Err(e) => {
                debug!("{}, retrying in {:?}", e, config.reconnect_delay);
                sleep_unless_stopped(stop, config.reconnect_delay);
                continue;
            }
        };

        monitor.set_connected(&path);
        info!("Serial device {} connected at {} baud", path, config.baud_rate);
        read_lines(reader, store, monitor, stop);

        if !stop.load(Ordering::Relaxed) {
            warn!("Serial device {} lost, reconnecting", path);
            sleep_unless_stopped(stop, config.reconnect_delay);
        }
    }

    monitor.set_stopped();
    info!("Telemetry link stopped");
}

fn connect_any(
    config: &LinkConfig,
    opener: &dyn PortOpener,
) -> Result<(Box<dyn Read + Send>, String), LinkError> {
    for path in &config.device_paths {
        match opener.open(path, config.baud_rate, config.read_timeout) {
            Ok(reader) => return Ok((reader, path.clone())),
            Err(e) => debug!("Serial candidate {} unavailable: {}", path, e),
        }
    }
    Err(LinkError::DeviceUnavailable {
        attempted: config.device_paths.len(),
    })
}

/// Pulls bytes until EOF, a hard read error, or a stop request. Timeouts are
/// idle ticks, not failures.
fn read_lines(
    mut reader: Box<dyn Read + Send>,
    store: &TelemetryStore,
    monitor: &LinkMonitor,
    stop: &AtomicBool,
) {
    let mut line: ArrayVec<u8, MAX_LINE_BYTES> = ArrayVec::new();
    let mut oversize = false;
    let mut buf = [0_u8; READ_CHUNK_BYTES];

    while !stop.load(Ordering::Relaxed) {
        match reader.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => {
                for &byte in &buf[..n] {
                    if byte == b'\n' {
                        flush_line(&mut line, &mut oversize, store, monitor);
                    } else if !oversize && line.try_push(byte).is_err() {
                        oversize = true;
                    }
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                warn!("Serial read failed: {}", e);
                return;
            }
        }
    }
}

fn flush_line(
    line: &mut ArrayVec<u8, MAX_LINE_BYTES>,
    oversize: &mut bool,
    store: &TelemetryStore,
    monitor: &LinkMonitor,
) {
    if *oversize {
        monitor.count_oversize();
        *oversize = false;
        line.clear();
        return;
    }

    if line.last() == Some(&b'\r') {
        line.pop();
    }
    let text = String::from_utf8_lossy(line);
    if !text.trim().is_empty() {
        store.record(decode_line(&text), now_millis());
        monitor.count_line();
    }
    line.clear();
}

fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) {
    let mut remaining = total;
    while !stop.load(Ordering::Relaxed) && !remaining.is_zero() {
        let nap = remaining.min(STOP_POLL_INTERVAL);
        thread::sleep(nap);
        remaining = remaining.saturating_sub(nap);
    }
}
