use crate::wire::TelemetryMessage;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

// Backlog ceiling between polls. Delivery is most-recent-wins, so the oldest
// messages are dropped once a slow poller falls this far behind.
pub const MAX_BACKLOG_MESSAGES: usize = 256;

const_assert!(MAX_BACKLOG_MESSAGES > 0);

/// Latest known field conditions, consumed by auto-mode solves.
///
/// `timestamp_ms` is the Unix-millisecond stamp of the last environment
/// message applied; staleness is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalReading {
    pub wind_speed_mph: f64,
    pub wind_direction_deg: f64,
    pub temperature_f: f64,
    pub pressure_inhg: f64,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StoreStats {
    pub messages_recorded: u64,
    pub messages_dropped: u64,
    pub environment_updates: u64,
}

#[derive(Debug)]
struct StoreInner {
    backlog: Vec<TelemetryMessage>,
    latest: EnvironmentalReading,
    stats: StoreStats,
}

/// Shared telemetry state: a drainable message backlog plus the single
/// latest environmental reading, behind one lock.
///
/// The receiver thread writes, request handlers read. Every method holds the
/// lock only for O(1) work so the receiver never stalls on a slow consumer.
#[derive(Debug)]
pub struct TelemetryStore {
    inner: Mutex<StoreInner>,
}

impl TelemetryStore {
    /// Creates a store seeded with default conditions. The defaults persist
    /// until the first environment message supersedes them; `timestamp_ms`
    /// stays 0 until then.
    pub fn new(defaults: EnvironmentalReading) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                backlog: Vec::new(),
                latest: EnvironmentalReading {
                    timestamp_ms: 0,
                    ..defaults
                },
                stats: StoreStats::default(),
            }),
        }
    }

    /// Appends a decoded message to the backlog. Environment variants also
    /// overwrite exactly the reading fields they provide and stamp `now_ms`.
    pub fn record(&self, message: TelemetryMessage, now_ms: u64) {
        let mut inner = self.lock();

        if inner.backlog.len() >= MAX_BACKLOG_MESSAGES {
            inner.backlog.remove(0);
            inner.stats.messages_dropped += 1;
        }

        if let TelemetryMessage::Environment(report) = &message {
            inner.latest.wind_speed_mph = report.wind_speed_mph;
            if let Some(direction) = report.wind_direction_deg {
                inner.latest.wind_direction_deg = direction;
            }
            if let Some(temperature) = report.temperature_f {
                inner.latest.temperature_f = temperature;
            }
            if let Some(pressure) = report.pressure_inhg {
                inner.latest.pressure_inhg = pressure;
            }
            inner.latest.timestamp_ms = now_ms;
            inner.stats.environment_updates += 1;
        }

        inner.backlog.push(message);
        inner.stats.messages_recorded += 1;
    }

    /// Atomically takes and clears the backlog. Never blocks waiting for new
    /// data; an empty backlog drains to an empty vec.
    pub fn drain_backlog(&self) -> Vec<TelemetryMessage> {
        std::mem::take(&mut self.lock().backlog)
    }

    /// Consistent snapshot of the latest reading.
    pub fn latest_reading(&self) -> EnvironmentalReading {
        self.lock().latest
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().stats
    }

    // A poisoned lock means a writer panicked mid-update; the reading is
    // still a complete struct, so recover the guard rather than propagate.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}
