//! Bounded LRU memoization of simulator traces.
//!
//! The trace is the expensive artifact: one cache miss costs a full
//! integration run. Resampled solutions are cheap and are rebuilt on every
//! request, so only traces live here.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

use crate::ballistics::{BallisticInputs, SimulationError, TrajectorySimulator, TrajectoryTrace};

pub const DEFAULT_CACHE_CAPACITY: usize = 32;

const_assert!(DEFAULT_CACHE_CAPACITY > 0);

/// Exact-bit key over the seven solution inputs. Two requests share an entry
/// only when every field matches bit for bit; there is no rounding tolerance,
/// so callers quantize inputs upstream if they want looser reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceKey([u64; 7]);

impl TraceKey {
    #[must_use]
    pub fn new(inputs: &BallisticInputs) -> Self {
        Self([
            inputs.bc_g7.to_bits(),
            inputs.muzzle_velocity_fps.to_bits(),
            inputs.pressure_inhg.to_bits(),
            inputs.temperature_f.to_bits(),
            inputs.wind_speed_mph.to_bits(),
            inputs.wind_direction_deg.to_bits(),
            inputs.range_yds.to_bits(),
        ])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// Thread-safe trace cache with least-recently-used eviction.
///
/// Simulation runs outside the lock, so a slow integration never blocks
/// readers hitting other entries.
pub struct SolutionCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    entries: HashMap<TraceKey, Arc<TrajectoryTrace>>,
    order: VecDeque<TraceKey>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl SolutionCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            capacity,
        }
    }

    /// Returns the cached trace for `inputs`, running the simulator on a
    /// miss. The computed trace is validated before insertion, so a
    /// degenerate simulator result never poisons the cache.
    pub fn get_or_compute(
        &self,
        inputs: &BallisticInputs,
        zero_range_yds: f64,
        simulator: &dyn TrajectorySimulator,
    ) -> Result<Arc<TrajectoryTrace>, SimulationError> {
        let key = TraceKey::new(inputs);
        if let Some(trace) = self.hit(key) {
            return Ok(trace);
        }

        let request = inputs.simulation_request(zero_range_yds);
        let trace = simulator.trajectory(&request)?;
        trace.ensure_well_formed()?;
        Ok(self.store(key, trace))
    }

    /// Hit-only probe, counted in the statistics like any other lookup.
    pub fn lookup(&self, inputs: &BallisticInputs) -> Option<Arc<TrajectoryTrace>> {
        self.hit(TraceKey::new(inputs))
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            entries: inner.entries.len(),
        }
    }

    fn hit(&self, key: TraceKey) -> Option<Arc<TrajectoryTrace>> {
        let mut inner = self.lock();
        match inner.entries.get(&key) {
            Some(trace) => {
                let trace = Arc::clone(trace);
                if let Some(position) = inner.order.iter().position(|k| *k == key) {
                    inner.order.remove(position);
                }
                inner.order.push_back(key);
                inner.hits += 1;
                Some(trace)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    fn store(&self, key: TraceKey, trace: TrajectoryTrace) -> Arc<TrajectoryTrace> {
        let trace = Arc::new(trace);
        let mut inner = self.lock();

        // A racing thread may have stored this key while we simulated; the
        // key is then already queued and only the entry is replaced.
        if inner.entries.insert(key, Arc::clone(&trace)).is_none() {
            inner.order.push_back(key);
        }

        while inner.entries.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    if inner.entries.remove(&oldest).is_some() {
                        inner.evictions += 1;
                    }
                }
                None => break,
            }
        }

        trace
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
