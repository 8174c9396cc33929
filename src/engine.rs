//! Solution orchestrator: one path from a solve request to dense firing
//! arrays, with auto-vs-manual condition sourcing as an explicit flag.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ballistics::{
    resample_trace, BallisticInputs, ResampleError, SimulationError, TrajectorySimulator,
};
use crate::cache::{CacheStats, SolutionCache};
use crate::store::TelemetryStore;

pub const BC_G7_MIN: f64 = 0.1;
pub const BC_G7_MAX: f64 = 2.0;
pub const MUZZLE_VELOCITY_MIN_FPS: f64 = 500.0;
pub const MUZZLE_VELOCITY_MAX_FPS: f64 = 5000.0;
pub const WIND_SPEED_MIN_MPH: f64 = 0.0;
pub const WIND_SPEED_MAX_MPH: f64 = 150.0;
pub const TEMPERATURE_MIN_F: f64 = -80.0;
pub const TEMPERATURE_MAX_F: f64 = 160.0;
pub const PRESSURE_MIN_INHG: f64 = 15.0;
pub const PRESSURE_MAX_INHG: f64 = 35.0;
pub const MIN_SAMPLE_POINTS: usize = 2;
pub const MAX_SAMPLE_POINTS: usize = 1000;

/// Tunables for one engine instance. All distances in yards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub min_range_yds: f64,
    pub max_range_yds: f64,
    pub zero_range_yds: f64,
    pub default_sample_points: usize,
    pub cache_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_range_yds: 100.0,
            max_range_yds: 3000.0,
            zero_range_yds: 100.0,
            default_sample_points: 100,
            cache_capacity: crate::cache::DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// One solve call as it arrives off the wire.
///
/// With `use_telemetry` set, the four environmental fields are taken from the
/// latest stored reading and any request-supplied values for them are ignored
/// outright. Without it, all four must be present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub bc_g7: f64,
    pub muzzle_velocity_fps: f64,
    pub range_yds: f64,
    #[serde(default)]
    pub temp_f: Option<f64>,
    #[serde(default)]
    pub pressure_inhg: Option<f64>,
    #[serde(default)]
    pub wind_speed_mph: Option<f64>,
    #[serde(default)]
    pub wind_direction_deg: Option<f64>,
    #[serde(default)]
    pub use_telemetry: bool,
    #[serde(default)]
    pub sample_points: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionSource {
    Manual,
    Telemetry,
}

/// The environmental values a solution was actually computed with, echoed
/// back so the operator can audit what the solver saw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedConditions {
    pub wind_speed_mph: f64,
    pub wind_direction_deg: f64,
    pub temperature_f: f64,
    pub pressure_inhg: f64,
    pub source: ConditionSource,
}

/// Dense firing solution plus a final-point summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiringSolution {
    pub drop_moa: f64,
    pub windage_moa: f64,
    pub time_of_flight_sec: f64,
    pub velocity_at_target_fps: f64,
    pub range_yds: Vec<f64>,
    pub drop_array_moa: Vec<f64>,
    pub windage_array_moa: Vec<f64>,
    pub time_array_sec: Vec<f64>,
    pub velocity_array_fps: Vec<f64>,
    pub applied: AppliedConditions,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("invalid {field}: {detail}")]
    Validation { field: &'static str, detail: String },
    #[error("range {requested_yds} yd is below the {min_yds} yd minimum")]
    RangeTooShort { requested_yds: f64, min_yds: f64 },
    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulationError),
    #[error("resampling failed: {0}")]
    Resample(#[from] ResampleError),
}

/// Ties the store, the trace cache, and the physics collaborator together
/// behind a single `solve` entry point.
pub struct SolutionEngine {
    simulator: Arc<dyn TrajectorySimulator>,
    store: Arc<TelemetryStore>,
    cache: SolutionCache,
    settings: EngineSettings,
}

impl SolutionEngine {
    #[must_use]
    pub fn new(
        simulator: Arc<dyn TrajectorySimulator>,
        store: Arc<TelemetryStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            simulator,
            store,
            cache: SolutionCache::new(settings.cache_capacity),
            settings,
        }
    }

    /// Produces a firing solution for one request.
    ///
    /// Order of operations: resolve effective conditions (auto substitution
    /// first, so telemetry values face the same bounds as manual ones), then
    /// field validation, the minimum-range gate, the cached simulation, and
    /// finally resampling onto the dense grid.
    pub fn solve(&self, request: &SolveRequest) -> Result<FiringSolution, SolveError> {
        let (inputs, applied) = self.effective_inputs(request)?;
        let sample_points = request
            .sample_points
            .unwrap_or(self.settings.default_sample_points);
        validate_inputs(&inputs, sample_points, self.settings.max_range_yds)?;

        if inputs.range_yds < self.settings.min_range_yds {
            return Err(SolveError::RangeTooShort {
                requested_yds: inputs.range_yds,
                min_yds: self.settings.min_range_yds,
            });
        }

        let trace = self.cache.get_or_compute(
            &inputs,
            self.settings.zero_range_yds,
            self.simulator.as_ref(),
        )?;
        let resampled = resample_trace(
            &trace,
            self.settings.min_range_yds,
            inputs.range_yds,
            sample_points,
        )?;

        Ok(FiringSolution {
            drop_moa: resampled.drop_moa.last().copied().unwrap_or(0.0),
            windage_moa: resampled.windage_moa.last().copied().unwrap_or(0.0),
            time_of_flight_sec: resampled.time_sec.last().copied().unwrap_or(0.0),
            velocity_at_target_fps: resampled.velocity_fps.last().copied().unwrap_or(0.0),
            range_yds: resampled.range_yds,
            drop_array_moa: resampled.drop_moa,
            windage_array_moa: resampled.windage_moa,
            time_array_sec: resampled.time_sec,
            velocity_array_fps: resampled.velocity_fps,
            applied,
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn simulator_name(&self) -> &'static str {
        self.simulator.name()
    }

    fn effective_inputs(
        &self,
        request: &SolveRequest,
    ) -> Result<(BallisticInputs, AppliedConditions), SolveError> {
        if request.use_telemetry {
            let reading = self.store.latest_reading();
            let applied = AppliedConditions {
                wind_speed_mph: reading.wind_speed_mph,
                wind_direction_deg: reading.wind_direction_deg,
                temperature_f: reading.temperature_f,
                pressure_inhg: reading.pressure_inhg,
                source: ConditionSource::Telemetry,
            };
            let inputs = BallisticInputs {
                bc_g7: request.bc_g7,
                muzzle_velocity_fps: request.muzzle_velocity_fps,
                pressure_inhg: reading.pressure_inhg,
                temperature_f: reading.temperature_f,
                wind_speed_mph: reading.wind_speed_mph,
                wind_direction_deg: reading.wind_direction_deg,
                range_yds: request.range_yds,
            };
            return Ok((inputs, applied));
        }

        let temperature_f = require(request.temp_f, "temp_f")?;
        let pressure_inhg = require(request.pressure_inhg, "pressure_inhg")?;
        let wind_speed_mph = require(request.wind_speed_mph, "wind_speed_mph")?;
        let wind_direction_deg = require(request.wind_direction_deg, "wind_direction_deg")?;

        let applied = AppliedConditions {
            wind_speed_mph,
            wind_direction_deg,
            temperature_f,
            pressure_inhg,
            source: ConditionSource::Manual,
        };
        let inputs = BallisticInputs {
            bc_g7: request.bc_g7,
            muzzle_velocity_fps: request.muzzle_velocity_fps,
            pressure_inhg,
            temperature_f,
            wind_speed_mph,
            wind_direction_deg,
            range_yds: request.range_yds,
        };
        Ok((inputs, applied))
    }
}

fn require(value: Option<f64>, field: &'static str) -> Result<f64, SolveError> {
    value.ok_or(SolveError::Validation {
        field,
        detail: "required unless use_telemetry is set".to_string(),
    })
}

fn validate_inputs(
    inputs: &BallisticInputs,
    sample_points: usize,
    max_range_yds: f64,
) -> Result<(), SolveError> {
    check_range("bc_g7", inputs.bc_g7, BC_G7_MIN, BC_G7_MAX)?;
    check_range(
        "muzzle_velocity_fps",
        inputs.muzzle_velocity_fps,
        MUZZLE_VELOCITY_MIN_FPS,
        MUZZLE_VELOCITY_MAX_FPS,
    )?;
    check_range(
        "wind_speed_mph",
        inputs.wind_speed_mph,
        WIND_SPEED_MIN_MPH,
        WIND_SPEED_MAX_MPH,
    )?;
    check_range(
        "temp_f",
        inputs.temperature_f,
        TEMPERATURE_MIN_F,
        TEMPERATURE_MAX_F,
    )?;
    check_range(
        "pressure_inhg",
        inputs.pressure_inhg,
        PRESSURE_MIN_INHG,
        PRESSURE_MAX_INHG,
    )?;

    let direction = inputs.wind_direction_deg;
    if direction.is_nan() || direction < 0.0 || direction >= 360.0 {
        return Err(SolveError::Validation {
            field: "wind_direction_deg",
            detail: format!("{direction} outside [0, 360)"),
        });
    }

    let range = inputs.range_yds;
    if range.is_nan() || range <= 0.0 || range > max_range_yds {
        return Err(SolveError::Validation {
            field: "range_yds",
            detail: format!("{range} outside (0, {max_range_yds}]"),
        });
    }

    if !(MIN_SAMPLE_POINTS..=MAX_SAMPLE_POINTS).contains(&sample_points) {
        return Err(SolveError::Validation {
            field: "sample_points",
            detail: format!("{sample_points} outside [{MIN_SAMPLE_POINTS}, {MAX_SAMPLE_POINTS}]"),
        });
    }

    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), SolveError> {
    // Written so NaN fails every bound.
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(SolveError::Validation {
            field,
            detail: format!("{value} outside [{min}, {max}]"),
        })
    }
}
