use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod pointmass;
pub mod resample;
pub mod spline;

pub use pointmass::PointMassSimulator;
pub use resample::{resample_trace, ResampleError, ResampledTrajectory};
pub use spline::CubicSpline;

/// Extra distance simulated past the requested range so the resampler never
/// evaluates a spline at the very edge of the trace.
pub const TRACE_RANGE_MARGIN_YDS: f64 = 25.0;

/// The seven physical inputs that fully determine a firing solution.
///
/// These fields are the cache key: two requests differing in a single bit of
/// any field are distinct solutions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallisticInputs {
    pub bc_g7: f64,
    pub muzzle_velocity_fps: f64,
    pub pressure_inhg: f64,
    pub temperature_f: f64,
    pub wind_speed_mph: f64,
    pub wind_direction_deg: f64,
    pub range_yds: f64,
}

impl BallisticInputs {
    /// Builds the collaborator request for these inputs: G7 drag, the wind
    /// vector when there is any wind, and a trace extending one margin past
    /// the requested range.
    pub fn simulation_request(&self, zero_range_yds: f64) -> SimulationRequest {
        let wind = if self.wind_speed_mph > 0.0 {
            Some(Wind {
                speed_mph: self.wind_speed_mph,
                direction_deg: self.wind_direction_deg,
            })
        } else {
            None
        };

        SimulationRequest {
            drag_model: DragModel::G7,
            ballistic_coefficient: self.bc_g7,
            muzzle_velocity_fps: self.muzzle_velocity_fps,
            wind,
            temperature_f: self.temperature_f,
            pressure_inhg: self.pressure_inhg,
            max_range_yds: self.range_yds + TRACE_RANGE_MARGIN_YDS,
            zero_range_yds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DragModel {
    G1,
    G7,
}

impl DragModel {
    pub fn name(&self) -> &'static str {
        match self {
            DragModel::G1 => "G1",
            DragModel::G7 => "G7",
        }
    }
}

/// Wind as the bearing it blows from, relative to the line of fire:
/// 0 deg is a pure headwind, 90 deg blows from the shooter's right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed_mph: f64,
    pub direction_deg: f64,
}

/// Everything a trajectory simulator needs for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationRequest {
    pub drag_model: DragModel,
    pub ballistic_coefficient: f64,
    pub muzzle_velocity_fps: f64,
    pub wind: Option<Wind>,
    pub temperature_f: f64,
    pub pressure_inhg: f64,
    pub max_range_yds: f64,
    pub zero_range_yds: f64,
}

/// One simulated sample. Drop and windage are linear inches relative to the
/// line of sight; angular conversion happens later in the resampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub distance_yds: f64,
    pub drop_in: f64,
    pub windage_in: f64,
    pub time_sec: f64,
    pub velocity_fps: f64,
}

/// Sparse, strictly distance-ordered simulator output. Immutable once built;
/// the cache hands it out behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrajectoryTrace {
    pub points: Vec<TracePoint>,
}

impl TrajectoryTrace {
    /// First and last sampled distances, if any points exist.
    pub fn span_yds(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some((first.distance_yds, last.distance_yds))
    }

    /// Checks the invariants every consumer relies on: at least two points,
    /// strictly increasing distances.
    pub fn ensure_well_formed(&self) -> Result<(), SimulationError> {
        if self.points.len() < 2 {
            return Err(SimulationError::EmptyTrace);
        }
        let increasing = self
            .points
            .windows(2)
            .all(|pair| pair[0].distance_yds < pair[1].distance_yds);
        if !increasing {
            return Err(SimulationError::NonMonotonicTrace);
        }
        Ok(())
    }
}

/// The external physics collaborator. One call per cache miss; the engine
/// never invokes it directly.
pub trait TrajectorySimulator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produces a zero-calibrated trace spanning from muzzle to at least
    /// `request.max_range_yds`.
    fn trajectory(&self, request: &SimulationRequest) -> Result<TrajectoryTrace, SimulationError>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("simulation returned an empty or single-point trace")]
    EmptyTrace,
    #[error("trace distances are not strictly increasing")]
    NonMonotonicTrace,
    #[error("zero calibration did not converge after {iterations} iterations")]
    ZeroCalibration { iterations: u32 },
    #[error("integration exceeded {0} steps before reaching the requested range")]
    StepLimitExceeded(u32),
    #[error("trace reaches {covered_yds:.1} yd but {needed_yds:.1} yd were requested")]
    ShortTrace { covered_yds: f64, needed_yds: f64 },
    #[error("rejected simulation input: {0}")]
    InvalidInput(&'static str),
}
