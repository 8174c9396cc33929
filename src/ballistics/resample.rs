use super::spline::{CubicSpline, SplineError};
use super::TrajectoryTrace;
use serde::{Deserialize, Serialize};

/// One minute of angle subtends about 1.047 inches per 100 yards.
pub const MOA_INCHES_PER_100YDS: f64 = 1.047;

const ANGULAR_DECIMALS: u32 = 3;
const TIME_DECIMALS: u32 = 3;
const VELOCITY_DECIMALS: u32 = 1;

/// Dense, evenly spaced solution arrays. Rebuilt on every request, even when
/// the underlying trace was a cache hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledTrajectory {
    pub range_yds: Vec<f64>,
    pub drop_moa: Vec<f64>,
    pub windage_moa: Vec<f64>,
    pub time_sec: Vec<f64>,
    pub velocity_fps: Vec<f64>,
}

/// Resamples a sparse trace onto `points` evenly spaced distances covering
/// `[start_yds, end_yds]` inclusive.
///
/// The window must lie inside the trace span; this never extrapolates. Each
/// channel gets its own natural cubic spline over the trace distances. Drop
/// and windage are converted from linear inches to minutes of angle using
/// each sample's own distance, then all channels are rounded to fixed
/// per-channel precision for reproducible output.
pub fn resample_trace(
    trace: &TrajectoryTrace,
    start_yds: f64,
    end_yds: f64,
    points: usize,
) -> Result<ResampledTrajectory, ResampleError> {
    if points < 2 {
        return Err(ResampleError::TooFewPoints { requested: points });
    }
    let (trace_min_yds, trace_max_yds) = trace.span_yds().ok_or(ResampleError::EmptyTrace)?;
    if end_yds < start_yds {
        return Err(ResampleError::InvertedWindow { start_yds, end_yds });
    }
    if start_yds < trace_min_yds || end_yds > trace_max_yds {
        return Err(ResampleError::OutOfBounds {
            start_yds,
            end_yds,
            trace_min_yds,
            trace_max_yds,
        });
    }

    let distances: Vec<f64> = trace.points.iter().map(|p| p.distance_yds).collect();
    let drops: Vec<f64> = trace.points.iter().map(|p| p.drop_in).collect();
    let windages: Vec<f64> = trace.points.iter().map(|p| p.windage_in).collect();
    let times: Vec<f64> = trace.points.iter().map(|p| p.time_sec).collect();
    let velocities: Vec<f64> = trace.points.iter().map(|p| p.velocity_fps).collect();

    let drop_spline = CubicSpline::new(&distances, &drops)?;
    let windage_spline = CubicSpline::new(&distances, &windages)?;
    let time_spline = CubicSpline::new(&distances, &times)?;
    let velocity_spline = CubicSpline::new(&distances, &velocities)?;

    let step = (end_yds - start_yds) / (points - 1) as f64;
    let mut resampled = ResampledTrajectory {
        range_yds: Vec::with_capacity(points),
        drop_moa: Vec::with_capacity(points),
        windage_moa: Vec::with_capacity(points),
        time_sec: Vec::with_capacity(points),
        velocity_fps: Vec::with_capacity(points),
    };

    for i in 0..points {
        // Pin the endpoints so accumulated step error never shifts them.
        let distance = if i == 0 {
            start_yds
        } else if i == points - 1 {
            end_yds
        } else {
            start_yds + step * i as f64
        };

        resampled.range_yds.push(distance);
        resampled.drop_moa.push(round_to(
            linear_to_moa(drop_spline.evaluate(distance), distance),
            ANGULAR_DECIMALS,
        ));
        resampled.windage_moa.push(round_to(
            linear_to_moa(windage_spline.evaluate(distance), distance),
            ANGULAR_DECIMALS,
        ));
        resampled
            .time_sec
            .push(round_to(time_spline.evaluate(distance), TIME_DECIMALS));
        resampled.velocity_fps.push(round_to(
            velocity_spline.evaluate(distance),
            VELOCITY_DECIMALS,
        ));
    }

    Ok(resampled)
}

/// Converts a linear offset in inches to minutes of angle at a distance.
///
/// Subtension scales with distance, so the same linear offset reads as half
/// the angle at twice the range. Zero distance has no defined subtension and
/// maps to zero.
pub fn linear_to_moa(linear_in: f64, distance_yds: f64) -> f64 {
    if distance_yds <= 0.0 {
        return 0.0;
    }
    linear_in / ((distance_yds / 100.0) * MOA_INCHES_PER_100YDS)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResampleError {
    TooFewPoints {
        requested: usize,
    },
    EmptyTrace,
    InvertedWindow {
        start_yds: f64,
        end_yds: f64,
    },
    OutOfBounds {
        start_yds: f64,
        end_yds: f64,
        trace_min_yds: f64,
        trace_max_yds: f64,
    },
    Spline(SplineError),
}

impl core::fmt::Display for ResampleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ResampleError::TooFewPoints { requested } => {
                write!(f, "at least 2 sample points required, got {}", requested)
            }
            ResampleError::EmptyTrace => write!(f, "trace has no samples"),
            ResampleError::InvertedWindow { start_yds, end_yds } => {
                write!(f, "window end {} yd is before start {} yd", end_yds, start_yds)
            }
            ResampleError::OutOfBounds {
                start_yds,
                end_yds,
                trace_min_yds,
                trace_max_yds,
            } => write!(
                f,
                "window [{}, {}] yd extends outside trace span [{}, {}] yd",
                start_yds, end_yds, trace_min_yds, trace_max_yds
            ),
            ResampleError::Spline(e) => write!(f, "spline construction failed: {}", e),
        }
    }
}

impl std::error::Error for ResampleError {}

impl From<SplineError> for ResampleError {
    fn from(e: SplineError) -> Self {
        ResampleError::Spline(e)
    }
}
