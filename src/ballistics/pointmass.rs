//! Bundled flat-fire point-mass simulator.
//!
//! Three degrees of freedom, standard drag functions, semi-implicit Euler
//! integration with a fixed time step. This is the default collaborator
//! behind [`TrajectorySimulator`]; anything honoring that trait's contract
//! can stand in for it.

use super::{
    DragModel, SimulationError, SimulationRequest, TracePoint, TrajectorySimulator,
    TrajectoryTrace,
};

pub const MAX_INTEGRATION_STEPS: u32 = 2_000_000;

const TIME_STEP_SEC: f64 = 0.000_25;
const RECORD_INTERVAL_YDS: f64 = 1.0;
const SIGHT_HEIGHT_IN: f64 = 1.5;
const GRAVITY_FPS2: f64 = 32.174;
const FEET_PER_YARD: f64 = 3.0;
const MPH_TO_FPS: f64 = 5280.0 / 3600.0;
const MIN_VELOCITY_FPS: f64 = 50.0;
// A trajectory falling more than this many times faster than it advances is
// terminally plunging and will never reach the stop distance.
const MAX_PLUNGE_RATIO: f64 = 3.0;

const STANDARD_PRESSURE_INHG: f64 = 29.92;
const STANDARD_TEMPERATURE_R: f64 = 518.67;
const RANKINE_OFFSET: f64 = 459.67;

// Standard-projectile retardation: rho0 * pi / (8 * 144) in imperial units,
// applied per unit Cd and divided by the ballistic coefficient.
const DRAG_RETARDATION: f64 = 2.0856e-4;

const ZERO_MAX_ITERATIONS: u32 = 12;
const ZERO_TOLERANCE_IN: f64 = 0.01;

/// Mach to drag coefficient, G1 standard projectile.
const G1_DRAG: [(f64, f64); 21] = [
    (0.0, 0.2629),
    (0.5, 0.2695),
    (0.6, 0.2752),
    (0.7, 0.2817),
    (0.8, 0.2902),
    (0.9, 0.3012),
    (1.0, 0.4805),
    (1.1, 0.5933),
    (1.2, 0.6318),
    (1.3, 0.6440),
    (1.4, 0.6444),
    (1.5, 0.6372),
    (1.6, 0.6252),
    (1.7, 0.6105),
    (1.8, 0.5956),
    (1.9, 0.5815),
    (2.0, 0.5934),
    (2.5, 0.5598),
    (3.0, 0.5133),
    (4.0, 0.4811),
    (5.0, 0.4988),
];

/// Mach to drag coefficient, G7 standard projectile (boat-tail).
const G7_DRAG: [(f64, f64); 21] = [
    (0.0, 0.1198),
    (0.5, 0.1197),
    (0.6, 0.1202),
    (0.7, 0.1213),
    (0.8, 0.1240),
    (0.9, 0.1294),
    (1.0, 0.3803),
    (1.1, 0.4015),
    (1.2, 0.4043),
    (1.3, 0.3956),
    (1.4, 0.3814),
    (1.5, 0.3663),
    (1.6, 0.3520),
    (1.7, 0.3398),
    (1.8, 0.3297),
    (1.9, 0.3221),
    (2.0, 0.2980),
    (2.5, 0.2731),
    (3.0, 0.2424),
    (4.0, 0.2196),
    (5.0, 0.1618),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PointMassSimulator;

impl PointMassSimulator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TrajectorySimulator for PointMassSimulator {
    fn name(&self) -> &'static str {
        "point-mass"
    }

    fn trajectory(&self, request: &SimulationRequest) -> Result<TrajectoryTrace, SimulationError> {
        validate(request)?;
        let launch_angle_rad = zero_angle(request)?;

        let mut points = Vec::with_capacity(request.max_range_yds as usize + 2);
        fly(
            request,
            launch_angle_rad,
            request.max_range_yds,
            Some(&mut points),
        )?;

        let trace = TrajectoryTrace { points };
        trace.ensure_well_formed()?;
        Ok(trace)
    }
}

fn validate(request: &SimulationRequest) -> Result<(), SimulationError> {
    if request.ballistic_coefficient <= 0.0 || !request.ballistic_coefficient.is_finite() {
        return Err(SimulationError::InvalidInput(
            "ballistic coefficient must be positive",
        ));
    }
    if request.muzzle_velocity_fps <= 0.0 || !request.muzzle_velocity_fps.is_finite() {
        return Err(SimulationError::InvalidInput(
            "muzzle velocity must be positive",
        ));
    }
    if request.max_range_yds <= 0.0 || !request.max_range_yds.is_finite() {
        return Err(SimulationError::InvalidInput(
            "maximum range must be positive",
        ));
    }
    if request.zero_range_yds <= 0.0 || !request.zero_range_yds.is_finite() {
        return Err(SimulationError::InvalidInput(
            "zero range must be positive",
        ));
    }
    if request.temperature_f <= -RANKINE_OFFSET || !request.temperature_f.is_finite() {
        return Err(SimulationError::InvalidInput(
            "temperature must be above absolute zero",
        ));
    }
    if request.pressure_inhg <= 0.0 || !request.pressure_inhg.is_finite() {
        return Err(SimulationError::InvalidInput(
            "pressure must be positive",
        ));
    }
    if let Some(wind) = request.wind {
        if wind.speed_mph < 0.0 || !wind.speed_mph.is_finite() {
            return Err(SimulationError::InvalidInput(
                "wind speed must be non-negative",
            ));
        }
        if !wind.direction_deg.is_finite() {
            return Err(SimulationError::InvalidInput(
                "wind direction must be finite",
            ));
        }
    }
    Ok(())
}

/// Finds the launch angle that puts the trajectory on the line of sight at
/// the zero range, by repeated small-angle correction.
fn zero_angle(request: &SimulationRequest) -> Result<f64, SimulationError> {
    let zero_range_ft = request.zero_range_yds * FEET_PER_YARD;
    let mut angle_rad = 0.0;

    for _ in 0..ZERO_MAX_ITERATIONS {
        let height_in = fly(request, angle_rad, request.zero_range_yds, None)?;
        if height_in.abs() <= ZERO_TOLERANCE_IN {
            return Ok(angle_rad);
        }
        angle_rad -= (height_in / 12.0) / zero_range_ft;
    }

    Err(SimulationError::ZeroCalibration {
        iterations: ZERO_MAX_ITERATIONS,
    })
}

/// Integrates one flight out to `stop_yds` and returns the height above the
/// line of sight there, in inches. When `record` is given, samples are pushed
/// roughly every yard, plus the muzzle state and a final point at or past the
/// stop distance.
fn fly(
    request: &SimulationRequest,
    launch_angle_rad: f64,
    stop_yds: f64,
    mut record: Option<&mut Vec<TracePoint>>,
) -> Result<f64, SimulationError> {
    let stop_ft = stop_yds * FEET_PER_YARD;
    let sound_fps = speed_of_sound_fps(request.temperature_f);
    let density = density_ratio(request.pressure_inhg, request.temperature_f);
    let bc = request.ballistic_coefficient;

    let (wind_x_fps, wind_z_fps) = match request.wind {
        Some(wind) => {
            let speed_fps = wind.speed_mph * MPH_TO_FPS;
            let bearing_rad = wind.direction_deg.to_radians();
            // Bearing is where the wind blows FROM: a 0 deg headwind moves
            // air toward the shooter, 90 deg pushes the bullet leftward.
            (-speed_fps * bearing_rad.cos(), -speed_fps * bearing_rad.sin())
        }
        None => (0.0, 0.0),
    };

    // x downrange, y above the line of sight, z to the right, all in feet.
    let mut x_ft = 0.0_f64;
    let mut y_ft = -SIGHT_HEIGHT_IN / 12.0;
    let mut z_ft = 0.0_f64;
    let mut vx_fps = request.muzzle_velocity_fps * launch_angle_rad.cos();
    let mut vy_fps = request.muzzle_velocity_fps * launch_angle_rad.sin();
    let mut vz_fps = 0.0_f64;
    let mut time_sec = 0.0_f64;

    if let Some(points) = record.as_mut() {
        points.push(TracePoint {
            distance_yds: 0.0,
            drop_in: -SIGHT_HEIGHT_IN,
            windage_in: 0.0,
            time_sec: 0.0,
            velocity_fps: request.muzzle_velocity_fps,
        });
    }

    let mut next_record_yds = RECORD_INTERVAL_YDS;
    let mut steps = 0_u32;

    let height_at_stop_in = loop {
        steps += 1;
        if steps > MAX_INTEGRATION_STEPS {
            return Err(SimulationError::StepLimitExceeded(MAX_INTEGRATION_STEPS));
        }

        let air_x = vx_fps - wind_x_fps;
        let air_y = vy_fps;
        let air_z = vz_fps - wind_z_fps;
        let v_air = (air_x * air_x + air_y * air_y + air_z * air_z).sqrt();
        if v_air < MIN_VELOCITY_FPS || vx_fps <= 0.0 || vy_fps.abs() > vx_fps * MAX_PLUNGE_RATIO {
            return Err(SimulationError::ShortTrace {
                covered_yds: x_ft / FEET_PER_YARD,
                needed_yds: stop_yds,
            });
        }

        let mach = v_air / sound_fps;
        let cd = drag_coefficient(mach, request.drag_model);
        let retard = density * v_air * cd * DRAG_RETARDATION / bc;

        let prev_x_ft = x_ft;
        let prev_y_ft = y_ft;

        vx_fps -= retard * air_x * TIME_STEP_SEC;
        vy_fps -= (retard * air_y + GRAVITY_FPS2) * TIME_STEP_SEC;
        vz_fps -= retard * air_z * TIME_STEP_SEC;
        x_ft += vx_fps * TIME_STEP_SEC;
        y_ft += vy_fps * TIME_STEP_SEC;
        z_ft += vz_fps * TIME_STEP_SEC;
        time_sec += TIME_STEP_SEC;

        let distance_yds = x_ft / FEET_PER_YARD;
        if distance_yds >= next_record_yds {
            if let Some(points) = record.as_mut() {
                points.push(TracePoint {
                    distance_yds,
                    drop_in: y_ft * 12.0,
                    windage_in: z_ft * 12.0,
                    time_sec,
                    velocity_fps: (vx_fps * vx_fps + vy_fps * vy_fps + vz_fps * vz_fps).sqrt(),
                });
            }
            next_record_yds = distance_yds.floor() + RECORD_INTERVAL_YDS;
        }

        if x_ft >= stop_ft {
            let span_ft = x_ft - prev_x_ft;
            let fraction = if span_ft > 0.0 {
                (stop_ft - prev_x_ft) / span_ft
            } else {
                1.0
            };
            break (prev_y_ft + fraction * (y_ft - prev_y_ft)) * 12.0;
        }
    };

    if let Some(points) = record.as_mut() {
        let covered_yds = points.last().map_or(0.0, |p| p.distance_yds);
        if covered_yds < stop_yds {
            points.push(TracePoint {
                distance_yds: x_ft / FEET_PER_YARD,
                drop_in: y_ft * 12.0,
                windage_in: z_ft * 12.0,
                time_sec,
                velocity_fps: (vx_fps * vx_fps + vy_fps * vy_fps + vz_fps * vz_fps).sqrt(),
            });
        }
    }

    Ok(height_at_stop_in)
}

fn speed_of_sound_fps(temperature_f: f64) -> f64 {
    49.0223 * (temperature_f + RANKINE_OFFSET).sqrt()
}

fn density_ratio(pressure_inhg: f64, temperature_f: f64) -> f64 {
    (pressure_inhg / STANDARD_PRESSURE_INHG)
        * (STANDARD_TEMPERATURE_R / (temperature_f + RANKINE_OFFSET))
}

/// Linear interpolation over the drag table, clamped at both ends.
fn drag_coefficient(mach: f64, model: DragModel) -> f64 {
    let table: &[(f64, f64)] = match model {
        DragModel::G1 => &G1_DRAG,
        DragModel::G7 => &G7_DRAG,
    };

    let (first_mach, first_cd) = table[0];
    if mach <= first_mach {
        return first_cd;
    }
    let (last_mach, last_cd) = table[table.len() - 1];
    if mach >= last_mach {
        return last_cd;
    }

    for pair in table.windows(2) {
        let (m0, cd0) = pair[0];
        let (m1, cd1) = pair[1];
        if mach >= m0 && mach <= m1 {
            let t = (mach - m0) / (m1 - m0);
            return cd0 + t * (cd1 - cd0);
        }
    }

    last_cd
}
