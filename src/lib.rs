//! # Windscope
//!
//! A field ballistics library combining live environmental telemetry from a
//! serial wind sensor with a cached point-mass trajectory solver, producing
//! dense, smoothly interpolated firing solutions.
//!
//! ## Features
//!
//! - **Live wind telemetry**: background serial receiver with device
//!   fallback, automatic reconnect, and two wire formats
//! - **Trajectory solving**: G1/G7 point-mass simulation with zero-distance
//!   calibration, swappable behind a trait
//! - **Smooth resampling**: natural cubic splines onto an even grid, with
//!   pointwise MOA conversion and fixed rounding
//! - **Solution memoization**: bounded LRU cache keyed on exact input bits
//! - **Auto or manual conditions**: one flag switches the solver between
//!   request-supplied and sensor-supplied environment values
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use windscope::config::EnvironmentSection;
//! use windscope::{
//!     EngineSettings, PointMassSimulator, SolutionEngine, SolveRequest, TelemetryStore,
//! };
//!
//! // Wire a solver to a fresh store seeded with standard conditions
//! let store = Arc::new(TelemetryStore::new(
//!     EnvironmentSection::default().initial_reading(),
//! ));
//! let engine = SolutionEngine::new(
//!     Arc::new(PointMassSimulator::new()),
//!     store,
//!     EngineSettings::default(),
//! );
//!
//! // Solve with manual conditions
//! let request = SolveRequest {
//!     bc_g7: 0.25,
//!     muzzle_velocity_fps: 2700.0,
//!     range_yds: 600.0,
//!     temp_f: Some(59.0),
//!     pressure_inhg: Some(29.92),
//!     wind_speed_mph: Some(10.0),
//!     wind_direction_deg: Some(90.0),
//!     use_telemetry: false,
//!     sample_points: None,
//! };
//!
//! if let Ok(solution) = engine.solve(&request) {
//!     println!("hold {} MOA at {} yd", solution.drop_moa, request.range_yds);
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`wire`] - Telemetry line decoding (keyed JSON and framed text formats)
//! - [`link`] - Supervised serial receiver thread with reconnect
//! - [`store`] - Latest-reading snapshot plus a drainable message backlog
//! - [`ballistics`] - Simulation contract, point-mass solver, spline resampler
//! - [`cache`] - Bounded LRU memoization of simulation traces
//! - [`engine`] - Solve orchestration, validation, and condition sourcing
//! - [`protocol`] - Request/response framing for the TCP service
//! - [`config`] - Layered file and environment configuration

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::doc_markdown)]

pub mod ballistics;
pub mod cache;
pub mod config;
pub mod engine;
pub mod link;
pub mod protocol;
pub mod store;
pub mod wire;

// Re-export main public types for convenience
pub use ballistics::{
    BallisticInputs, PointMassSimulator, TrajectorySimulator, TrajectoryTrace,
};
pub use cache::SolutionCache;
pub use engine::{EngineSettings, FiringSolution, SolutionEngine, SolveError, SolveRequest};
pub use link::{LinkConfig, LinkHandle, LinkReport};
pub use store::{EnvironmentalReading, TelemetryStore};
pub use wire::TelemetryMessage;
