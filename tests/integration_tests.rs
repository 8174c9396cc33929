use std::collections::VecDeque;
use std::io::{self, Cursor, Read};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use windscope::engine::{ConditionSource, EngineSettings, SolutionEngine, SolveRequest};
use windscope::link::{self, LinkConfig, PortOpener};
use windscope::protocol::{
    encode_response, error_response, parse_request, solve_error_response, ErrorKind, Request,
    RequestType, Response, ResponseResult,
};
use windscope::store::{now_millis, EnvironmentalReading, TelemetryStore};
use windscope::PointMassSimulator;

fn build_engine() -> (SolutionEngine, Arc<TelemetryStore>) {
    let store = Arc::new(TelemetryStore::new(EnvironmentalReading {
        wind_speed_mph: 0.0,
        wind_direction_deg: 0.0,
        temperature_f: 59.0,
        pressure_inhg: 29.92,
        timestamp_ms: 0,
    }));
    let engine = SolutionEngine::new(
        Arc::new(PointMassSimulator::new()),
        Arc::clone(&store),
        EngineSettings::default(),
    );
    (engine, store)
}

fn manual_request(range_yds: f64, wind_speed_mph: f64, wind_direction_deg: f64) -> SolveRequest {
    SolveRequest {
        bc_g7: 0.25,
        muzzle_velocity_fps: 2700.0,
        range_yds,
        temp_f: Some(59.0),
        pressure_inhg: Some(29.92),
        wind_speed_mph: Some(wind_speed_mph),
        wind_direction_deg: Some(wind_direction_deg),
        use_telemetry: false,
        sample_points: None,
    }
}

#[test]
fn test_solve_round_trip_over_the_wire() {
    let (engine, _store) = build_engine();

    let json = r#"{"id":42,"request_type":{"Solve":{"bc_g7":0.25,"muzzle_velocity_fps":2700.0,"range_yds":600.0,"temp_f":59.0,"pressure_inhg":29.92,"wind_speed_mph":10.0,"wind_direction_deg":90.0,"use_telemetry":false}}}"#;
    let request = parse_request(json).unwrap();

    let solve = match request.request_type {
        RequestType::Solve(solve) => solve,
        other => panic!("Expected solve, got {:?}", other),
    };
    let solution = engine.solve(&solve).unwrap();
    let response = Response {
        id: request.id,
        timestamp: now_millis(),
        result: ResponseResult::Solution(solution),
    };

    let encoded = encode_response(&response).unwrap();
    let decoded: Response = serde_json::from_str(&encoded).unwrap();

    assert_eq!(decoded.id, 42);
    if let ResponseResult::Solution(solution) = decoded.result {
        assert_eq!(solution.range_yds.len(), 100);
        assert_eq!(solution.range_yds[0], 100.0);
        assert_eq!(*solution.range_yds.last().unwrap(), 600.0);
        assert!(matches!(solution.applied.source, ConditionSource::Manual));
    } else {
        panic!("Expected solution result");
    }
}

#[test]
fn test_trajectory_physics_properties() {
    let (engine, _store) = build_engine();
    let solution = engine.solve(&manual_request(600.0, 10.0, 90.0)).unwrap();

    // Ranges, times, and velocities move the only directions physics allows
    for pair in solution.range_yds.windows(2) {
        assert!(pair[0] < pair[1]);
    }
    for pair in solution.time_array_sec.windows(2) {
        assert!(pair[0] < pair[1], "time went backwards: {:?}", pair);
    }
    for pair in solution.velocity_array_fps.windows(2) {
        assert!(pair[0] > pair[1], "bullet sped up: {:?}", pair);
    }

    // Nearly flat at the 100 yd zero, well below the sight line at 600
    let first_drop = solution.drop_array_moa[0];
    let mid_drop = solution.drop_array_moa[50];
    let last_drop = *solution.drop_array_moa.last().unwrap();
    assert!(first_drop.abs() < 0.5, "drop at zero range was {}", first_drop);
    assert!(last_drop < mid_drop);
    assert!(last_drop < -5.0, "drop at 600 yd was only {} MOA", last_drop);

    // Wind from the shooter's right pushes the bullet left
    let last_windage = *solution.windage_array_moa.last().unwrap();
    assert!(last_windage < -1.0, "windage was {} MOA", last_windage);
}

#[test]
fn test_wind_from_the_left_gives_positive_windage() {
    let (engine, _store) = build_engine();
    let solution = engine.solve(&manual_request(600.0, 10.0, 270.0)).unwrap();

    assert!(*solution.windage_array_moa.last().unwrap() > 1.0);
}

#[test]
fn test_pure_headwind_has_no_windage() {
    let (engine, _store) = build_engine();
    let solution = engine.solve(&manual_request(600.0, 15.0, 0.0)).unwrap();

    for windage in &solution.windage_array_moa {
        assert_eq!(*windage, 0.0);
    }
}

#[test]
fn test_headwind_costs_velocity() {
    let (engine, _store) = build_engine();

    let calm = engine.solve(&manual_request(600.0, 0.0, 0.0)).unwrap();
    let headwind = engine.solve(&manual_request(600.0, 15.0, 0.0)).unwrap();

    assert!(headwind.velocity_at_target_fps < calm.velocity_at_target_fps);
    assert!(headwind.time_of_flight_sec > calm.time_of_flight_sec);
}

#[test]
fn test_calm_air_has_no_windage_at_all() {
    let (engine, _store) = build_engine();
    let solution = engine.solve(&manual_request(600.0, 0.0, 0.0)).unwrap();

    for windage in &solution.windage_array_moa {
        assert_eq!(*windage, 0.0);
    }
}

#[test]
fn test_different_ranges_are_separate_cache_entries() {
    let (engine, _store) = build_engine();

    let near = engine.solve(&manual_request(300.0, 10.0, 90.0)).unwrap();
    let far = engine.solve(&manual_request(600.0, 10.0, 90.0)).unwrap();

    assert!(far.drop_moa < near.drop_moa);
    assert_eq!(engine.cache_stats().entries, 2);
    assert_eq!(engine.cache_stats().misses, 2);
}

#[test]
fn test_solve_error_travels_the_wire_intact() {
    let (engine, _store) = build_engine();

    let error = engine
        .solve(&manual_request(50.0, 10.0, 90.0))
        .expect_err("50 yd must be under the minimum");
    let response = solve_error_response(3, now_millis(), &error);
    let encoded = encode_response(&response).unwrap();
    let decoded: Response = serde_json::from_str(&encoded).unwrap();

    if let ResponseResult::Error { kind, detail } = decoded.result {
        assert_eq!(kind, ErrorKind::RangeTooShort);
        assert!(detail.contains("50"));
    } else {
        panic!("Expected error result");
    }
}

#[test]
fn test_unparseable_request_maps_to_bad_request() {
    let parse_error = parse_request("definitely not json").unwrap_err();
    let response = error_response(0, now_millis(), ErrorKind::BadRequest, &parse_error.to_string());
    let encoded = encode_response(&response).unwrap();

    assert!(encoded.contains(r#""kind":"bad_request""#));
    assert!(encoded.contains("Invalid JSON format"));
}

#[test]
fn test_request_ids_echo_back_unchanged() {
    let (engine, _store) = build_engine();
    let request = Request {
        id: 777,
        request_type: RequestType::Solve(manual_request(600.0, 0.0, 0.0)),
    };
    let json = serde_json::to_string(&request).unwrap();
    let parsed = parse_request(&json).unwrap();

    let solve = match parsed.request_type {
        RequestType::Solve(solve) => solve,
        other => panic!("Expected solve, got {:?}", other),
    };
    let response = Response {
        id: parsed.id,
        timestamp: now_millis(),
        result: ResponseResult::Solution(engine.solve(&solve).unwrap()),
    };

    assert_eq!(response.id, 777);
}

/// Serial feed for the full pipeline test below.
struct ScriptedOpener {
    feeds: Mutex<VecDeque<Vec<u8>>>,
}

impl PortOpener for ScriptedOpener {
    fn open(
        &self,
        _path: &str,
        _baud_rate: u32,
        _read_timeout: Duration,
    ) -> io::Result<Box<dyn Read + Send>> {
        match self.feeds.lock().unwrap().pop_front() {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "script exhausted")),
        }
    }
}

#[test]
fn test_sensor_line_to_auto_solution_pipeline() {
    let (engine, store) = build_engine();
    let feed =
        br#"{"sender":"anem1","windSpeed":12.5,"windDirection":270.0,"tempF":48.0,"pressureInhg":25.1}"#;
    let mut line = feed.to_vec();
    line.push(b'\n');
    let opener = Arc::new(ScriptedOpener {
        feeds: Mutex::new(VecDeque::from(vec![line])),
    });

    let config = LinkConfig {
        device_paths: vec!["scripted0".to_string()],
        baud_rate: 9600,
        reconnect_delay: Duration::from_millis(10),
        read_timeout: Duration::from_millis(10),
    };
    let mut handle = link::spawn(config, Arc::clone(&store), opener);

    let deadline = Instant::now() + Duration::from_secs(2);
    while store.stats().environment_updates == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    handle.stop().unwrap();
    assert_eq!(store.stats().environment_updates, 1, "feed never landed");

    let request = SolveRequest {
        use_telemetry: true,
        temp_f: None,
        pressure_inhg: None,
        wind_speed_mph: None,
        wind_direction_deg: None,
        ..manual_request(600.0, 0.0, 0.0)
    };
    let solution = engine.solve(&request).unwrap();

    assert!(matches!(solution.applied.source, ConditionSource::Telemetry));
    assert_eq!(solution.applied.wind_speed_mph, 12.5);
    assert_eq!(solution.applied.wind_direction_deg, 270.0);
    assert_eq!(solution.applied.temperature_f, 48.0);
    assert_eq!(solution.applied.pressure_inhg, 25.1);
    // Wind from the left at 600 yd reads as a right hold
    assert!(*solution.windage_array_moa.last().unwrap() > 1.0);
}
