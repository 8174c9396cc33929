use windscope::ballistics::{ResampleError, SimulationError};
use windscope::engine::SolveError;
use windscope::protocol::*;

#[test]
fn test_parse_ping_request() {
    let request = parse_request(r#"{"id":1,"request_type":"Ping"}"#).unwrap();

    assert_eq!(request.id, 1);
    assert!(matches!(request.request_type, RequestType::Ping));
}

#[test]
fn test_parse_simple_request_variants() {
    for (json, expected) in [
        (r#"{"id":2,"request_type":"Environment"}"#, "Environment"),
        (r#"{"id":3,"request_type":"Messages"}"#, "Messages"),
        (r#"{"id":4,"request_type":"Status"}"#, "Status"),
    ] {
        let request = parse_request(json).unwrap();
        let matched = matches!(
            (&request.request_type, expected),
            (RequestType::Environment, "Environment")
                | (RequestType::Messages, "Messages")
                | (RequestType::Status, "Status")
        );
        assert!(matched, "wrong variant for {}", json);
    }
}

#[test]
fn test_parse_solve_request_with_all_fields() {
    let json = r#"{"id":42,"request_type":{"Solve":{"bc_g7":0.25,"muzzle_velocity_fps":2700.0,"range_yds":600.0,"temp_f":48.0,"pressure_inhg":25.1,"wind_speed_mph":12.5,"wind_direction_deg":270.0,"use_telemetry":false,"sample_points":50}}}"#;
    let request = parse_request(json).unwrap();

    assert_eq!(request.id, 42);
    if let RequestType::Solve(solve) = request.request_type {
        assert_eq!(solve.bc_g7, 0.25);
        assert_eq!(solve.muzzle_velocity_fps, 2700.0);
        assert_eq!(solve.range_yds, 600.0);
        assert_eq!(solve.temp_f, Some(48.0));
        assert_eq!(solve.pressure_inhg, Some(25.1));
        assert_eq!(solve.wind_speed_mph, Some(12.5));
        assert_eq!(solve.wind_direction_deg, Some(270.0));
        assert!(!solve.use_telemetry);
        assert_eq!(solve.sample_points, Some(50));
    } else {
        panic!("Expected Solve request type");
    }
}

#[test]
fn test_parse_solve_request_omitted_fields_default() {
    // Auto-mode clients send only the three ballistic fields and the flag
    let json = r#"{"id":7,"request_type":{"Solve":{"bc_g7":0.25,"muzzle_velocity_fps":2700.0,"range_yds":600.0,"use_telemetry":true}}}"#;
    let request = parse_request(json).unwrap();

    if let RequestType::Solve(solve) = request.request_type {
        assert!(solve.use_telemetry);
        assert!(solve.temp_f.is_none());
        assert!(solve.pressure_inhg.is_none());
        assert!(solve.wind_speed_mph.is_none());
        assert!(solve.wind_direction_deg.is_none());
        assert!(solve.sample_points.is_none());
    } else {
        panic!("Expected Solve request type");
    }
}

#[test]
fn test_parse_rejects_oversize_request() {
    let padding = "x".repeat(MAX_REQUEST_SIZE);
    let json = format!(r#"{{"id":1,"request_type":"Ping","pad":"{}"}}"#, padding);

    assert!(matches!(
        parse_request(&json),
        Err(ProtocolError::MessageTooLarge)
    ));
}

#[test]
fn test_parse_rejects_malformed_json() {
    assert!(matches!(
        parse_request(r#"{"id":1,"request_type":"Ping""#),
        Err(ProtocolError::InvalidJson)
    ));
    assert!(matches!(parse_request(""), Err(ProtocolError::InvalidJson)));
    assert!(matches!(
        parse_request("not json"),
        Err(ProtocolError::InvalidJson)
    ));
}

#[test]
fn test_parse_rejects_unknown_request_type() {
    assert!(matches!(
        parse_request(r#"{"id":1,"request_type":"Reboot"}"#),
        Err(ProtocolError::InvalidJson)
    ));
}

#[test]
fn test_encode_pong_is_compact_and_ordered() {
    let response = Response {
        id: 7,
        timestamp: 1000,
        result: ResponseResult::Pong,
    };

    let json = encode_response(&response).unwrap();
    assert_eq!(json, r#"{"id":7,"timestamp":1000,"result":"Pong"}"#);
}

#[test]
fn test_error_response_structure() {
    let response = error_response(3, 99, ErrorKind::BadRequest, "unparseable line");
    let json = encode_response(&response).unwrap();

    assert!(json.contains(r#""Error""#));
    assert!(json.contains(r#""kind":"bad_request""#));
    assert!(json.contains(r#""detail":"unparseable line""#));
    assert_eq!(response.id, 3);
    assert_eq!(response.timestamp, 99);
}

#[test]
fn test_solve_errors_map_to_wire_kinds() {
    let validation = SolveError::Validation {
        field: "bc_g7",
        detail: "0.05 outside [0.1, 2]".to_string(),
    };
    let range = SolveError::RangeTooShort {
        requested_yds: 50.0,
        min_yds: 100.0,
    };
    let simulation = SolveError::Simulation(SimulationError::EmptyTrace);
    let resample = SolveError::Resample(ResampleError::EmptyTrace);

    assert_eq!(ErrorKind::from(&validation), ErrorKind::Validation);
    assert_eq!(ErrorKind::from(&range), ErrorKind::RangeTooShort);
    assert_eq!(ErrorKind::from(&simulation), ErrorKind::Simulation);
    assert_eq!(ErrorKind::from(&resample), ErrorKind::Simulation);
}

#[test]
fn test_solve_error_response_carries_display_text() {
    let error = SolveError::RangeTooShort {
        requested_yds: 50.0,
        min_yds: 100.0,
    };
    let response = solve_error_response(9, 1234, &error);

    assert_eq!(response.id, 9);
    if let ResponseResult::Error { kind, detail } = response.result {
        assert_eq!(kind, ErrorKind::RangeTooShort);
        assert!(detail.contains("50"), "detail was {:?}", detail);
        assert!(detail.contains("100"));
    } else {
        panic!("Expected Error result");
    }
}

#[test]
fn test_error_kind_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&ErrorKind::RangeTooShort).unwrap(),
        r#""range_too_short""#
    );
    assert_eq!(
        serde_json::to_string(&ErrorKind::DeviceUnavailable).unwrap(),
        r#""device_unavailable""#
    );

    let back: ErrorKind = serde_json::from_str(r#""validation""#).unwrap();
    assert_eq!(back, ErrorKind::Validation);
}

#[test]
fn test_encode_rejects_oversize_response() {
    let response = error_response(1, 0, ErrorKind::Simulation, &"y".repeat(MAX_RESPONSE_SIZE));

    assert_eq!(
        encode_response(&response),
        Err(ProtocolError::MessageTooLarge)
    );
}

#[test]
fn test_request_round_trip() {
    let request = Request {
        id: 11,
        request_type: RequestType::Ping,
    };
    let json = serde_json::to_string(&request).unwrap();
    let back = parse_request(&json).unwrap();

    assert_eq!(back.id, 11);
    assert!(matches!(back.request_type, RequestType::Ping));
}

#[test]
fn test_protocol_error_messages() {
    assert_eq!(ProtocolError::InvalidJson.to_string(), "Invalid JSON format");
    assert_eq!(
        ProtocolError::MessageTooLarge.to_string(),
        "Message exceeds buffer size"
    );
    assert_eq!(
        ProtocolError::SerializationFailed.to_string(),
        "Serialization failed"
    );
}
