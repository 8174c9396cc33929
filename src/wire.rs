use serde::{Deserialize, Serialize};

/// Positional fields carried by an `ENV` payload:
/// windSpeed, hitFlag, windDirection, latitude, longitude, imuSensitivity.
pub const ENV_FIELD_COUNT: usize = 6;

/// One decoded line from the telemetry downlink.
///
/// Decoding never fails: a line that matches neither wire format is kept
/// verbatim as `Raw` so nothing from the sensor is silently discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryMessage {
    Environment(EnvironmentReport),
    Alert { sender: String, text: String },
    Raw { text: String },
}

/// Environmental fields reported by a sensor node.
///
/// Wind speed is the only field both wire formats guarantee; everything else
/// is optional so the store can replace exactly the fields a message
/// provides and leave the rest untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReport {
    #[serde(default)]
    pub sender: String,
    pub wind_speed_mph: f64,
    pub wind_direction_deg: Option<f64>,
    pub hit: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub imu_sensitivity: Option<f64>,
    pub temperature_f: Option<f64>,
    pub pressure_inhg: Option<f64>,
}

// Keyed-object wire format. Field names are tolerant because sensor firmware
// revisions have used both snake_case and camelCase keys.
#[derive(Debug, Deserialize)]
struct KeyedReport {
    #[serde(default)]
    sender: String,
    #[serde(alias = "windSpeed", alias = "wind_speed")]
    wind_speed_mph: Option<f64>,
    #[serde(default, alias = "windDirection", alias = "wind_direction")]
    wind_direction_deg: Option<f64>,
    #[serde(default, alias = "hitFlag")]
    hit: Option<bool>,
    #[serde(default, alias = "lat")]
    latitude: Option<f64>,
    #[serde(default, alias = "lon", alias = "lng")]
    longitude: Option<f64>,
    #[serde(default, alias = "imuSensitivity")]
    imu_sensitivity: Option<f64>,
    #[serde(default, alias = "tempF", alias = "temp_f")]
    temperature_f: Option<f64>,
    #[serde(default, alias = "pressureInhg", alias = "pressure")]
    pressure_inhg: Option<f64>,
}

/// Decodes one newline-stripped line from the serial stream.
///
/// Formats, tried in order:
/// 1. keyed object text (`{...}` with at least a wind-speed field),
/// 2. `sender:TYPE:payload` where TYPE is `ENV` or `ALERT`.
///
/// Anything else, including an empty line, degrades to `Raw` with the
/// original text preserved.
pub fn decode_line(line: &str) -> TelemetryMessage {
    let trimmed = line.trim();

    if trimmed.starts_with('{') {
        if let Some(report) = decode_keyed(trimmed) {
            return TelemetryMessage::Environment(report);
        }
        return raw(line);
    }

    match decode_framed(trimmed) {
        Some(message) => message,
        None => raw(line),
    }
}

fn raw(line: &str) -> TelemetryMessage {
    TelemetryMessage::Raw {
        text: line.to_string(),
    }
}

fn decode_keyed(text: &str) -> Option<EnvironmentReport> {
    let keyed: KeyedReport = serde_json::from_str(text).ok()?;
    let wind_speed_mph = keyed.wind_speed_mph?;

    Some(EnvironmentReport {
        sender: keyed.sender,
        wind_speed_mph,
        wind_direction_deg: keyed.wind_direction_deg,
        hit: keyed.hit,
        latitude: keyed.latitude,
        longitude: keyed.longitude,
        imu_sensitivity: keyed.imu_sensitivity,
        temperature_f: keyed.temperature_f,
        pressure_inhg: keyed.pressure_inhg,
    })
}

fn decode_framed(text: &str) -> Option<TelemetryMessage> {
    let mut parts = text.splitn(3, ':');
    let sender = parts.next()?;
    let kind = parts.next()?;
    let payload = parts.next()?;

    if sender.is_empty() {
        return None;
    }

    match kind {
        "ENV" => decode_env_payload(sender, payload).map(TelemetryMessage::Environment),
        "ALERT" => Some(TelemetryMessage::Alert {
            sender: sender.to_string(),
            text: payload.to_string(),
        }),
        _ => None,
    }
}

fn decode_env_payload(sender: &str, payload: &str) -> Option<EnvironmentReport> {
    let mut values = [0.0_f64; ENV_FIELD_COUNT];
    let mut fields = payload.split(',');

    for slot in values.iter_mut() {
        *slot = fields.next()?.trim().parse().ok()?;
    }
    // Fields beyond the sixth are ignored by contract.

    Some(EnvironmentReport {
        sender: sender.to_string(),
        wind_speed_mph: values[0],
        wind_direction_deg: Some(values[2]),
        hit: Some(values[1] != 0.0),
        latitude: Some(values[3]),
        longitude: Some(values[4]),
        imu_sensitivity: Some(values[5]),
        temperature_f: None,
        pressure_inhg: None,
    })
}
