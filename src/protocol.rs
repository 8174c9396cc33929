use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::engine::{EngineSettings, FiringSolution, SolveError, SolveRequest};
use crate::link::LinkReport;
use crate::store::{EnvironmentalReading, StoreStats};
use crate::wire::TelemetryMessage;

pub const MAX_REQUEST_SIZE: usize = 512;
pub const MAX_RESPONSE_SIZE: usize = 65_536;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u32,
    pub request_type: RequestType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestType {
    Ping,
    Solve(SolveRequest),
    Environment,
    Messages,
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u32,
    pub timestamp: u64,
    pub result: ResponseResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseResult {
    Pong,
    Solution(FiringSolution),
    Environment {
        reading: EnvironmentalReading,
        link: LinkReport,
    },
    Messages {
        messages: Vec<TelemetryMessage>,
    },
    Status(StatusReport),
    Error {
        kind: ErrorKind,
        detail: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub simulator: String,
    pub settings: EngineSettings,
    pub cache: CacheStats,
    pub store: StoreStats,
    pub link: LinkReport,
}

/// Machine-readable failure categories. `DeviceUnavailable` never surfaces
/// from a solve (auto mode falls back to the last known reading instead); it
/// exists for clients that watch the link report and want one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    RangeTooShort,
    Simulation,
    DeviceUnavailable,
    BadRequest,
}

impl From<&SolveError> for ErrorKind {
    fn from(error: &SolveError) -> Self {
        match error {
            SolveError::Validation { .. } => ErrorKind::Validation,
            SolveError::RangeTooShort { .. } => ErrorKind::RangeTooShort,
            SolveError::Simulation(_) | SolveError::Resample(_) => ErrorKind::Simulation,
        }
    }
}

pub fn parse_request(json_str: &str) -> Result<Request, ProtocolError> {
    if json_str.len() > MAX_REQUEST_SIZE {
        return Err(ProtocolError::MessageTooLarge);
    }
    match serde_json::from_str::<Request>(json_str) {
        Ok(request) => Ok(request),
        Err(_) => Err(ProtocolError::InvalidJson),
    }
}

pub fn encode_response(response: &Response) -> Result<String, ProtocolError> {
    let json_str =
        serde_json::to_string(response).map_err(|_| ProtocolError::SerializationFailed)?;
    if json_str.len() > MAX_RESPONSE_SIZE {
        return Err(ProtocolError::MessageTooLarge);
    }
    Ok(json_str)
}

pub fn error_response(id: u32, timestamp: u64, kind: ErrorKind, detail: &str) -> Response {
    Response {
        id,
        timestamp,
        result: ResponseResult::Error {
            kind,
            detail: detail.to_string(),
        },
    }
}

pub fn solve_error_response(id: u32, timestamp: u64, error: &SolveError) -> Response {
    Response {
        id,
        timestamp,
        result: ResponseResult::Error {
            kind: ErrorKind::from(error),
            detail: error.to_string(),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    InvalidJson,
    MessageTooLarge,
    SerializationFailed,
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::InvalidJson => write!(f, "Invalid JSON format"),
            ProtocolError::MessageTooLarge => write!(f, "Message exceeds buffer size"),
            ProtocolError::SerializationFailed => write!(f, "Serialization failed"),
        }
    }
}

impl std::error::Error for ProtocolError {}
