use std::fmt;

use crate::types::{DeviceId, Variable};

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Json(serde_json::Error),
    Io(std::io::Error),
    Protocol(String),
    InvalidSetpointSeparation { heat_f: f64, cool_f: f64, delta_f: f64 },
    UnsupportedApiVersion(Option<i64>),
    InvalidHost(String),
    UnknownDevice(DeviceId),
    UnknownVariable(String),
    InvalidValue { variable: Variable, value: String },
    ReadOnlyVariable(Variable),
    ControlRejected(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::InvalidSetpointSeparation {
                heat_f,
                cool_f,
                delta_f,
            } => write!(
                f,
                "cool setpoint {cool_f} must be at least {delta_f} above heat setpoint {heat_f} in AUTO mode"
            ),
            Error::UnsupportedApiVersion(Some(v)) => write!(f, "unsupported API version: {v}"),
            Error::UnsupportedApiVersion(None) => write!(f, "unsupported API version: missing"),
            Error::InvalidHost(host) => write!(f, "invalid thermostat host: {host}"),
            Error::UnknownDevice(id) => write!(f, "unknown device: {id}"),
            Error::UnknownVariable(name) => write!(f, "unknown variable: {name}"),
            Error::InvalidValue { variable, value } => {
                write!(f, "invalid value for {variable}: {value}")
            }
            Error::ReadOnlyVariable(variable) => write!(f, "variable is read-only: {variable}"),
            Error::ControlRejected(reason) => write!(f, "control request rejected: {reason}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
