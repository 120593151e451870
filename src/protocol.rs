use std::fmt;

use reqwest::Url;
use serde_json::Value;
use uuid::Uuid;

use crate::temperature::check_setpoint_separation;
use crate::types::{DeviceId, FanMode, ThermostatMode};
use crate::{Error, Result};

pub const SUPPORTED_API_VERSION: i64 = 3;

pub const ROOT_PATH: &str = "/";
pub const INFO_PATH: &str = "/query/info";
pub const CONTROL_PATH: &str = "/control";

/// Identity of one outbound request; replies are correlated by it, never by arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestKind {
    Root,
    /// `device_id` is `None` while the address is still being validated.
    Info { device_id: Option<DeviceId> },
    Control(ControlRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub base_url: Url,
    pub kind: RequestKind,
}

impl Request {
    pub fn root(base_url: Url) -> Self {
        Self {
            id: RequestId::new(),
            base_url,
            kind: RequestKind::Root,
        }
    }

    pub fn info(base_url: Url, device_id: Option<DeviceId>) -> Self {
        Self {
            id: RequestId::new(),
            base_url,
            kind: RequestKind::Info { device_id },
        }
    }

    pub fn control(base_url: Url, control: ControlRequest) -> Self {
        Self {
            id: RequestId::new(),
            base_url,
            kind: RequestKind::Control(control),
        }
    }

    pub fn method(&self) -> &'static str {
        match self.kind {
            RequestKind::Control(_) => "POST",
            _ => "GET",
        }
    }

    pub fn path(&self) -> &'static str {
        match self.kind {
            RequestKind::Root => ROOT_PATH,
            RequestKind::Info { .. } => INFO_PATH,
            RequestKind::Control(_) => CONTROL_PATH,
        }
    }

    pub fn url(&self) -> Result<Url> {
        self.base_url
            .join(self.path())
            .map_err(|e| Error::InvalidHost(format!("{}: {e}", self.base_url)))
    }

    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }
}

/// Base URL for a thermostat host (`http://<host>/`).
pub fn base_url_for_host(host: &str) -> Result<Url> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidHost(host.to_string()));
    }
    let url = if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("http://{trimmed}/"))
    }
    .map_err(|e| Error::InvalidHost(format!("{host}: {e}")))?;
    if url.host_str().is_none() {
        return Err(Error::InvalidHost(host.to_string()));
    }
    Ok(url)
}

/// Body of a `POST /control`. Only fields with a value go on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlRequest {
    pub device_id: Option<DeviceId>,
    pub mode: Option<ThermostatMode>,
    pub fan: Option<FanMode>,
    pub heat_f: Option<f64>,
    pub cool_f: Option<f64>,
    pub pin: Option<String>,
}

impl ControlRequest {
    /// Compose a command from explicit setpoints, enforcing the AUTO separation rule.
    pub fn checked(
        device_id: Option<DeviceId>,
        mode: Option<ThermostatMode>,
        fan: Option<FanMode>,
        heat_f: Option<f64>,
        cool_f: Option<f64>,
        setpoint_delta_f: f64,
    ) -> Result<Self> {
        if mode == Some(ThermostatMode::Auto)
            && let (Some(heat), Some(cool)) = (heat_f, cool_f)
        {
            check_setpoint_separation(cool, heat, setpoint_delta_f)?;
        }
        Ok(Self {
            device_id,
            mode,
            fan,
            heat_f,
            cool_f,
            pin: None,
        })
    }

    pub fn with_pin(mut self, pin: Option<String>) -> Self {
        self.pin = pin;
        self
    }

    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(mode) = self.mode {
            fields.push(("mode", mode.code().to_string()));
        }
        if let Some(fan) = self.fan {
            fields.push(("fan", fan.code().to_string()));
        }
        if let Some(heat) = self.heat_f {
            fields.push(("heattemp", heat.to_string()));
        }
        if let Some(cool) = self.cool_f {
            fields.push(("cooltemp", cool.to_string()));
        }
        if let Some(pin) = &self.pin {
            fields.push(("pin", pin.clone()));
        }
        fields
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootResponse {
    pub api_version: Option<i64>,
    pub thermostat_type: Option<String>,
}

impl RootResponse {
    pub fn from_json(json: &Value) -> Self {
        Self {
            api_version: json.get("api_ver").and_then(|v| v.as_i64()),
            thermostat_type: json.get("type").and_then(|v| v.as_str()).map(str::to_string),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.api_version == Some(SUPPORTED_API_VERSION)
    }
}

/// `/query/info` reply. Missing or malformed keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoResponse {
    pub name: Option<String>,
    pub on: Option<bool>,
    pub mode: Option<ThermostatMode>,
    pub fan_mode: Option<FanMode>,
    pub temp_units: Option<i64>,
    pub space_temp_f: Option<f64>,
    pub cool_temp_f: Option<f64>,
    pub heat_temp_f: Option<f64>,
    pub setpoint_delta_f: Option<f64>,
}

impl InfoResponse {
    pub fn from_json(json: &Value) -> Self {
        Self {
            name: json.get("name").and_then(|v| v.as_str()).map(str::to_string),
            on: json
                .get("state")
                .and_then(|v| v.as_i64())
                .map(|s| (1..=2).contains(&s)),
            mode: json
                .get("mode")
                .and_then(|v| v.as_i64())
                .and_then(ThermostatMode::from_code),
            fan_mode: json
                .get("fan")
                .and_then(|v| v.as_i64())
                .and_then(FanMode::from_code),
            temp_units: json.get("tempunits").and_then(|v| v.as_i64()),
            space_temp_f: json.get("spacetemp").and_then(|v| v.as_f64()),
            cool_temp_f: json.get("cooltemp").and_then(|v| v.as_f64()),
            heat_temp_f: json.get("heattemp").and_then(|v| v.as_f64()),
            setpoint_delta_f: json.get("setpointdelta").and_then(|v| v.as_f64()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlResponse {
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn from_json(json: &Value) -> Self {
        if json.get("error").and_then(|v| v.as_bool()) == Some(true) {
            let reason = json
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("no reason given");
            return Self {
                error: Some(reason.to_string()),
            };
        }
        if json.get("success").is_none() {
            return Self {
                error: Some("no success or error keys in response".to_string()),
            };
        }
        Self { error: None }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(reason) => Err(Error::ControlRejected(reason)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Root(RootResponse),
    Info(InfoResponse),
    Control(ControlResponse),
}

impl Response {
    /// Decode a reply body according to the request that produced it.
    pub fn parse(kind: &RequestKind, body: &str) -> Result<Self> {
        let json: Value = serde_json::from_str(body)?;
        if !json.is_object() {
            return Err(Error::Protocol(format!("expected JSON object, got: {json}")));
        }
        Ok(match kind {
            RequestKind::Root => Response::Root(RootResponse::from_json(&json)),
            RequestKind::Info { .. } => Response::Info(InfoResponse::from_json(&json)),
            RequestKind::Control(_) => Response::Control(ControlResponse::from_json(&json)),
        })
    }

    pub fn into_root(self) -> Result<RootResponse> {
        match self {
            Response::Root(root) => Ok(root),
            other => Err(Error::Protocol(format!("expected root response, got {other:?}"))),
        }
    }

    pub fn into_info(self) -> Result<InfoResponse> {
        match self {
            Response::Info(info) => Ok(info),
            other => Err(Error::Protocol(format!("expected info response, got {other:?}"))),
        }
    }

    pub fn into_control(self) -> Result<ControlResponse> {
        match self {
            Response::Control(control) => Ok(control),
            other => Err(Error::Protocol(format!("expected control response, got {other:?}"))),
        }
    }
}
