use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::state::DeviceStateSnapshot;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThermostatMode {
    Off,
    Heat,
    Cool,
    Auto,
}

impl ThermostatMode {
    /// Wire code used by `mode` in both `/query/info` and `/control`.
    pub fn code(&self) -> u8 {
        match self {
            ThermostatMode::Off => 0,
            ThermostatMode::Heat => 1,
            ThermostatMode::Cool => 2,
            ThermostatMode::Auto => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ThermostatMode::Off),
            1 => Some(ThermostatMode::Heat),
            2 => Some(ThermostatMode::Cool),
            3 => Some(ThermostatMode::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThermostatMode::Off => "OFF",
            ThermostatMode::Heat => "HEAT",
            ThermostatMode::Cool => "COOL",
            ThermostatMode::Auto => "AUTO",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OFF" => Some(ThermostatMode::Off),
            "HEAT" => Some(ThermostatMode::Heat),
            "COOL" => Some(ThermostatMode::Cool),
            "AUTO" => Some(ThermostatMode::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanMode {
    Auto,
    On,
}

impl FanMode {
    pub fn code(&self) -> u8 {
        match self {
            FanMode::Auto => 0,
            FanMode::On => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FanMode::Auto),
            1 => Some(FanMode::On),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FanMode::Auto => "AUTO",
            FanMode::On => "ON",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AUTO" => Some(FanMode::Auto),
            "ON" => Some(FanMode::On),
            _ => None,
        }
    }
}

/// Stable device identity derived from the thermostat's network host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn from_host(host: &str) -> Self {
        Self(host.replace('.', "-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Externally visible thermostat attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Variable {
    On,
    Mode,
    FanMode,
    IndoorTempF,
    TargetCoolTempF,
    TargetHeatTempF,
    TargetTempF,
}

impl Variable {
    pub const ALL: [Variable; 7] = [
        Variable::On,
        Variable::Mode,
        Variable::FanMode,
        Variable::IndoorTempF,
        Variable::TargetCoolTempF,
        Variable::TargetHeatTempF,
        Variable::TargetTempF,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::On => "on",
            Variable::Mode => "mode",
            Variable::FanMode => "fanMode",
            Variable::IndoorTempF => "indoorTempF",
            Variable::TargetCoolTempF => "targetCoolTempF",
            Variable::TargetHeatTempF => "targetHeatTempF",
            Variable::TargetTempF => "targetTempF",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Variable::ALL
            .into_iter()
            .find(|v| v.as_str() == name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// Whether a set-variable request may target this attribute.
    pub fn is_writable(&self) -> bool {
        !matches!(self, Variable::On | Variable::IndoorTempF)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Mode(ThermostatMode),
    FanMode(FanMode),
    Temperature(f64),
}

impl VariableValue {
    /// Coerce a loosely typed host value into the type `variable` expects.
    ///
    /// Temperatures accept integers, floats and numeric strings. Modes accept
    /// names (any case) or wire codes.
    pub fn parse(variable: Variable, value: &Value) -> Result<Self> {
        let invalid = || Error::InvalidValue {
            variable,
            value: value.to_string(),
        };
        match variable {
            Variable::On => value.as_bool().map(VariableValue::Bool).ok_or_else(invalid),
            Variable::Mode => match value {
                Value::String(s) => ThermostatMode::from_name(s),
                Value::Number(n) => n.as_i64().and_then(ThermostatMode::from_code),
                _ => None,
            }
            .map(VariableValue::Mode)
            .ok_or_else(invalid),
            Variable::FanMode => match value {
                Value::String(s) => FanMode::from_name(s),
                Value::Number(n) => n.as_i64().and_then(FanMode::from_code),
                _ => None,
            }
            .map(VariableValue::FanMode)
            .ok_or_else(invalid),
            Variable::IndoorTempF
            | Variable::TargetCoolTempF
            | Variable::TargetHeatTempF
            | Variable::TargetTempF => match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|t| t.is_finite())
            .map(VariableValue::Temperature)
            .ok_or_else(invalid),
        }
    }

    pub fn as_temperature(&self) -> Option<f64> {
        match self {
            VariableValue::Temperature(t) => Some(*t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PluginState {
    Discovering,
    Running,
}

/// Notifications produced for the host framework.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    DeviceAdded {
        device_id: DeviceId,
        name: Option<String>,
        state: DeviceStateSnapshot,
    },
    VariableChanged {
        device_id: DeviceId,
        variable: Variable,
        value: Option<VariableValue>,
    },
    PluginStateChanged {
        state: PluginState,
    },
}
