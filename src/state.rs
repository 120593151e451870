use std::collections::HashMap;

use serde::Serialize;

use crate::protocol::InfoResponse;
use crate::temperature::{DEFAULT_SETPOINT_DELTA_F, target_temp};
use crate::types::{FanMode, ThermostatMode, Variable, VariableValue};

pub const CONFIRMATION_TIMEOUT_MS: u64 = 10_000;

/// Last observed thermostat attributes. Either all absent or one consistent reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceStateSnapshot {
    pub on: Option<bool>,
    pub mode: Option<ThermostatMode>,
    pub fan_mode: Option<FanMode>,
    pub indoor_temp_f: Option<f64>,
    pub cool_setpoint_f: Option<f64>,
    pub heat_setpoint_f: Option<f64>,
    pub target_temp_f: Option<f64>,
    #[serde(skip)]
    pub setpoint_delta_f: Option<f64>,
}

impl DeviceStateSnapshot {
    pub fn from_info(info: &InfoResponse) -> Self {
        let target_temp_f = info
            .mode
            .and_then(|mode| target_temp(mode, info.cool_temp_f, info.heat_temp_f));
        Self {
            on: info.on,
            mode: info.mode,
            fan_mode: info.fan_mode,
            indoor_temp_f: info.space_temp_f,
            cool_setpoint_f: info.cool_temp_f,
            heat_setpoint_f: info.heat_temp_f,
            target_temp_f,
            setpoint_delta_f: info.setpoint_delta_f,
        }
    }

    pub fn is_empty(&self) -> bool {
        Variable::ALL.iter().all(|v| self.value(*v).is_none())
    }

    pub fn setpoint_delta(&self) -> f64 {
        self.setpoint_delta_f.unwrap_or(DEFAULT_SETPOINT_DELTA_F)
    }

    pub fn value(&self, variable: Variable) -> Option<VariableValue> {
        match variable {
            Variable::On => self.on.map(VariableValue::Bool),
            Variable::Mode => self.mode.map(VariableValue::Mode),
            Variable::FanMode => self.fan_mode.map(VariableValue::FanMode),
            Variable::IndoorTempF => self.indoor_temp_f.map(VariableValue::Temperature),
            Variable::TargetCoolTempF => self.cool_setpoint_f.map(VariableValue::Temperature),
            Variable::TargetHeatTempF => self.heat_setpoint_f.map(VariableValue::Temperature),
            Variable::TargetTempF => self.target_temp_f.map(VariableValue::Temperature),
        }
    }

    /// Attributes whose value differs from `previous`, with the new value.
    pub fn changes_from(&self, previous: &Self) -> Vec<(Variable, Option<VariableValue>)> {
        Variable::ALL
            .into_iter()
            .filter_map(|variable| {
                let new = self.value(variable);
                (new != previous.value(variable)).then_some((variable, new))
            })
            .collect()
    }
}

/// Desired values requested by the user but not yet confirmed by the thermostat.
#[derive(Debug, Clone, Default)]
pub struct PendingOverlay {
    desired: HashMap<Variable, VariableValue>,
    control_request_sent: bool,
    request_sent_at: Option<u64>,
}

impl PendingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins per attribute.
    pub fn set_desired(&mut self, variable: Variable, value: VariableValue) {
        self.desired.insert(variable, value);
    }

    pub fn remove(&mut self, variable: Variable) -> Option<VariableValue> {
        self.desired.remove(&variable)
    }

    /// Replace a desired target with the setpoints sent to reach it. The device
    /// reports a rounded target, so confirmation compares setpoints instead.
    pub fn settle_target(&mut self, cool_f: Option<f64>, heat_f: Option<f64>) {
        if self.desired.remove(&Variable::TargetTempF).is_none() {
            return;
        }
        let setpoints = [
            (Variable::TargetCoolTempF, cool_f),
            (Variable::TargetHeatTempF, heat_f),
        ];
        for (variable, value) in setpoints {
            if let Some(t) = value {
                self.desired.insert(variable, VariableValue::Temperature(t));
            }
        }
    }

    pub fn desired(&self, variable: Variable) -> Option<VariableValue> {
        self.desired.get(&variable).copied()
    }

    pub fn desired_mode(&self) -> Option<ThermostatMode> {
        match self.desired(Variable::Mode) {
            Some(VariableValue::Mode(mode)) => Some(mode),
            _ => None,
        }
    }

    pub fn desired_fan_mode(&self) -> Option<FanMode> {
        match self.desired(Variable::FanMode) {
            Some(VariableValue::FanMode(fan)) => Some(fan),
            _ => None,
        }
    }

    pub fn desired_temperature(&self, variable: Variable) -> Option<f64> {
        self.desired(variable).and_then(|v| v.as_temperature())
    }

    pub fn has_pending_change(&self) -> bool {
        !self.desired.is_empty()
    }

    /// True when every desired attribute equals the observed one.
    pub fn matches(&self, observed: &DeviceStateSnapshot) -> bool {
        self.desired
            .iter()
            .all(|(variable, value)| observed.value(*variable) == Some(*value))
    }

    /// Start the confirmation clock if it is not already running.
    pub fn mark_requested(&mut self, now: u64) {
        self.request_sent_at.get_or_insert(now);
    }

    pub fn mark_control_sent(&mut self, now: u64) {
        self.control_request_sent = true;
        self.request_sent_at = Some(now);
    }

    pub fn control_request_sent(&self) -> bool {
        self.control_request_sent
    }

    pub fn request_sent_at(&self) -> Option<u64> {
        self.request_sent_at
    }

    pub fn has_timed_out(&self, now: u64) -> bool {
        self.request_sent_at
            .is_some_and(|sent| now.saturating_sub(sent) >= CONFIRMATION_TIMEOUT_MS)
    }

    pub fn clear(&mut self) {
        self.desired.clear();
        self.control_request_sent = false;
        self.request_sent_at = None;
    }
}
