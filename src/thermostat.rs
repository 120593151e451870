use reqwest::Url;
use tracing::{debug, info, trace, warn};

use crate::plugin::Effects;
use crate::protocol::{ControlRequest, ControlResponse, InfoResponse, Request, RequestId};
use crate::state::{DeviceStateSnapshot, PendingOverlay};
use crate::temperature::corrected_setpoints;
use crate::types::{DeviceId, Event, ThermostatMode, Variable, VariableValue};
use crate::{Error, Result};

/// An outstanding `/query/info` older than this is considered lost.
pub const INFO_RESPONSE_TIMEOUT_MS: u64 = 5_000;
/// Poll cadence while a requested change awaits confirmation.
pub const PENDING_REFRESH_INTERVAL_MS: u64 = 1_000;
/// Poll cadence with nothing pending.
pub const IDLE_REFRESH_INTERVAL_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy)]
struct OutstandingInfo {
    id: RequestId,
    sent_at: u64,
}

/// Reconciles desired changes for one thermostat with what the device reports.
#[derive(Debug)]
pub struct Thermostat {
    id: DeviceId,
    base_url: Url,
    name: Option<String>,
    pin: Option<String>,
    state: DeviceStateSnapshot,
    pending: PendingOverlay,
    outstanding_info: Option<OutstandingInfo>,
    last_refresh: Option<u64>,
}

impl Thermostat {
    /// `info` seeds the snapshot; `None` starts with every attribute unknown.
    pub fn new(base_url: Url, info: Option<&InfoResponse>) -> Self {
        let id = DeviceId::from_host(base_url.host_str().unwrap_or_default());
        Self {
            id,
            base_url,
            name: info.and_then(|i| i.name.clone()),
            pin: None,
            state: info.map(DeviceStateSnapshot::from_info).unwrap_or_default(),
            pending: PendingOverlay::new(),
            outstanding_info: None,
            last_refresh: None,
        }
    }

    pub fn with_pin(mut self, pin: Option<String>) -> Self {
        self.pin = pin;
        self
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn state(&self) -> &DeviceStateSnapshot {
        &self.state
    }

    pub fn pending(&self) -> &PendingOverlay {
        &self.pending
    }

    pub fn has_pending_confirmation(&self) -> bool {
        self.pending.has_pending_change()
    }

    pub fn has_outstanding_info(&self) -> bool {
        self.outstanding_info.is_some()
    }

    /// Record a desired value. The control command goes out once fresh state arrives.
    pub fn set_variable(
        &mut self,
        variable: Variable,
        value: VariableValue,
        now: u64,
        fx: &mut Effects,
    ) -> Result<()> {
        if !variable.is_writable() {
            return Err(Error::ReadOnlyVariable(variable));
        }
        if !value_fits(variable, &value) {
            return Err(Error::InvalidValue {
                variable,
                value: format!("{value:?}"),
            });
        }

        debug!(device = %self.id, %variable, ?value, "set variable requested");
        self.pending.set_desired(variable, value);
        self.pending.mark_requested(now);

        // control commands carry every field; read current state first
        if self.outstanding_info.is_none() {
            self.send_info_request(now, fx);
        }
        Ok(())
    }

    pub fn refresh(&mut self, now: u64, fx: &mut Effects) {
        let interval = if self.pending.has_pending_change() {
            PENDING_REFRESH_INTERVAL_MS
        } else {
            IDLE_REFRESH_INTERVAL_MS
        };

        if self.pending.has_pending_change() && self.pending.has_timed_out(now) {
            warn!(
                device = %self.id,
                control_sent = self.pending.control_request_sent(),
                "no confirmation from thermostat; abandoning requested change"
            );
            self.pending.clear();
        }

        let due = self
            .last_refresh
            .is_none_or(|last| now.saturating_sub(last) >= interval);
        if !due {
            trace!(device = %self.id, "refresh not due");
            return;
        }

        match self.outstanding_info {
            Some(outstanding)
                if now.saturating_sub(outstanding.sent_at) < INFO_RESPONSE_TIMEOUT_MS =>
            {
                trace!(device = %self.id, "info request still outstanding");
                return;
            }
            Some(outstanding) => {
                warn!(device = %self.id, request = %outstanding.id, "info request timed out; re-sending");
            }
            None => {}
        }

        self.send_info_request(now, fx);
        self.last_refresh = Some(now);
    }

    pub fn on_info_response(
        &mut self,
        request_id: RequestId,
        result: Result<InfoResponse>,
        now: u64,
        fx: &mut Effects,
    ) {
        match self.outstanding_info {
            Some(outstanding) if outstanding.id == request_id => self.outstanding_info = None,
            Some(_) => debug!(device = %self.id, request = %request_id, "info response for superseded request"),
            None => {}
        }

        let observed = match result {
            Ok(info) => {
                if info.name.is_some() {
                    self.name = info.name.clone();
                }
                DeviceStateSnapshot::from_info(&info)
            }
            Err(e) => {
                warn!(device = %self.id, error = %e, "error retrieving thermostat state; invalidating values");
                DeviceStateSnapshot::default()
            }
        };

        if !observed.is_empty() && self.pending.has_pending_change() {
            self.reconcile(&observed, now, fx);
        }

        for (variable, value) in observed.changes_from(&self.state) {
            fx.emit(Event::VariableChanged {
                device_id: self.id.clone(),
                variable,
                value,
            });
        }
        self.state = observed;
    }

    /// Control replies are diagnostic only; confirmation comes from a later info reply.
    pub fn on_control_response(&mut self, request_id: RequestId, result: Result<ControlResponse>) {
        match result.and_then(ControlResponse::into_result) {
            Ok(()) => trace!(device = %self.id, request = %request_id, "control request accepted"),
            Err(e) => warn!(device = %self.id, request = %request_id, error = %e, "control request failed"),
        }
    }

    fn reconcile(&mut self, observed: &DeviceStateSnapshot, now: u64, fx: &mut Effects) {
        let mode = self.pending.desired_mode().or(observed.mode);
        if mode == Some(ThermostatMode::Off) && self.pending.remove(Variable::TargetTempF).is_some() {
            warn!(device = %self.id, "no target temperature in OFF mode; dropping requested target");
            if !self.pending.has_pending_change() {
                self.pending.clear();
                return;
            }
        }
        if self.pending.matches(observed) {
            info!(device = %self.id, "thermostat confirmed requested change");
            self.pending.clear();
            return;
        }
        if self.pending.control_request_sent() {
            trace!(device = %self.id, "awaiting confirmation of sent control request");
            return;
        }

        match self.compose_control(observed) {
            Ok(control) => {
                let (cool, heat) = match control.mode {
                    Some(ThermostatMode::Heat) => (None, control.heat_f),
                    Some(ThermostatMode::Cool) => (control.cool_f, None),
                    Some(_) => (control.cool_f, control.heat_f),
                    None => (None, None),
                };
                if control.mode.is_some() {
                    self.pending.settle_target(cool, heat);
                }
                debug!(device = %self.id, fields = ?control.form_fields(), "sending control request");
                fx.send(Request::control(self.base_url.clone(), control));
                self.pending.mark_control_sent(now);
            }
            Err(e) => {
                warn!(device = %self.id, error = %e, "discarding requested change");
                self.pending.clear();
            }
        }
    }

    /// Merge desired values over the observed state into one full command.
    fn compose_control(&self, observed: &DeviceStateSnapshot) -> Result<ControlRequest> {
        let mode = self.pending.desired_mode().or(observed.mode);
        let fan = self.pending.desired_fan_mode().or(observed.fan_mode);
        let delta = observed.setpoint_delta();
        let cool = self
            .pending
            .desired_temperature(Variable::TargetCoolTempF)
            .or(observed.cool_setpoint_f);
        let heat = self
            .pending
            .desired_temperature(Variable::TargetHeatTempF)
            .or(observed.heat_setpoint_f);

        let control = match (self.pending.desired_temperature(Variable::TargetTempF), mode) {
            (Some(target), Some(mode)) => {
                let (cool_f, heat_f) = corrected_setpoints(mode, target, cool, heat, delta);
                ControlRequest {
                    device_id: Some(self.id.clone()),
                    mode: Some(mode),
                    fan,
                    heat_f,
                    cool_f,
                    pin: None,
                }
            }
            _ => ControlRequest::checked(Some(self.id.clone()), mode, fan, heat, cool, delta)?,
        };
        Ok(control.with_pin(self.pin.clone()))
    }

    fn send_info_request(&mut self, now: u64, fx: &mut Effects) {
        let request = Request::info(self.base_url.clone(), Some(self.id.clone()));
        debug!(device = %self.id, request = %request.id, "requesting thermostat state");
        self.outstanding_info = Some(OutstandingInfo {
            id: request.id,
            sent_at: now,
        });
        fx.send(request);
    }
}

fn value_fits(variable: Variable, value: &VariableValue) -> bool {
    matches!(
        (variable, value),
        (Variable::On, VariableValue::Bool(_))
            | (Variable::Mode, VariableValue::Mode(_))
            | (Variable::FanMode, VariableValue::FanMode(_))
            | (
                Variable::IndoorTempF
                    | Variable::TargetCoolTempF
                    | Variable::TargetHeatTempF
                    | Variable::TargetTempF,
                VariableValue::Temperature(_)
            )
    )
}
