use std::collections::BTreeMap;
use std::mem;

use reqwest::Url;
use tracing::{debug, info, warn};

use crate::config::PluginConfig;
use crate::discovery::{DiscoveryEngine, DiscoveryOutcome};
use crate::protocol::{Request, RequestKind, Response, base_url_for_host};
use crate::thermostat::Thermostat;
use crate::types::{DeviceId, Event, PluginState, Variable, VariableValue};
use crate::{Error, Result};

/// Requests to send and events to publish, collected while handling one input.
#[derive(Debug, Default)]
pub struct Effects {
    pub requests: Vec<Request>,
    pub events: Vec<Event>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.events.is_empty()
    }

    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

/// Owns discovery and every managed thermostat. All inputs arrive through
/// `&mut self`, so one plugin is driven from a single event stream.
#[derive(Debug)]
pub struct Plugin {
    config: PluginConfig,
    state: PluginState,
    discovery: DiscoveryEngine,
    thermostats: BTreeMap<DeviceId, Thermostat>,
}

impl Plugin {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            config,
            state: PluginState::Discovering,
            discovery: DiscoveryEngine::new(),
            thermostats: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn discovery(&self) -> &DiscoveryEngine {
        &self.discovery
    }

    pub fn thermostat(&self, device_id: &DeviceId) -> Option<&Thermostat> {
        self.thermostats.get(device_id)
    }

    pub fn thermostats(&self) -> impl Iterator<Item = &Thermostat> {
        self.thermostats.values()
    }

    /// Probe the configured manual host, if any.
    pub fn start(&mut self, now: u64, fx: &mut Effects) -> Result<()> {
        match self.config.thermostat_host.clone() {
            Some(host) => self.add_host(&host, now, fx).map(|_| ()),
            None => Ok(()),
        }
    }

    pub fn update_configuration(
        &mut self,
        thermostat_host: Option<String>,
        now: u64,
        fx: &mut Effects,
    ) -> Result<()> {
        self.config.thermostat_host = thermostat_host;
        self.start(now, fx)
    }

    pub fn add_host(&mut self, host: &str, now: u64, fx: &mut Effects) -> Result<bool> {
        let base_url = base_url_for_host(host)?;
        Ok(self.address_found(base_url, now, fx))
    }

    /// Report an advertised or configured address. Returns false for duplicates.
    pub fn address_found(&mut self, base_url: Url, now: u64, fx: &mut Effects) -> bool {
        if !self.discovery.add_address(base_url) {
            debug!("ignoring duplicate thermostat address");
            return false;
        }
        self.set_state(PluginState::Discovering, fx);
        self.run_discovery(now, fx);
        true
    }

    pub fn refresh(&mut self, now: u64, fx: &mut Effects) {
        if self.state == PluginState::Discovering {
            self.run_discovery(now, fx);
        }
        for thermostat in self.thermostats.values_mut() {
            thermostat.refresh(now, fx);
        }
        self.check_discovery_complete(fx);
    }

    pub fn set_variable(
        &mut self,
        device_id: &DeviceId,
        variable: Variable,
        value: VariableValue,
        now: u64,
        fx: &mut Effects,
    ) -> Result<()> {
        let thermostat = self
            .thermostats
            .get_mut(device_id)
            .ok_or_else(|| Error::UnknownDevice(device_id.clone()))?;
        thermostat.set_variable(variable, value, now, fx)
    }

    /// Deliver the outcome of a request previously handed out through [`Effects`].
    pub fn on_response(
        &mut self,
        request: &Request,
        result: Result<Response>,
        now: u64,
        fx: &mut Effects,
    ) {
        match &request.kind {
            RequestKind::Root => {
                let result = result.and_then(Response::into_root);
                self.discovery.on_root_response(request, result, now, fx);
            }
            RequestKind::Info { device_id: None } => {
                let thermostats = &self.thermostats;
                let outcome = self.discovery.on_info_response(
                    request,
                    result.and_then(Response::into_info),
                    |host| thermostats.contains_key(&DeviceId::from_host(host)),
                );
                self.apply_discovery_outcome(request, outcome, now, fx);
            }
            RequestKind::Info {
                device_id: Some(device_id),
            } => match self.thermostats.get_mut(device_id) {
                Some(thermostat) => thermostat.on_info_response(
                    request.id,
                    result.and_then(Response::into_info),
                    now,
                    fx,
                ),
                None => debug!(device = %device_id, "info response for unknown device"),
            },
            RequestKind::Control(control) => {
                let device_id = control
                    .device_id
                    .clone()
                    .unwrap_or_else(|| DeviceId::from_host(request.host()));
                match self.thermostats.get_mut(&device_id) {
                    Some(thermostat) => thermostat
                        .on_control_response(request.id, result.and_then(Response::into_control)),
                    None => debug!(device = %device_id, "control response for unknown device"),
                }
            }
        }
        self.check_discovery_complete(fx);
    }

    fn run_discovery(&mut self, now: u64, fx: &mut Effects) {
        let thermostats = &self.thermostats;
        self.discovery.refresh(
            now,
            |host| thermostats.contains_key(&DeviceId::from_host(host)),
            fx,
        );
    }

    fn apply_discovery_outcome(
        &mut self,
        request: &Request,
        outcome: DiscoveryOutcome,
        now: u64,
        fx: &mut Effects,
    ) {
        match outcome {
            DiscoveryOutcome::Ignored => {}
            DiscoveryOutcome::Promote { base_url, info } => {
                let thermostat =
                    Thermostat::new(base_url, Some(&info)).with_pin(self.config.pin.clone());
                info!(
                    device = %thermostat.id(),
                    name = thermostat.name().unwrap_or("unnamed"),
                    "adding thermostat"
                );
                fx.emit(Event::DeviceAdded {
                    device_id: thermostat.id().clone(),
                    name: thermostat.name().map(str::to_string),
                    state: thermostat.state().clone(),
                });
                self.thermostats.insert(thermostat.id().clone(), thermostat);
            }
            DiscoveryOutcome::Deliver { device_id, result } => {
                match self.thermostats.get_mut(&device_id) {
                    Some(thermostat) => thermostat.on_info_response(request.id, result, now, fx),
                    None => warn!(device = %device_id, "discovery delivered info for unknown device"),
                }
            }
        }
    }

    fn check_discovery_complete(&mut self, fx: &mut Effects) {
        if self.state == PluginState::Discovering
            && !self.discovery.has_pending()
            && !self.thermostats.is_empty()
        {
            self.set_state(PluginState::Running, fx);
        }
    }

    fn set_state(&mut self, state: PluginState, fx: &mut Effects) {
        if self.state == state {
            return;
        }
        info!(from = ?self.state, to = ?state, "plugin state changed");
        self.state = state;
        fx.emit(Event::PluginStateChanged { state });
    }
}
