use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::PluginConfig;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::plugin::{Effects, Plugin};
use crate::protocol::{Request, RequestKind, Response};
use crate::thermostat::{PENDING_REFRESH_INTERVAL_MS, Thermostat};
use crate::types::{DeviceId, Event, PluginState, Variable, VariableValue};
use crate::Result;

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;

pub struct ColorTouchClientBuilder {
    config: PluginConfig,
    hosts: Vec<String>,
    event_callbacks: Vec<EventCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<PathBuf>,
}

impl ColorTouchClientBuilder {
    pub fn new() -> Self {
        Self {
            config: PluginConfig::default(),
            hosts: Vec::new(),
            event_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }

    /// Manually configured thermostat, probed on the first refresh.
    pub fn thermostat_host(mut self, host: impl Into<String>) -> Self {
        self.config.thermostat_host = Some(host.into());
        self
    }

    /// Additional address, as an advertisement listener would report it.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    pub fn pin(mut self, pin: impl Into<String>) -> Self {
        self.config.pin = Some(pin.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<PathBuf>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    /// Nothing goes on the wire until the first [`ColorTouchClient::refresh`].
    pub fn build(self) -> Result<ColorTouchClient> {
        let http = reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, path)?),
            _ => None,
        };

        let mut effects = Effects::new();
        let mut plugin = Plugin::new(self.config);
        plugin.start(0, &mut effects)?;
        for host in &self.hosts {
            plugin.add_host(host, 0, &mut effects)?;
        }

        Ok(ColorTouchClient {
            http,
            plugin,
            effects,
            started: Instant::now(),
            event_callbacks: self.event_callbacks,
            logger,
        })
    }
}

impl Default for ColorTouchClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a [`Plugin`] over HTTP: executes the requests it asks for and feeds
/// the replies back until it goes quiet.
pub struct ColorTouchClient {
    http: reqwest::Client,
    plugin: Plugin,
    effects: Effects,
    started: Instant,
    event_callbacks: Vec<EventCallback>,
    logger: Option<MessageLogger>,
}

impl ColorTouchClient {
    pub fn builder() -> ColorTouchClientBuilder {
        ColorTouchClientBuilder::new()
    }

    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    pub fn plugin_state(&self) -> PluginState {
        self.plugin.state()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.plugin.config().refresh_interval
    }

    /// How long to wait before the next [`Self::refresh`]: the pending-change
    /// poll cadence while any thermostat awaits confirmation, otherwise the
    /// configured refresh interval.
    pub fn tick_interval(&self) -> Duration {
        if self.plugin.thermostats().any(Thermostat::has_pending_confirmation) {
            Duration::from_millis(PENDING_REFRESH_INTERVAL_MS)
        } else {
            self.refresh_interval()
        }
    }

    pub fn thermostat(&self, device_id: &DeviceId) -> Option<&Thermostat> {
        self.plugin.thermostat(device_id)
    }

    pub fn thermostats(&self) -> impl Iterator<Item = &Thermostat> {
        self.plugin.thermostats()
    }

    /// Queue an address for discovery. Returns false when it was already known.
    pub fn add_host(&mut self, host: &str) -> Result<bool> {
        let now = self.now_ms();
        self.plugin.add_host(host, now, &mut self.effects)
    }

    pub fn update_configuration(&mut self, thermostat_host: Option<String>) -> Result<()> {
        let now = self.now_ms();
        self.plugin
            .update_configuration(thermostat_host, now, &mut self.effects)
    }

    /// One plugin tick followed by a flush. Schedule the next call after
    /// [`Self::tick_interval`].
    pub async fn refresh(&mut self) {
        let now = self.now_ms();
        self.plugin.refresh(now, &mut self.effects);
        self.flush().await;
    }

    pub async fn set_variable(
        &mut self,
        device_id: &DeviceId,
        variable: Variable,
        value: VariableValue,
    ) -> Result<()> {
        let now = self.now_ms();
        self.plugin
            .set_variable(device_id, variable, value, now, &mut self.effects)?;
        self.flush().await;
        Ok(())
    }

    /// Set a variable from a loosely typed name and value, such as a host framework supplies.
    pub async fn set_variable_json(
        &mut self,
        device_id: &DeviceId,
        name: &str,
        value: &Value,
    ) -> Result<()> {
        let variable = Variable::from_name(name)?;
        let value = VariableValue::parse(variable, value)?;
        self.set_variable(device_id, variable, value).await
    }

    /// Publish queued events and execute queued requests until none remain.
    pub async fn flush(&mut self) {
        loop {
            let effects = self.effects.take();
            for event in &effects.events {
                for cb in &self.event_callbacks {
                    cb(event);
                }
            }
            if effects.requests.is_empty() {
                return;
            }
            for request in effects.requests {
                let result = self.execute(&request).await;
                if let Err(e) = &result {
                    debug!(host = request.host(), path = request.path(), error = %e, "request failed");
                    if let Some(ref mut logger) = self.logger {
                        logger.log_failure(&request, &e.to_string());
                    }
                }
                let now = self.now_ms();
                self.plugin
                    .on_response(&request, result, now, &mut self.effects);
            }
        }
    }

    async fn execute(&mut self, request: &Request) -> Result<Response> {
        let url = request.url()?;
        trace!(method = request.method(), %url, request = %request.id, "sending request");

        if let Some(ref mut logger) = self.logger {
            logger.log_request(request);
            if let RequestKind::Control(control) = &request.kind {
                logger.log_command(control.device_id.as_ref(), control);
            }
        }

        let builder = match &request.kind {
            RequestKind::Control(control) => self.http.post(url).form(&control.form_fields()),
            _ => self.http.get(url),
        };
        let resp = builder.send().await?.error_for_status()?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        if let Some(ref mut logger) = self.logger {
            let body_json = serde_json::from_str(&body).unwrap_or(Value::Null);
            logger.log_response(request, status, &body_json);
        }

        let response = Response::parse(&request.kind, &body);
        if let Err(e) = &response {
            warn!(host = request.host(), path = request.path(), error = %e, "unparseable thermostat reply");
        }
        response
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
