mod client;
mod config;
mod diff;
mod discovery;
mod error;
mod logger;
mod plugin;
mod protocol;
mod state;
mod temperature;
mod thermostat;
mod types;

pub use client::{ColorTouchClient, ColorTouchClientBuilder};
pub use config::{DEFAULT_REFRESH_INTERVAL, DEFAULT_REQUEST_TIMEOUT, PluginConfig};
pub use discovery::{DiscoveryEngine, DiscoveryOutcome, DiscoveryRecord};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use plugin::{Effects, Plugin};
pub use protocol::{
    ControlRequest, ControlResponse, InfoResponse, Request, RequestId, RequestKind, Response,
    RootResponse, SUPPORTED_API_VERSION, base_url_for_host,
};
pub use state::{CONFIRMATION_TIMEOUT_MS, DeviceStateSnapshot, PendingOverlay};
pub use temperature::{
    DEFAULT_SETPOINT_DELTA_F, check_setpoint_separation, corrected_setpoints, round_half_up,
    target_temp,
};
pub use thermostat::{
    IDLE_REFRESH_INTERVAL_MS, INFO_RESPONSE_TIMEOUT_MS, PENDING_REFRESH_INTERVAL_MS, Thermostat,
};
pub use types::*;
