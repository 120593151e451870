use std::time::Duration;

use serde_json::Value;

/// Tick cadence recommended to hosts driving [`crate::Plugin::refresh`].
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Property key for a manually configured thermostat address.
pub const THERMOSTAT_HOST_PROPERTY: &str = "thermostat.host";
pub const PIN_PROPERTY: &str = "thermostat.pin";

#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    pub refresh_interval: Duration,
    pub thermostat_host: Option<String>,
    pub pin: Option<String>,
    pub request_timeout: Duration,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            thermostat_host: None,
            pin: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read host framework properties. Unknown keys are ignored; blank strings count as unset.
    pub fn from_properties(properties: &Value) -> Self {
        let text = |key: &str| {
            properties
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            thermostat_host: text(THERMOSTAT_HOST_PROPERTY),
            pin: text(PIN_PROPERTY),
            ..Self::default()
        }
    }

    pub fn thermostat_host(mut self, host: impl Into<String>) -> Self {
        self.thermostat_host = Some(host.into());
        self
    }

    pub fn pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let config = PluginConfig::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.thermostat_host.is_none());
        assert!(config.pin.is_none());
    }

    #[test]
    fn builder_setters() {
        let config = PluginConfig::new()
            .thermostat_host("192.168.0.129")
            .pin("1234")
            .refresh_interval(Duration::from_secs(1));
        assert_eq!(config.thermostat_host.as_deref(), Some("192.168.0.129"));
        assert_eq!(config.pin.as_deref(), Some("1234"));
        assert_eq!(config.refresh_interval, Duration::from_secs(1));
    }

    #[test]
    fn from_properties_reads_host_and_pin() {
        let config = PluginConfig::from_properties(&json!({
            "thermostat.host": " 10.0.0.9 ",
            "thermostat.pin": "",
            "other": 1
        }));
        assert_eq!(config.thermostat_host.as_deref(), Some("10.0.0.9"));
        assert_eq!(config.pin, None);
        assert_eq!(config.refresh_interval, DEFAULT_REFRESH_INTERVAL);
    }
}
