use std::collections::{HashMap, HashSet};

use reqwest::Url;
use tracing::{debug, info, trace, warn};

use crate::plugin::Effects;
use crate::protocol::{InfoResponse, Request, RequestId, RootResponse};
use crate::thermostat::INFO_RESPONSE_TIMEOUT_MS;
use crate::types::DeviceId;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy)]
struct Outstanding {
    id: RequestId,
    sent_at: u64,
}

impl Outstanding {
    fn is_stalled(&self, now: u64) -> bool {
        now.saturating_sub(self.sent_at) >= INFO_RESPONSE_TIMEOUT_MS
    }
}

/// Bookkeeping for an address that has not yet been validated.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRecord {
    root: Option<Outstanding>,
    info: Option<Outstanding>,
}

impl DiscoveryRecord {
    pub fn awaiting_root(&self) -> bool {
        self.root.is_some()
    }

    pub fn awaiting_info(&self) -> bool {
        self.info.is_some()
    }

    fn is_idle(&self) -> bool {
        self.root.is_none() && self.info.is_none()
    }

    fn is_stalled(&self, now: u64) -> bool {
        [self.root, self.info]
            .iter()
            .flatten()
            .all(|o| o.is_stalled(now))
    }
}

/// What the owner must do with a validated info reply.
#[derive(Debug)]
pub enum DiscoveryOutcome {
    Ignored,
    Promote { base_url: Url, info: InfoResponse },
    Deliver { device_id: DeviceId, result: Result<InfoResponse> },
}

/// Probes reported addresses and hands validated ones to the plugin.
#[derive(Debug, Default)]
pub struct DiscoveryEngine {
    addresses: Vec<Url>,
    records: HashMap<String, DiscoveryRecord>,
    abandoned: HashSet<String>,
}

impl DiscoveryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the host was already reported. Addresses are keyed by
    /// host alone, matching device identity, so two ports on one host count as
    /// one thermostat.
    pub fn add_address(&mut self, base_url: Url) -> bool {
        let Some(host) = base_url.host_str() else {
            return false;
        };
        if self.addresses.iter().any(|a| a.host_str() == Some(host)) {
            return false;
        }
        info!(%host, "found thermostat address");
        self.addresses.push(base_url);
        true
    }

    pub fn addresses(&self) -> &[Url] {
        &self.addresses
    }

    pub fn record(&self, host: &str) -> Option<&DiscoveryRecord> {
        self.records.get(host)
    }

    pub fn has_pending(&self) -> bool {
        self.records.values().any(|r| !r.is_idle())
    }

    pub fn pending_count(&self) -> usize {
        self.records.values().filter(|r| !r.is_idle()).count()
    }

    pub fn is_abandoned(&self, host: &str) -> bool {
        self.abandoned.contains(host)
    }

    /// Probe every address that backs no device and has nothing in flight.
    pub fn refresh(&mut self, now: u64, is_known: impl Fn(&str) -> bool, fx: &mut Effects) {
        for base_url in &self.addresses {
            let Some(host) = base_url.host_str() else {
                continue;
            };
            if is_known(host) || self.abandoned.contains(host) {
                continue;
            }
            let record = self.records.entry(host.to_string()).or_default();
            if !record.is_idle() && !record.is_stalled(now) {
                trace!(%host, "discovery request still outstanding");
                continue;
            }

            let request = Request::root(base_url.clone());
            debug!(%host, request = %request.id, "probing thermostat root");
            *record = DiscoveryRecord {
                root: Some(Outstanding {
                    id: request.id,
                    sent_at: now,
                }),
                info: None,
            };
            fx.send(request);
        }
    }

    pub fn on_root_response(
        &mut self,
        request: &Request,
        result: Result<RootResponse>,
        now: u64,
        fx: &mut Effects,
    ) {
        let host = request.host().to_string();
        let Some(record) = self.records.get_mut(&host) else {
            debug!(%host, "root response for unknown address");
            return;
        };
        if record.root.map(|o| o.id) != Some(request.id) {
            debug!(%host, request = %request.id, "ignoring stale root response");
            return;
        }
        record.root = None;

        match result {
            Ok(root) if root.is_supported() => {
                let info_request = Request::info(request.base_url.clone(), None);
                debug!(%host, request = %info_request.id, "root validated; requesting info");
                record.info = Some(Outstanding {
                    id: info_request.id,
                    sent_at: now,
                });
                fx.send(info_request);
            }
            Ok(root) => {
                let error = Error::UnsupportedApiVersion(root.api_version);
                warn!(%host, %error, "ignoring thermostat");
                self.records.remove(&host);
                self.abandoned.insert(host);
            }
            Err(e) => {
                debug!(%host, error = %e, "error probing thermostat; will retry");
                self.records.remove(&host);
            }
        }
    }

    pub fn on_info_response(
        &mut self,
        request: &Request,
        result: Result<InfoResponse>,
        is_known: impl Fn(&str) -> bool,
    ) -> DiscoveryOutcome {
        let host = request.host().to_string();
        let matched = self
            .records
            .get(&host)
            .and_then(|r| r.info)
            .is_some_and(|o| o.id == request.id);
        if !matched {
            debug!(%host, request = %request.id, "ignoring stale info response");
            return DiscoveryOutcome::Ignored;
        }
        self.records.remove(&host);

        let known = is_known(&host);
        match result {
            Ok(info) if !known => DiscoveryOutcome::Promote {
                base_url: request.base_url.clone(),
                info,
            },
            Err(e) if !known => {
                debug!(%host, error = %e, "error retrieving info; will retry");
                DiscoveryOutcome::Ignored
            }
            result => DiscoveryOutcome::Deliver {
                device_id: DeviceId::from_host(&host),
                result,
            },
        }
    }
}
