use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::diff::diff_json;
use crate::protocol::{ControlRequest, Request, RequestKind};
use crate::types::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    /// Every reply body verbatim.
    Full,
    /// First info reply per host verbatim, later ones as changes only.
    Diffed,
}

/// Appends thermostat traffic to a file, one JSON object per line.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_info: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_info: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, request: &Request) {
        let form = match &request.kind {
            RequestKind::Control(control) => Some(form_object(control)),
            _ => None,
        };
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "id": request.id.to_string(),
            "method": request.method(),
            "host": request.host(),
            "path": request.path(),
            "form": form,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, device_id: Option<&DeviceId>, control: &ControlRequest) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "device": device_id.map(DeviceId::as_str),
            "fields": form_object(control),
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, request: &Request, status: u16, body: &Value) {
        let mut entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "resp",
            "id": request.id.to_string(),
            "host": request.host(),
            "path": request.path(),
            "status": status,
        });

        let diffed = self.mode == MessageLogMode::Diffed
            && matches!(request.kind, RequestKind::Info { .. });
        if diffed {
            let host = request.host().to_string();
            match self.previous_info.insert(host, body.clone()) {
                Some(previous) => {
                    entry["changes"] = json!(diff_json(&previous, body));
                }
                None => {
                    entry["full"] = json!(true);
                    entry["body"] = body.clone();
                }
            }
        } else {
            entry["body"] = body.clone();
        }
        self.write_line(&entry);
    }

    pub fn log_failure(&mut self, request: &Request, error: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "resp",
            "id": request.id.to_string(),
            "host": request.host(),
            "path": request.path(),
            "error": error,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

/// Form fields as an object, with the PIN masked.
fn form_object(control: &ControlRequest) -> Value {
    let fields: Map<String, Value> = control
        .form_fields()
        .into_iter()
        .map(|(key, value)| {
            let value = if key == "pin" { "****".to_string() } else { value };
            (key.to_string(), Value::String(value))
        })
        .collect();
    Value::Object(fields)
}
