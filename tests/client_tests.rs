use std::sync::{Arc, Mutex};
use std::time::Duration;

use colortouch::{
    ColorTouchClient, DeviceId, Error, Event, MessageLogMode, PluginState, ThermostatMode,
    Variable, VariableValue,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn info_body(heat: f64) -> Value {
    json!({
        "name": "Hallway",
        "mode": 1,
        "state": 1,
        "fan": 0,
        "tempunits": 0,
        "spacetemp": 68,
        "heattemp": heat,
        "cooltemp": 75,
        "setpointdelta": 2
    })
}

fn host(server: &MockServer) -> String {
    let addr = server.address();
    format!("{}:{}", addr.ip(), addr.port())
}

fn device_id(server: &MockServer) -> DeviceId {
    DeviceId::from_host(&server.address().ip().to_string())
}

async fn mount_root(server: &MockServer, api_ver: i64) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"api_ver": api_ver, "type": "residential"})))
        .mount(server)
        .await;
}

fn recorder() -> (Arc<Mutex<Vec<Event>>>, impl Fn(&Event) + Send + Sync + 'static) {
    let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(vec![]));
    let events_clone = events.clone();
    (events, move |event: &Event| {
        events_clone.lock().unwrap().push(event.clone());
    })
}

async fn discovered_client(server: &MockServer) -> (ColorTouchClient, Arc<Mutex<Vec<Event>>>) {
    let (events, on_event) = recorder();
    let mut client = ColorTouchClient::builder()
        .host(host(server))
        .pin("1234")
        .on_event(on_event)
        .build()
        .expect("build should succeed");
    client.refresh().await;
    assert_eq!(client.plugin_state(), PluginState::Running);
    (client, events)
}

#[tokio::test]
async fn discovery_adds_thermostat_and_runs() {
    let server = MockServer::start().await;
    mount_root(&server, 3).await;
    Mock::given(method("GET"))
        .and(path("/query/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info_body(70.0)))
        .expect(1)
        .mount(&server)
        .await;

    let (client, events) = discovered_client(&server).await;

    let thermostat = client
        .thermostat(&device_id(&server))
        .expect("thermostat should be added");
    assert_eq!(thermostat.name(), Some("Hallway"));
    assert_eq!(thermostat.state().mode, Some(ThermostatMode::Heat));
    assert_eq!(thermostat.state().indoor_temp_f, Some(68.0));
    assert_eq!(thermostat.state().target_temp_f, Some(70.0));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    match &events[0] {
        Event::DeviceAdded { name, state, .. } => {
            assert_eq!(name.as_deref(), Some("Hallway"));
            assert_eq!(state.heat_setpoint_f, Some(70.0));
        }
        other => panic!("expected DeviceAdded, got {other:?}"),
    }
    assert!(matches!(
        events[1],
        Event::PluginStateChanged {
            state: PluginState::Running
        }
    ));
}

#[tokio::test]
async fn unsupported_api_version_is_ignored() {
    let server = MockServer::start().await;
    mount_root(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/query/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info_body(70.0)))
        .expect(0)
        .mount(&server)
        .await;

    let mut client = ColorTouchClient::builder()
        .host(host(&server))
        .build()
        .unwrap();
    client.refresh().await;
    client.refresh().await;

    assert_eq!(client.plugin_state(), PluginState::Discovering);
    assert_eq!(client.thermostats().count(), 0);
}

#[tokio::test]
async fn set_variable_sends_control_then_confirms() {
    let server = MockServer::start().await;
    mount_root(&server, 3).await;
    // discovery read plus the read that precedes the control command
    Mock::given(method("GET"))
        .and(path("/query/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info_body(70.0)))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info_body(72.0)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/control"))
        .and(body_string_contains("mode=1"))
        .and(body_string_contains("heattemp=72"))
        .and(body_string_contains("cooltemp=75"))
        .and(body_string_contains("pin=1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (mut client, events) = discovered_client(&server).await;
    let id = device_id(&server);
    assert_eq!(client.tick_interval(), Duration::from_secs(5));

    client
        .set_variable(&id, Variable::TargetHeatTempF, VariableValue::Temperature(72.0))
        .await
        .expect("set_variable should succeed");
    assert!(client.thermostat(&id).unwrap().has_pending_confirmation());
    assert_eq!(client.tick_interval(), Duration::from_secs(1));

    events.lock().unwrap().clear();
    client.refresh().await;

    let thermostat = client.thermostat(&id).unwrap();
    assert!(!thermostat.has_pending_confirmation());
    assert_eq!(client.tick_interval(), Duration::from_secs(5));
    assert_eq!(thermostat.state().heat_setpoint_f, Some(72.0));

    let events = events.lock().unwrap();
    let changed: Vec<(Variable, Option<VariableValue>)> = events
        .iter()
        .filter_map(|e| match e {
            Event::VariableChanged {
                variable, value, ..
            } => Some((*variable, *value)),
            _ => None,
        })
        .collect();
    assert_eq!(changed.len(), 2);
    assert!(changed.contains(&(
        Variable::TargetHeatTempF,
        Some(VariableValue::Temperature(72.0))
    )));
    assert!(changed.contains(&(Variable::TargetTempF, Some(VariableValue::Temperature(72.0)))));
}

#[tokio::test]
async fn info_failure_invalidates_values() {
    let server = MockServer::start().await;
    mount_root(&server, 3).await;
    Mock::given(method("GET"))
        .and(path("/query/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info_body(70.0)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query/info"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (mut client, events) = discovered_client(&server).await;
    events.lock().unwrap().clear();
    client.refresh().await;

    let thermostat = client.thermostat(&device_id(&server)).unwrap();
    assert!(thermostat.state().is_empty());

    let events = events.lock().unwrap();
    assert_eq!(events.len(), Variable::ALL.len());
    assert!(events.iter().all(|e| matches!(
        e,
        Event::VariableChanged { value: None, .. }
    )));
}

#[tokio::test]
async fn loosely_typed_values_are_validated() {
    let server = MockServer::start().await;
    mount_root(&server, 3).await;
    Mock::given(method("GET"))
        .and(path("/query/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info_body(70.0)))
        .mount(&server)
        .await;

    let (mut client, _events) = discovered_client(&server).await;
    let id = device_id(&server);

    let err = client
        .set_variable_json(&id, "indoorTempF", &json!(70))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ReadOnlyVariable(Variable::IndoorTempF)));

    let err = client
        .set_variable_json(&id, "humidity", &json!(40))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownVariable(_)));

    let err = client
        .set_variable_json(&DeviceId::from_host("10.9.9.9"), "mode", &json!("COOL"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownDevice(_)));
}

#[tokio::test]
async fn message_log_records_traffic() {
    let server = MockServer::start().await;
    mount_root(&server, 3).await;
    Mock::given(method("GET"))
        .and(path("/query/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info_body(70.0)))
        .mount(&server)
        .await;

    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut client = ColorTouchClient::builder()
        .host(host(&server))
        .message_log(MessageLogMode::Diffed, tmp.path())
        .build()
        .unwrap();
    client.refresh().await;

    let lines: Vec<Value> = std::fs::read_to_string(tmp.path())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let dirs: Vec<&str> = lines.iter().map(|l| l["dir"].as_str().unwrap()).collect();
    assert_eq!(dirs, vec!["req", "resp", "req", "resp"]);
    assert_eq!(lines[0]["path"], "/");
    assert_eq!(lines[2]["path"], "/query/info");
    assert_eq!(lines[3]["full"], true);
    assert_eq!(lines[3]["body"]["name"], "Hallway");
}
