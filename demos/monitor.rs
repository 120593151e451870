use colortouch::{ColorTouchClient, Event, MessageLogMode};
use std::env;

#[tokio::main]
async fn main() -> colortouch::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let Some(host) = args.get(1) else {
        eprintln!("usage: monitor <host> [--pin <pin>] [--log <file>]");
        std::process::exit(2);
    };
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let mut builder = ColorTouchClient::builder()
        .thermostat_host(host.as_str())
        .on_event(|event| match event {
            Event::DeviceAdded { device_id, name, state } => {
                println!(
                    "[{device_id}] added {} | mode: {:?} | fan: {:?} | indoor: {:?}\u{00b0}F | target: {:?}\u{00b0}F",
                    name.as_deref().unwrap_or("unnamed"),
                    state.mode,
                    state.fan_mode,
                    state.indoor_temp_f,
                    state.target_temp_f,
                );
            }
            Event::VariableChanged { device_id, variable, value } => {
                println!("[{device_id}] {variable} = {value:?}");
            }
            Event::PluginStateChanged { state } => println!("plugin {state:?}"),
        });

    if let Some(pin) = flag("--pin") {
        builder = builder.pin(pin);
    }
    if let Some(path) = flag("--log") {
        builder = builder.message_log(MessageLogMode::Diffed, path);
    }

    let mut client = builder.build()?;
    println!("Monitoring {host}...");

    loop {
        client.refresh().await;
        tokio::time::sleep(client.tick_interval()).await;
    }
}
