use relaykit::{init_logging, Config, Drivers, MonotonicClock, Runtime, SimulatedGpio, StdoutTransport};
use relaykit_core::event_bus::{GPIO_STATUS_ENDPOINT, LOG_STREAM_ENDPOINT};
use relaykit_core::Topic;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = match std::env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => Config::default_path()?,
    };
    let config = Config::load_or_default(&path)?;

    // Initialize logging
    let capture = init_logging(&config)?;
    tracing::info!("RelayKit {} (built {})", relaykit::VERSION, relaykit::BUILD_DATE);

    let gpio = Arc::new(SimulatedGpio::new(config.outputs.len(), config.inputs.len()));
    let drivers = Drivers {
        outputs: gpio.clone(),
        inputs: gpio,
        clock: Arc::new(MonotonicClock::new()),
    };
    let runtime = Runtime::start(&config, capture, Arc::new(StdoutTransport), drivers)?;

    // One simulated client per endpoint
    for (client, endpoint) in [(1u32, GPIO_STATUS_ENDPOINT), (2u32, LOG_STREAM_ENDPOINT)] {
        let Some(topic) = Topic::from_endpoint(endpoint) else {
            continue;
        };
        if runtime.bus().connect(client, topic).is_accepted() {
            runtime.bus().mark_ready(&client);
        }
    }

    if let Some(first) = config.outputs.first() {
        runtime
            .outputs()
            .set_by_name(&first.name, !first.default_value, Duration::from_secs(1))?;
    }

    runtime
        .run_scheduler(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await;

    tracing::info!("Shutting down");
    runtime.shutdown()
}
