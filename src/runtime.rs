//! Runtime wiring
//!
//! Builds the RAM log capture, event bus, output controller and input source
//! from a [`Config`], runs the bus dispatcher on its own thread and drives
//! the output scheduler.

use anyhow::Context as _;
use relaykit_core::event_bus::EventBroadcastBus;
use relaykit_core::gpio::{InputEventSource, RequestOutcome, TimedOutputController};
use relaykit_core::ramlog::{LogCapture, RingLogStore};
use relaykit_core::{Clock, InputDriver, OutputDriver, SharedListener, Transport};
use relaykit_settings::Config;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Hardware-facing capabilities handed to the runtime
pub struct Drivers {
    /// Writes output levels
    pub outputs: Arc<dyn OutputDriver>,
    /// Reads input levels
    pub inputs: Arc<dyn InputDriver>,
    /// Time source for output expiry
    pub clock: Arc<dyn Clock>,
}

/// All runtime components, wired together
///
/// Dropping the runtime detaches the log stream from the bus; once every
/// publisher handle is gone the dispatcher thread exits.
pub struct Runtime<T: Transport> {
    capture: Arc<LogCapture>,
    bus: EventBroadcastBus<T>,
    outputs: TimedOutputController,
    inputs: InputEventSource,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    dispatcher: Option<JoinHandle<()>>,
}

impl<T: Transport> Runtime<T> {
    /// Build every component and start the dispatcher thread
    ///
    /// Outputs are driven to their defaults before the bus starts delivering.
    pub fn start(
        config: &Config,
        capture: Arc<LogCapture>,
        transport: Arc<T>,
        drivers: Drivers,
    ) -> anyhow::Result<Self> {
        config.validate().context("Invalid configuration")?;

        let (bus, dispatcher) = EventBroadcastBus::new(config.bus_config(), transport)?;
        let publisher: SharedListener = Arc::new(bus.publisher());

        let outputs = TimedOutputController::new(
            &config.outputs,
            drivers.outputs,
            drivers.clock.clone(),
            publisher.clone(),
        )
        .context("Invalid output table")?;
        let inputs = InputEventSource::new(&config.inputs, drivers.inputs, publisher.clone())
            .context("Invalid input table")?;

        capture.attach_listener(publisher);
        let dispatcher = dispatcher.spawn()?;

        tracing::info!(
            "Runtime started: {} outputs, {} inputs, {} channels",
            outputs.len(),
            inputs.len(),
            config.bus.pool_size
        );

        Ok(Self {
            capture,
            bus,
            outputs,
            inputs,
            clock: drivers.clock,
            tick_interval: config.scheduler.tick_interval(),
            dispatcher: Some(dispatcher),
        })
    }

    /// Channel pool, for connect and close from the transport
    pub fn bus(&self) -> &EventBroadcastBus<T> {
        &self.bus
    }

    /// Output controller, for request handlers
    pub fn outputs(&self) -> &TimedOutputController {
        &self.outputs
    }

    /// Input source, for the edge handler
    pub fn inputs(&self) -> &InputEventSource {
        &self.inputs
    }

    /// Backing RAM log store
    pub fn store(&self) -> &Arc<RingLogStore> {
        self.capture.store()
    }

    /// Whole RAM log as text
    pub fn log_report(&self) -> String {
        self.store().render()
    }

    /// Drop all RAM log content
    pub fn clear_log(&self) {
        self.store().clear();
        tracing::info!("RAM log cleared");
    }

    /// Apply a JSON set request body such as `{"led1":1,"led2":{"value":1,"delay_ms":500}}`
    pub fn handle_set_request(&self, body: &str) -> anyhow::Result<RequestOutcome> {
        let request: Map<String, Value> =
            serde_json::from_str(body).context("Set request must be a JSON object")?;
        Ok(self.outputs.apply_request(&request))
    }

    /// Tick the output controller every configured interval until `shutdown` resolves
    pub async fn run_scheduler<F: Future>(&self, shutdown: F) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::debug!("Scheduler running every {:?}", self.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.outputs.tick(self.clock.now());
                }
                _ = &mut shutdown => break,
            }
        }
        tracing::debug!("Scheduler stopped");
    }

    /// Stop the runtime and wait for the dispatcher to drain the queue
    ///
    /// Blocks until every [`BusPublisher`](relaykit_core::BusPublisher)
    /// handed out by [`bus`](Self::bus) has been dropped.
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        let dispatcher = self.dispatcher.take();
        drop(self);
        if let Some(handle) = dispatcher {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("Bus dispatcher thread panicked"))?;
        }
        Ok(())
    }
}

impl<T: Transport> Drop for Runtime<T> {
    fn drop(&mut self) {
        self.capture.detach_listener();
    }
}

impl<T: Transport> std::fmt::Debug for Runtime<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("bus", &self.bus)
            .field("outputs", &self.outputs)
            .field("inputs", &self.inputs)
            .field("tick_interval", &self.tick_interval)
            .finish()
    }
}
