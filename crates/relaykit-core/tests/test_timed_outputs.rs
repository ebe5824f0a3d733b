use parking_lot::Mutex;
use relaykit_core::error::TransportError;
use relaykit_core::gpio::{InputEventSource, InputId, InputSpec, OutputId, OutputSpec, SimulatedGpio, TimedOutputController};
use relaykit_core::ramlog::{LogCapture, RingLogStore};
use relaykit_core::{Clock, EventBroadcastBus, EventBusConfig, ManualClock, Timestamp, Topic, Transport};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Capture {
    sent: Mutex<Vec<(u32, String)>>,
}

impl Transport for Capture {
    type Connection = u32;

    fn send(&self, connection: &u32, payload: &[u8]) -> Result<(), TransportError> {
        self.sent
            .lock()
            .push((*connection, String::from_utf8_lossy(payload).into_owned()));
        Ok(())
    }
}

fn led_specs() -> Vec<OutputSpec> {
    vec![
        OutputSpec::new("led1", "GPIOB", 0),
        OutputSpec::new("led2", "GPIOE", 1),
        OutputSpec::new("led3", "GPIOB", 14),
    ]
}

#[test]
fn test_timed_set_reverts_after_delay() {
    let gpio = Arc::new(SimulatedGpio::new(3, 0));
    let clock = Arc::new(ManualClock::new(Timestamp::ZERO));
    let outputs = TimedOutputController::new(
        &led_specs(),
        gpio.clone(),
        clock.clone(),
        Arc::new(relaykit_core::NullListener),
    )
    .unwrap();
    let led1 = outputs.lookup_by_name("led1").unwrap();

    outputs.set(led1, true, Duration::from_millis(500));

    assert_eq!(outputs.tick(Timestamp::from_millis(400)), 0);
    assert_eq!(outputs.value(led1), Some(true));

    assert_eq!(outputs.tick(Timestamp::from_millis(501)), 1);
    assert_eq!(outputs.value(led1), Some(false));
    assert_eq!(outputs.channel(led1).unwrap().expiry, None);
    assert_eq!(gpio.output(led1), Some(false));
}

#[test]
fn test_tick_at_exact_expiry_reverts() {
    let gpio = Arc::new(SimulatedGpio::new(3, 0));
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(100)));
    let outputs = TimedOutputController::new(
        &led_specs(),
        gpio.clone(),
        clock.clone(),
        Arc::new(relaykit_core::NullListener),
    )
    .unwrap();
    let led2 = outputs.set_by_name("led2", true, Duration::from_millis(500)).unwrap();
    assert_eq!(outputs.channel(led2).unwrap().expiry, Some(Timestamp::from_millis(600)));

    assert_eq!(outputs.tick(Timestamp::from_millis(599)), 0);
    assert_eq!(outputs.tick(Timestamp::from_millis(600)), 1);
    assert_eq!(outputs.value(led2), Some(false));
    assert_eq!(gpio.output(led2), Some(false));
}

#[test]
fn test_scheduler_ticks_with_clock() {
    let gpio = Arc::new(SimulatedGpio::new(3, 0));
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
    let outputs = TimedOutputController::new(
        &led_specs(),
        gpio.clone(),
        clock.clone(),
        Arc::new(relaykit_core::NullListener),
    )
    .unwrap();

    outputs.set_by_name("led2", true, Duration::from_millis(250)).unwrap();
    outputs.set_by_name("led3", true, Duration::from_millis(450)).unwrap();

    let mut reverted = Vec::new();
    for _ in 0..5 {
        let now = clock.advance(Duration::from_millis(100));
        reverted.push(outputs.tick(now));
    }
    assert_eq!(reverted, vec![0, 0, 1, 0, 1]);
    assert_eq!(outputs.status_json(), r#"{"led1":0,"led2":0,"led3":0}"#);
}

#[test]
fn test_gpio_and_log_events_reach_subscribers() {
    let transport = Arc::new(Capture::default());
    let (bus, mut dispatcher) =
        EventBroadcastBus::new(EventBusConfig::default(), transport.clone()).unwrap();
    let publisher = Arc::new(bus.publisher());

    let gpio = Arc::new(SimulatedGpio::new(3, 1));
    let clock = Arc::new(ManualClock::default());
    let outputs =
        TimedOutputController::new(&led_specs(), gpio.clone(), clock.clone(), publisher.clone()).unwrap();
    let inputs = InputEventSource::new(&[InputSpec::new("door", "GPIOA", 2)], gpio.clone(), publisher.clone())
        .unwrap();
    let capture = LogCapture::new(Arc::new(RingLogStore::new(1024, 64).unwrap()));
    capture.attach_listener(publisher);

    let _ = bus.connect(1, Topic::GpioStatus);
    let _ = bus.connect(2, Topic::LogStream);
    bus.mark_ready(&1);
    bus.mark_ready(&2);

    outputs.set(OutputId(2), true, Duration::from_millis(100));
    gpio.set_input(InputId(0), true).unwrap();
    inputs.on_edge("GPIOA", 1 << 2);
    capture.capture_line("door opened\n");
    outputs.tick(clock.now().saturating_add(Duration::from_millis(100)));

    assert_eq!(dispatcher.dispatch_pending(), 4);
    let sent = transport.sent.lock().clone();
    assert_eq!(
        sent,
        vec![
            (1, r#"{"led3":1}"#.to_string()),
            (1, r#"{"door":1}"#.to_string()),
            (2, "door opened\n".to_string()),
            (1, r#"{"led3":0}"#.to_string()),
        ]
    );
    assert_eq!(capture.store().render(), "door opened\n");
}
