//! Event Bus implementation.
//!
//! Provides the [`EventBroadcastBus`] with its fixed channel pool, the
//! cloneable [`BusPublisher`] handed to producers, and the single
//! [`Dispatcher`] that drains the queue.

use parking_lot::MutexGuard;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::events::{EventMessage, Topic};
use crate::core::{EventListener, Transport};
use crate::error::BusError;
use crate::ramlog::StreamMute;
use crate::types::{thread_safe_vec, ThreadSafeVec};

/// Default number of push channels
pub const DEFAULT_POOL_SIZE: usize = 2;

/// Default message queue depth
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Default message size limit in bytes
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 256;

/// Name of the dispatcher thread
pub const DISPATCHER_THREAD_NAME: &str = "bus_dispatcher";

/// Index of a slot in the channel pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(usize);

impl ChannelId {
    /// Slot index
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ch({})", self.0)
    }
}

/// Lifecycle state of one channel slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Free for a new connection
    Empty,
    /// Connection admitted, handshake not finished
    Connected,
    /// Receiving messages for its topic
    Ready,
}

/// Outcome of [`EventBroadcastBus::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a rejected connection must be turned away by the caller"]
pub enum Admission {
    /// Connection occupies this slot
    Accepted(ChannelId),
    /// Pool is full
    Rejected,
}

impl Admission {
    /// True if the connection was admitted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted(_))
    }

    /// Slot assigned to the connection, if admitted
    pub fn channel_id(&self) -> Option<ChannelId> {
        match self {
            Admission::Accepted(id) => Some(*id),
            Admission::Rejected => None,
        }
    }
}

struct ChannelSlot<C> {
    connection: Option<C>,
    topic: Topic,
    ready: bool,
}

impl<C> ChannelSlot<C> {
    fn empty() -> Self {
        Self {
            connection: None,
            topic: Topic::None,
            ready: false,
        }
    }

    fn state(&self) -> ChannelState {
        match (&self.connection, self.ready) {
            (None, _) => ChannelState::Empty,
            (Some(_), false) => ChannelState::Connected,
            (Some(_), true) => ChannelState::Ready,
        }
    }

    fn reset(&mut self) {
        *self = Self::empty();
    }
}

/// Configuration for the event bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusConfig {
    /// Number of push channels in the pool.
    pub pool_size: usize,
    /// Capacity of the message queue.
    pub queue_depth: usize,
    /// Longest message payload in bytes; longer text is truncated.
    pub max_message_len: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl EventBusConfig {
    /// Check the configuration before building a bus
    pub fn validate(&self) -> Result<(), BusError> {
        if self.pool_size == 0 {
            return Err(BusError::EmptyPool);
        }
        if self.queue_depth == 0 {
            return Err(BusError::EmptyQueue);
        }
        if self.max_message_len < 4 {
            return Err(BusError::MessageLimitTooSmall {
                limit: self.max_message_len,
            });
        }
        Ok(())
    }
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Messages accepted into the queue
    pub published: u64,
    /// Messages dropped because the queue was full or closed
    pub dropped: u64,
    /// Successful per-channel deliveries
    pub delivered: u64,
    /// Failed per-channel deliveries
    pub failed: u64,
}

#[derive(Debug, Default)]
struct BusCounters {
    published: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl BusCounters {
    fn snapshot(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Producer handle onto the bus queue
///
/// Cheap to clone; every producer gets its own. Publishing never blocks.
#[derive(Clone)]
pub struct BusPublisher {
    sender: mpsc::Sender<EventMessage>,
    counters: Arc<BusCounters>,
    max_message_len: usize,
}

impl BusPublisher {
    /// Enqueue a message, returning false if it was dropped
    pub fn try_publish(&self, topic: Topic, text: &str) -> bool {
        let message = EventMessage::new(topic, text, self.max_message_len);
        match self.sender.try_send(message) {
            Ok(()) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(message)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Message queue full, dropped {} message", message.topic);
                false
            }
            Err(TrySendError::Closed(message)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Dispatcher stopped, dropped {} message", message.topic);
                false
            }
        }
    }
}

impl EventListener for BusPublisher {
    fn publish(&self, topic: Topic, text: &str) {
        self.try_publish(topic, text);
    }
}

impl std::fmt::Debug for BusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusPublisher")
            .field("max_message_len", &self.max_message_len)
            .finish()
    }
}

/// Fixed pool of push channels fed by a bounded message queue
///
/// Pool mutation (`connect`, `mark_ready`, `close`) and delivery share one
/// mutex. Publishing only touches the queue.
pub struct EventBroadcastBus<T: Transport> {
    channels: ThreadSafeVec<ChannelSlot<T::Connection>>,
    publisher: BusPublisher,
    counters: Arc<BusCounters>,
    config: EventBusConfig,
}

impl<T: Transport> EventBroadcastBus<T> {
    /// Build a bus and the dispatcher that serves it
    ///
    /// The dispatcher must be run (usually via [`Dispatcher::spawn`]) for
    /// messages to reach any channel.
    pub fn new(config: EventBusConfig, transport: Arc<T>) -> Result<(Self, Dispatcher<T>), BusError> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_depth);
        let channels = thread_safe_vec((0..config.pool_size).map(|_| ChannelSlot::empty()).collect());
        let counters = Arc::new(BusCounters::default());

        let bus = Self {
            channels: channels.clone(),
            publisher: BusPublisher {
                sender,
                counters: counters.clone(),
                max_message_len: config.max_message_len,
            },
            counters: counters.clone(),
            config,
        };
        let dispatcher = Dispatcher {
            receiver,
            channels,
            transport,
            counters,
        };
        Ok((bus, dispatcher))
    }

    /// Admit `connection` for `topic` if a slot is free
    pub fn connect(&self, connection: T::Connection, topic: Topic) -> Admission {
        let admission = {
            let mut channels = self.channels.lock();
            match channels.iter().position(|slot| slot.connection.is_none()) {
                Some(index) => {
                    let slot = &mut channels[index];
                    slot.connection = Some(connection.clone());
                    slot.topic = topic;
                    slot.ready = false;
                    Admission::Accepted(ChannelId(index))
                }
                None => Admission::Rejected,
            }
        };

        match admission {
            Admission::Accepted(id) => {
                tracing::info!("Channel {} connected to {} from {:?}", id, topic, connection)
            }
            Admission::Rejected => {
                tracing::info!("No free channel - declined {} connection from {:?}", topic, connection)
            }
        }
        admission
    }

    /// Start delivering to `connection`
    ///
    /// Returns false if the connection is unknown or already ready.
    pub fn mark_ready(&self, connection: &T::Connection) -> bool {
        let mut channels = self.channels.lock();
        match Self::find(&mut channels, connection) {
            Some(slot) if !slot.ready => {
                slot.ready = true;
                true
            }
            _ => false,
        }
    }

    /// Release the slot held by `connection`
    ///
    /// Returns false if the connection was not found (already closed).
    pub fn close(&self, connection: &T::Connection) -> bool {
        let closed = {
            let mut channels = self.channels.lock();
            match Self::find(&mut channels, connection) {
                Some(slot) => {
                    slot.reset();
                    true
                }
                None => false,
            }
        };
        if closed {
            tracing::info!("Channel closed ({:?})", connection);
        }
        closed
    }

    /// Enqueue a message without blocking; returns false if it was dropped
    pub fn publish(&self, topic: Topic, text: &str) -> bool {
        self.publisher.try_publish(topic, text)
    }

    /// A producer handle for this bus
    pub fn publisher(&self) -> BusPublisher {
        self.publisher.clone()
    }

    /// State of slot `id`, or `None` if it is outside the pool
    pub fn channel_state(&self, id: ChannelId) -> Option<ChannelState> {
        self.channels.lock().get(id.0).map(ChannelSlot::state)
    }

    /// Number of occupied slots
    pub fn occupied(&self) -> usize {
        self.channels
            .lock()
            .iter()
            .filter(|slot| slot.connection.is_some())
            .count()
    }

    /// Counter snapshot
    pub fn stats(&self) -> BusStats {
        self.counters.snapshot()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    fn find<'a>(
        channels: &'a mut MutexGuard<'_, Vec<ChannelSlot<T::Connection>>>,
        connection: &T::Connection,
    ) -> Option<&'a mut ChannelSlot<T::Connection>> {
        channels
            .iter_mut()
            .find(|slot| slot.connection.as_ref() == Some(connection))
    }
}

impl<T: Transport> EventListener for EventBroadcastBus<T> {
    fn publish(&self, topic: Topic, text: &str) {
        self.publisher.try_publish(topic, text);
    }
}

impl<T: Transport> std::fmt::Debug for EventBroadcastBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcastBus")
            .field("occupied", &self.occupied())
            .field("stats", &self.stats())
            .field("config", &self.config)
            .finish()
    }
}

/// Single consumer of the bus queue
///
/// Delivers each message, in queue order, to every ready channel subscribed
/// to the message's topic.
pub struct Dispatcher<T: Transport> {
    receiver: mpsc::Receiver<EventMessage>,
    channels: ThreadSafeVec<ChannelSlot<T::Connection>>,
    transport: Arc<T>,
    counters: Arc<BusCounters>,
}

impl<T: Transport> Dispatcher<T> {
    /// Run on a dedicated thread named [`DISPATCHER_THREAD_NAME`]
    pub fn spawn(self) -> Result<JoinHandle<()>, BusError> {
        std::thread::Builder::new()
            .name(DISPATCHER_THREAD_NAME.to_string())
            .spawn(move || self.run())
            .map_err(|e| BusError::DispatcherSpawn {
                reason: e.to_string(),
            })
    }

    /// Block on the queue and deliver until every publisher is dropped
    ///
    /// Must not be called from inside an async runtime.
    pub fn run(mut self) {
        tracing::info!("Bus dispatcher started");
        while let Some(message) = self.receiver.blocking_recv() {
            self.dispatch(&message);
        }
        tracing::info!("Bus dispatcher stopped, all publishers gone");
    }

    /// Deliver every message already queued, without waiting
    ///
    /// Returns the number of messages taken from the queue.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(message) = self.receiver.try_recv() {
            self.dispatch(&message);
            count += 1;
        }
        count
    }

    /// Deliver one message; returns the number of successful deliveries
    ///
    /// Lines logged while delivering are kept out of the log stream, so a
    /// failing log-stream channel cannot feed its own failure notes back in.
    pub fn dispatch(&self, message: &EventMessage) -> usize {
        if message.topic == Topic::None {
            return 0;
        }

        let _mute = StreamMute::enter();
        let channels = self.channels.lock();
        let mut delivered = 0;
        for (index, slot) in channels.iter().enumerate() {
            let Some(connection) = slot.connection.as_ref() else {
                continue;
            };
            if !slot.ready || slot.topic != message.topic {
                continue;
            }

            match self.transport.send(connection, message.text.as_bytes()) {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    delivered += 1;
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Delivery to {} failed: {}", ChannelId(index), e);
                }
            }
        }
        delivered
    }
}

impl<T: Transport> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("stats", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}
