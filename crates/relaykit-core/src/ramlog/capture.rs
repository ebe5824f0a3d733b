//! Log line capture
//!
//! Receives already formatted lines from the logging backend, stores them in
//! the ring and forwards them to the live log stream.

use crate::core::SharedListener;
use crate::event_bus::Topic;
use crate::ramlog::RingLogStore;
use parking_lot::RwLock;
use std::cell::Cell;
use std::sync::Arc;

thread_local! {
    // Set while this thread delivers log-stream messages
    static STREAM_MUTED: Cell<bool> = const { Cell::new(false) };
}

/// Keeps lines captured on the current thread out of the log stream
///
/// Lines are still written to the store. The previous state is restored on
/// drop, so guards nest.
pub struct StreamMute {
    previous: bool,
}

impl StreamMute {
    /// Mute the log stream for the current thread until the guard is dropped
    pub fn enter() -> Self {
        Self {
            previous: STREAM_MUTED.with(|m| m.replace(true)),
        }
    }

    /// True if the current thread is muted
    pub fn is_active() -> bool {
        STREAM_MUTED.with(|m| m.get())
    }
}

impl Drop for StreamMute {
    fn drop(&mut self) {
        STREAM_MUTED.with(|m| m.set(self.previous));
    }
}

/// Writes formatted log lines to a [`RingLogStore`] and an optional listener
///
/// The listener is attached after construction because the logging backend
/// is usually installed before the event bus exists.
pub struct LogCapture {
    store: Arc<RingLogStore>,
    listener: RwLock<Option<SharedListener>>,
}

impl LogCapture {
    /// Create a capture writing into `store` only
    pub fn new(store: Arc<RingLogStore>) -> Self {
        Self {
            store,
            listener: RwLock::new(None),
        }
    }

    /// Forward every captured line to `listener` on [`Topic::LogStream`]
    pub fn attach_listener(&self, listener: SharedListener) {
        *self.listener.write() = Some(listener);
    }

    /// Stop forwarding lines
    pub fn detach_listener(&self) {
        *self.listener.write() = None;
    }

    /// Store `line` and publish it to the log stream
    ///
    /// The bus message is derived from the line after it has been written to
    /// the store; there is no stronger ordering between the two. Lines
    /// captured under a [`StreamMute`] are stored only.
    pub fn capture_line(&self, line: &str) {
        self.store.write_line(line);
        if StreamMute::is_active() {
            return;
        }
        if let Some(listener) = self.listener.read().as_ref() {
            listener.publish(Topic::LogStream, line);
        }
    }

    /// The backing store, for report generators
    pub fn store(&self) -> &Arc<RingLogStore> {
        &self.store
    }
}

impl std::fmt::Debug for LogCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCapture")
            .field("store", &self.store)
            .field("listener_attached", &self.listener.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EventListener;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Topic, String)>>);

    impl EventListener for Recorder {
        fn publish(&self, topic: Topic, text: &str) {
            self.0.lock().push((topic, text.to_string()));
        }
    }

    #[test]
    fn test_capture_without_listener() {
        let store = Arc::new(RingLogStore::new(256, 64).unwrap());
        let capture = LogCapture::new(store.clone());

        capture.capture_line("boot\n");
        assert_eq!(store.render(), "boot\n");
    }

    #[test]
    fn test_capture_forwards_to_log_stream() {
        let store = Arc::new(RingLogStore::new(256, 64).unwrap());
        let capture = LogCapture::new(store.clone());
        let recorder = Arc::new(Recorder::default());
        capture.attach_listener(recorder.clone());

        capture.capture_line("hello\n");
        capture.detach_listener();
        capture.capture_line("quiet\n");

        let seen = recorder.0.lock().clone();
        assert_eq!(seen, vec![(Topic::LogStream, "hello\n".to_string())]);
        assert_eq!(store.render(), "hello\nquiet\n");
    }

    #[test]
    fn test_muted_lines_stored_not_streamed() {
        let store = Arc::new(RingLogStore::new(256, 64).unwrap());
        let capture = LogCapture::new(store.clone());
        let recorder = Arc::new(Recorder::default());
        capture.attach_listener(recorder.clone());

        {
            let _outer = StreamMute::enter();
            {
                let _inner = StreamMute::enter();
                capture.capture_line("inner\n");
            }
            assert!(StreamMute::is_active());
            capture.capture_line("outer\n");
        }
        assert!(!StreamMute::is_active());
        capture.capture_line("live\n");

        let seen = recorder.0.lock().clone();
        assert_eq!(seen, vec![(Topic::LogStream, "live\n".to_string())]);
        assert_eq!(store.render(), "inner\nouter\nlive\n");
    }
}
