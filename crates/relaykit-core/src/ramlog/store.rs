//! Fixed-memory circular log store.
//!
//! The buffer is split into equally sized slots. Every slot starts with a
//! 4-byte little-endian header (magic `0x55aa`, 16-bit sequence id) followed
//! by a zero-padded payload. A log line longer than one payload is spread
//! over consecutive slots.
//!
//! `head` and `tail` are byte offsets counted modulo `2 * capacity`, so a
//! full buffer (`tail - head == capacity`) and an empty one (`tail == head`)
//! are distinguishable without a separate counter.
//!
//! # Consistency
//!
//! Each write and each slot read happens inside one short critical section,
//! so a single slot is never observed half-written. Readers are therefore
//! not lock-free: `next` takes the same mutex as `write_line`, for one slot
//! copy and no longer, and holds nothing between calls. A [`LogCursor`] is held
//! by the reader between calls, though, and writers do not know about it.
//! If writers overwrite the slots a cursor points at before the reader gets
//! there, the reader sees newer lines in place of the evicted ones, or skips
//! over them. [`RingLogStore::is_lapped`] reports when that has happened;
//! the store itself never corrects a lapped cursor.

use crate::error::RamLogError;
use parking_lot::Mutex;

/// Bytes taken by the slot header
pub const SLOT_HEADER_LEN: usize = 4;

/// Marker written at the start of every slot
pub const SLOT_MAGIC: u16 = 0x55aa;

/// Default buffer size in bytes
pub const DEFAULT_CAPACITY: usize = 65536;

/// Default slot size in bytes
pub const DEFAULT_SLOT_SIZE: usize = 64;

/// Smallest slot that still fits one 4-byte UTF-8 character
pub const MIN_SLOT_SIZE: usize = SLOT_HEADER_LEN + 4;

/// Largest capacity whose doubled cursor range fits in `u32`
pub const MAX_CAPACITY: usize = 1 << 30;

/// Caller-held read position in a [`RingLogStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogCursor(u32);

impl LogCursor {
    /// Raw byte offset, modulo twice the store capacity
    pub fn offset(self) -> u32 {
        self.0
    }
}

/// One slot as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Diagnostic sequence number, wraps at 65536
    pub sequence_id: u16,
    /// Slot payload up to the first NUL byte
    pub text: String,
}

struct RingState {
    buf: Box<[u8]>,
    head: u32,
    tail: u32,
    next_id: u16,
}

/// Fixed-capacity circular store of log lines
pub struct RingLogStore {
    state: Mutex<RingState>,
    capacity: u32,
    slot_size: u32,
}

impl RingLogStore {
    /// Create a store of `capacity` bytes split into `slot_size` byte slots
    pub fn new(capacity: usize, slot_size: usize) -> Result<Self, RamLogError> {
        if slot_size < MIN_SLOT_SIZE {
            return Err(RamLogError::SlotTooSmall {
                slot_size,
                min: MIN_SLOT_SIZE,
            });
        }
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(RamLogError::CapacityOutOfRange {
                capacity,
                max: MAX_CAPACITY,
            });
        }
        if capacity % slot_size != 0 {
            return Err(RamLogError::MisalignedCapacity {
                capacity,
                slot_size,
            });
        }

        Ok(Self::with_geometry(capacity as u32, slot_size as u32))
    }

    fn with_geometry(capacity: u32, slot_size: u32) -> Self {
        Self {
            state: Mutex::new(RingState {
                buf: vec![0u8; capacity as usize].into_boxed_slice(),
                head: 0,
                tail: 0,
                next_id: 0,
            }),
            capacity,
            slot_size,
        }
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Slot size in bytes
    pub fn slot_size(&self) -> usize {
        self.slot_size as usize
    }

    /// Payload bytes per slot
    pub fn payload_len(&self) -> usize {
        self.slot_size() - SLOT_HEADER_LEN
    }

    /// Number of slots the store can hold
    pub fn capacity_slots(&self) -> usize {
        (self.capacity / self.slot_size) as usize
    }

    /// Bytes currently occupied (`tail - head`)
    pub fn len_bytes(&self) -> usize {
        let state = self.state.lock();
        self.used(&state) as usize
    }

    /// Slots currently occupied
    pub fn len_slots(&self) -> usize {
        self.len_bytes() / self.slot_size()
    }

    /// True when no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.len_bytes() == 0
    }

    /// Append a line, evicting the oldest slots as needed
    ///
    /// The text is split into chunks of at most [`payload_len`](Self::payload_len)
    /// bytes, cut on character boundaries, one slot per chunk. An empty line
    /// still occupies one slot. All chunks of a line are written inside the
    /// same critical section, so lines from concurrent writers never interleave.
    pub fn write_line(&self, text: &str) {
        let payload_len = self.payload_len();
        let mut state = self.state.lock();

        if text.is_empty() {
            self.write_slot(&mut state, &[]);
            return;
        }

        let mut rest = text;
        while !rest.is_empty() {
            let mut end = rest.len().min(payload_len);
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            let (chunk, tail) = rest.split_at(end);
            self.write_slot(&mut state, chunk.as_bytes());
            rest = tail;
        }
    }

    /// Start a snapshot at the oldest retained slot
    pub fn begin_snapshot(&self) -> LogCursor {
        LogCursor(self.state.lock().head)
    }

    /// Read the slot at `cursor` and return the advanced cursor
    ///
    /// Returns `None` once the cursor reaches the write position. That marks
    /// the end of this snapshot only; later writes can be read by calling
    /// `next` again with the same cursor.
    pub fn next(&self, cursor: LogCursor) -> (Option<String>, LogCursor) {
        let (entry, cursor) = self.next_entry(cursor);
        (entry.map(|e| e.text), cursor)
    }

    /// Like [`next`](Self::next) but also returns the slot's sequence id
    pub fn next_entry(&self, cursor: LogCursor) -> (Option<LogEntry>, LogCursor) {
        let state = self.state.lock();
        if cursor.0 == state.tail {
            return (None, cursor);
        }

        let start = self.slot_start(cursor.0);
        let slot = &state.buf[start..start + self.slot_size()];
        let sequence_id = u16::from_le_bytes([slot[2], slot[3]]);
        let payload = &slot[SLOT_HEADER_LEN..];
        let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
        let text = String::from_utf8_lossy(&payload[..end]).into_owned();

        let next = LogCursor(self.advance(cursor.0, self.slot_size));
        (Some(LogEntry { sequence_id, text }), next)
    }

    /// True when writers have evicted slots this cursor had not read yet
    pub fn is_lapped(&self, cursor: LogCursor) -> bool {
        let state = self.state.lock();
        let behind_tail = self.distance(cursor.0, state.tail);
        behind_tail > self.used(&state)
    }

    /// Drop all content in O(1); memory is not zeroed
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.head = 0;
        state.tail = 0;
    }

    /// Iterate a fresh snapshot slot by slot
    pub fn lines(&self) -> Lines<'_> {
        Lines {
            store: self,
            cursor: self.begin_snapshot(),
        }
    }

    /// Whole log as one string, slots concatenated in order
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.len_bytes());
        for line in self.lines() {
            out.push_str(&line);
        }
        out
    }

    fn write_slot(&self, state: &mut RingState, chunk: &[u8]) {
        if self.used(state) + self.slot_size > self.capacity {
            state.head = self.advance(state.head, self.slot_size);
        }

        let start = self.slot_start(state.tail);
        let slot = &mut state.buf[start..start + self.slot_size as usize];
        let id = state.next_id;
        slot[0..2].copy_from_slice(&SLOT_MAGIC.to_le_bytes());
        slot[2..4].copy_from_slice(&id.to_le_bytes());
        let payload = &mut slot[SLOT_HEADER_LEN..];
        payload[..chunk.len()].copy_from_slice(chunk);
        payload[chunk.len()..].fill(0);

        state.next_id = id.wrapping_add(1);
        state.tail = self.advance(state.tail, self.slot_size);
    }

    fn used(&self, state: &RingState) -> u32 {
        self.distance(state.head, state.tail)
    }

    // Forward distance from `from` to `to` in the doubled offset space.
    fn distance(&self, from: u32, to: u32) -> u32 {
        let span = self.capacity * 2;
        (to % span + span - from % span) % span
    }

    fn advance(&self, offset: u32, by: u32) -> u32 {
        (offset % (self.capacity * 2) + by) % (self.capacity * 2)
    }

    fn slot_start(&self, offset: u32) -> usize {
        let pos = offset % self.capacity;
        (pos - pos % self.slot_size) as usize
    }
}

impl Default for RingLogStore {
    fn default() -> Self {
        Self::with_geometry(DEFAULT_CAPACITY as u32, DEFAULT_SLOT_SIZE as u32)
    }
}

impl std::fmt::Debug for RingLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingLogStore")
            .field("capacity", &self.capacity)
            .field("slot_size", &self.slot_size)
            .field("len_bytes", &self.len_bytes())
            .finish()
    }
}

/// Iterator over one snapshot of a [`RingLogStore`]
#[derive(Debug)]
pub struct Lines<'a> {
    store: &'a RingLogStore,
    cursor: LogCursor,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let (line, cursor) = self.store.next(self.cursor);
        self.cursor = cursor;
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(store: &RingLogStore) -> Vec<String> {
        store.lines().collect()
    }

    #[test]
    fn test_geometry_validation() {
        assert!(matches!(
            RingLogStore::new(256, 4),
            Err(RamLogError::SlotTooSmall { .. })
        ));
        assert!(matches!(
            RingLogStore::new(100, 64),
            Err(RamLogError::MisalignedCapacity { .. })
        ));
        assert!(matches!(
            RingLogStore::new(0, 64),
            Err(RamLogError::CapacityOutOfRange { .. })
        ));

        let store = RingLogStore::new(256, 64).unwrap();
        assert_eq!(store.capacity_slots(), 4);
        assert_eq!(store.payload_len(), 60);
    }

    #[test]
    fn test_empty_store_yields_nothing() {
        let store = RingLogStore::new(256, 64).unwrap();
        let cursor = store.begin_snapshot();
        assert_eq!(store.next(cursor), (None, cursor));
        assert!(store.is_empty());
    }

    #[test]
    fn test_oldest_slot_is_evicted() {
        let store = RingLogStore::new(256, 64).unwrap();
        for line in ["A", "B", "C", "D", "E"] {
            store.write_line(line);
        }

        assert_eq!(drain(&store), vec!["B", "C", "D", "E"]);
        assert_eq!(store.len_bytes(), 256);
    }

    #[test]
    fn test_long_line_spans_slots() {
        let store = RingLogStore::new(256, 16).unwrap();
        let line = "0123456789abcdefghij";
        store.write_line(line);

        let lines = drain(&store);
        assert_eq!(lines, vec!["0123456789ab", "cdefghij"]);
        assert_eq!(lines.concat(), line);
    }

    #[test]
    fn test_multi_slot_line_evicts_several() {
        let store = RingLogStore::new(64, 16).unwrap();
        store.write_line("one");
        store.write_line("two");
        store.write_line("three");
        store.write_line("four");
        // 3 slots, evicts "one", "two" and "three"
        store.write_line("aaaaaaaaaaaabbbbbbbbbbbbcc");

        assert_eq!(drain(&store), vec!["four", "aaaaaaaaaaaa", "bbbbbbbbbbbb", "cc"]);
    }

    #[test]
    fn test_chunks_respect_char_boundaries() {
        let store = RingLogStore::new(64, 8).unwrap();
        // payload is 4 bytes, 'é' is 2 bytes
        store.write_line("aéé");

        let lines = drain(&store);
        assert_eq!(lines.concat(), "aéé");
        assert!(lines.iter().all(|l| !l.contains('\u{fffd}')));
    }

    #[test]
    fn test_clear_resets_cursors() {
        let store = RingLogStore::new(256, 64).unwrap();
        store.write_line("x");
        store.clear();

        let cursor = store.begin_snapshot();
        assert_eq!(store.next(cursor).0, None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_sequence_ids_increase_and_wrap() {
        let store = RingLogStore::new(64, 16).unwrap();
        for _ in 0..u16::MAX as usize {
            store.write_line("x");
        }
        store.write_line("last");
        store.write_line("wrapped");

        let mut cursor = store.begin_snapshot();
        let mut ids = Vec::new();
        loop {
            let (entry, next) = store.next_entry(cursor);
            match entry {
                Some(entry) => ids.push(entry.sequence_id),
                None => break,
            }
            cursor = next;
        }
        assert_eq!(ids, vec![65533, 65534, 65535, 0]);
    }

    #[test]
    fn test_slot_header_layout() {
        let store = RingLogStore::new(32, 16).unwrap();
        store.write_line("hi");

        let state = store.state.lock();
        assert_eq!(&state.buf[0..2], &SLOT_MAGIC.to_le_bytes());
        assert_eq!(&state.buf[2..4], &0u16.to_le_bytes());
        assert_eq!(&state.buf[4..6], b"hi");
        assert!(state.buf[6..16].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_cursor_resumes_after_new_writes() {
        let store = RingLogStore::new(256, 64).unwrap();
        store.write_line("first");

        let cursor = store.begin_snapshot();
        let (line, cursor) = store.next(cursor);
        assert_eq!(line.as_deref(), Some("first"));
        assert_eq!(store.next(cursor).0, None);

        store.write_line("second");
        assert_eq!(store.next(cursor).0.as_deref(), Some("second"));
    }

    #[test]
    fn test_lapped_cursor_is_reported() {
        let store = RingLogStore::new(64, 16).unwrap();
        store.write_line("a");
        let cursor = store.begin_snapshot();
        assert!(!store.is_lapped(cursor));

        for _ in 0..4 {
            store.write_line("b");
        }
        assert!(store.is_lapped(cursor));
    }

    #[test]
    fn test_render_concatenates_slots() {
        let store = RingLogStore::new(256, 64).unwrap();
        store.write_line("one\n");
        store.write_line("two\n");
        assert_eq!(store.render(), "one\ntwo\n");
    }

    #[test]
    fn test_default_geometry() {
        let store = RingLogStore::default();
        assert_eq!(store.capacity(), DEFAULT_CAPACITY);
        assert_eq!(store.slot_size(), DEFAULT_SLOT_SIZE);
        assert_eq!(store.capacity_slots(), 1024);
    }
}
