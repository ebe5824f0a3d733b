use proptest::prelude::*;
use relaykit_core::ramlog::{RingLogStore, SLOT_HEADER_LEN};
use std::sync::Arc;
use std::thread;

/// Slots an ASCII line occupies: fixed-width chunks, empty line takes one
fn chunks(line: &str, payload_len: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    line.as_bytes()
        .chunks(payload_len)
        .map(|c| String::from_utf8(c.to_vec()).unwrap())
        .collect()
}

#[test]
fn test_five_writes_into_four_slots() {
    let store = RingLogStore::new(256, 64).unwrap();
    assert_eq!(store.capacity_slots(), 4);

    for line in ["A", "B", "C", "D", "E"] {
        store.write_line(line);
    }

    let mut seen = Vec::new();
    let mut cursor = store.begin_snapshot();
    loop {
        let (line, next) = store.next(cursor);
        match line {
            Some(line) => seen.push(line),
            None => break,
        }
        cursor = next;
    }
    assert_eq!(seen, vec!["B", "C", "D", "E"]);
}

#[test]
fn test_clear_then_snapshot_is_empty() {
    let store = RingLogStore::new(256, 64).unwrap();
    store.write_line("one\n");
    store.write_line("two\n");
    store.clear();

    let cursor = store.begin_snapshot();
    assert_eq!(store.next(cursor).0, None);
    assert_eq!(store.len_bytes(), 0);

    store.write_line("three\n");
    assert_eq!(store.render(), "three\n");
}

#[test]
fn test_independent_snapshots() {
    let store = RingLogStore::new(512, 32).unwrap();
    for i in 0..5 {
        store.write_line(&format!("line {i}\n"));
    }

    let first = store.begin_snapshot();
    let (a, first) = store.next(first);
    let second = store.begin_snapshot();
    let (b, _) = store.next(second);
    let (c, _) = store.next(first);

    assert_eq!(a.as_deref(), Some("line 0\n"));
    assert_eq!(b.as_deref(), Some("line 0\n"));
    assert_eq!(c.as_deref(), Some("line 1\n"));
}

#[test]
fn test_end_of_snapshot_is_resumable() {
    let store = RingLogStore::new(256, 64).unwrap();
    store.write_line("a");
    let (_, cursor) = store.next(store.begin_snapshot());
    assert_eq!(store.next(cursor).0, None);

    store.write_line("b");
    assert_eq!(store.next(cursor).0.as_deref(), Some("b"));
}

#[test]
fn test_lapped_cursor_is_detected() {
    let store = RingLogStore::new(256, 64).unwrap();
    store.write_line("old");
    let cursor = store.begin_snapshot();
    assert!(!store.is_lapped(cursor));

    for i in 0..4 {
        store.write_line(&format!("new {i}"));
    }
    assert!(store.is_lapped(cursor));
    assert!(!store.is_lapped(store.begin_snapshot()));
}

#[test]
fn test_concurrent_writers_keep_lines_whole() {
    let store = Arc::new(RingLogStore::new(64 * 1024, 64).unwrap());
    let line = "x".repeat(150);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let line = line.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    store.write_line(&line);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 200 lines of 150 bytes, 60 bytes per slot: 3 slots each, nothing evicted
    assert_eq!(store.len_slots(), 600);
    let rendered = store.render();
    assert_eq!(rendered.len(), 200 * 150);
    assert!(rendered.bytes().all(|b| b == b'x'));
}

proptest! {
    #[test]
    fn prop_retains_most_recent_slots(lines in prop::collection::vec("[ -~]{0,60}", 0..80)) {
        let store = RingLogStore::new(256, 16).unwrap();
        let payload_len = 16 - SLOT_HEADER_LEN;

        let mut expected: Vec<String> = Vec::new();
        for line in &lines {
            store.write_line(line);
            expected.extend(chunks(line, payload_len));
            prop_assert!(store.len_bytes() <= store.capacity());
        }

        let keep = expected.len().min(store.capacity_slots());
        let expected = expected.split_off(expected.len() - keep);
        let actual: Vec<String> = store.lines().collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_snapshot_reassembles_lines(lines in prop::collection::vec("\\PC{0,30}", 0..8)) {
        // 8 lines of at most 30 chars (120 bytes) fit without eviction
        let store = RingLogStore::new(64 * 64, 64).unwrap();
        for line in &lines {
            store.write_line(line);
        }

        let mut rendered = String::new();
        for chunk in store.lines() {
            prop_assert!(chunk.len() <= store.payload_len());
            rendered.push_str(&chunk);
        }
        prop_assert_eq!(rendered, lines.concat());
    }

    #[test]
    fn prop_sequence_ids_increase(count in 1usize..40) {
        let store = RingLogStore::new(1024, 32).unwrap();
        for i in 0..count {
            store.write_line(&i.to_string());
        }

        let mut cursor = store.begin_snapshot();
        let mut ids = Vec::new();
        while let (Some(entry), next) = store.next_entry(cursor) {
            ids.push(entry.sequence_id);
            cursor = next;
        }
        let first = ids[0];
        let expected: Vec<u16> = (0..ids.len() as u16).map(|i| first.wrapping_add(i)).collect();
        prop_assert_eq!(ids, expected);
    }
}
