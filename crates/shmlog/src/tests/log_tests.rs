use super::helpers::{append, config};
use crate::{BatchOptions, LogError, MappingError, ReadOnlyLog, WritableLog};
use tempfile::tempdir;

// -------------------- Opening --------------------

#[test]
fn read_only_open_requires_an_existing_file() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir, "log", 128, 2, 64);

    let result = ReadOnlyLog::open(&cfg);
    assert!(matches!(
        result,
        Err(LogError::Mapping(MappingError::NotFound(_)))
    ));
}

#[test]
fn existing_file_size_wins_over_config() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir, "log", 128, 2, 64);
    {
        WritableLog::open(&cfg).unwrap();
    }

    // Reopening with a larger segment count must not grow the file.
    let bigger = config(&dir, "log", 128, 8, 64);
    let log = WritableLog::open(&bigger).unwrap();
    assert_eq!(log.capacity(), 256);
}

// -------------------- Cross-handle visibility --------------------

#[test]
fn reader_process_view_of_writer_commits() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir, "log", 128, 2, 64);

    let writable = WritableLog::open(&cfg).unwrap();
    let mut w = writable.writer().unwrap();
    append(&mut w, b"published");
    w.commit().unwrap();

    // Second, independent mapping of the same file.
    let readable = ReadOnlyLog::open(&cfg).unwrap();
    let mut it = readable.iter().unwrap();
    assert_eq!(it.next().unwrap().unwrap(), b"published");
    assert!(it.next().unwrap().is_none());

    // A commit after the reader mapped the file is still picked up.
    append(&mut w, b"later");
    w.commit().unwrap();
    assert_eq!(it.next().unwrap().unwrap(), b"later");
    assert_eq!(readable.committed_size().unwrap(), writable.committed_size().unwrap());
}

#[test]
fn read_only_random_access() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir, "log", 128, 2, 64);

    let writable = WritableLog::open(&cfg).unwrap();
    let mut w = writable.writer().unwrap();
    let addr = append(&mut w, b"needle");
    w.commit().unwrap();

    let readable = ReadOnlyLog::open(&cfg).unwrap();
    assert_eq!(readable.payload_at(addr, 6).unwrap(), b"needle");
}

#[test]
fn independent_iterators_do_not_share_a_cursor() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir, "log", 128, 2, 64);
    let log = WritableLog::open(&cfg).unwrap();
    let mut w = log.writer().unwrap();

    append(&mut w, b"one");
    append(&mut w, b"two");
    w.commit().unwrap();

    let mut a = log.iter().unwrap();
    let mut b = log.iter().unwrap();

    assert_eq!(a.next().unwrap().unwrap(), b"one");
    assert_eq!(a.next().unwrap().unwrap(), b"two");
    // b starts from the data offset regardless of a's progress.
    assert_eq!(b.next().unwrap().unwrap(), b"one");
}

// -------------------- Handle lifetime --------------------

#[test]
fn iterators_outlive_their_handle() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir, "log", 128, 2, 64);
    let log = WritableLog::open(&cfg).unwrap();
    let mut w = log.writer().unwrap();

    append(&mut w, b"kept");
    w.commit().unwrap();

    let mut it = log.iter().unwrap();
    log.close().unwrap();
    assert_eq!(it.next().unwrap().unwrap(), b"kept");
}

// -------------------- End-to-end scenario --------------------

#[test]
fn three_messages_two_segments() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir, "log", 128, 2, 64);
    let log = WritableLog::open(&cfg).unwrap();
    let mut w = log.writer().unwrap();

    // Frames at 24, 60 and 96; the third crosses the boundary at 128
    // through the overlap and ends at 132.
    let addrs: Vec<u64> = (0..3u8).map(|i| append(&mut w, &[i; 32])).collect();
    assert_eq!(addrs, vec![24, 60, 96]);
    w.commit().unwrap();
    assert_eq!(log.committed_size().unwrap(), 132);

    let mut it = log.iter().unwrap();
    let batch = it.next_batch(&BatchOptions::default()).unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[2], &[2u8; 32]);
    drop(batch);
    assert_eq!(it.cursor(), 132);
    assert_eq!(it.consumed_bytes(), 108);
}
