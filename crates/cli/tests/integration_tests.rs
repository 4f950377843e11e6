//! End-to-end tests over two independent mappings of one backing file,
//! the closest an in-process test gets to the writer-process /
//! reader-process deployment.

use shmlog::{BatchOptions, LogConfig, ReadOnlyLog, WritableLog};
use tempfile::tempdir;

fn small_config(path: std::path::PathBuf) -> LogConfig {
    let mut cfg = LogConfig::new(path);
    cfg.segment_len = 4096;
    cfg.segment_count = 2;
    cfg.overlap = 512;
    cfg
}

#[test]
fn reader_mapping_follows_writer_mapping() {
    let dir = tempdir().unwrap();
    let cfg = small_config(dir.path().join("shmlog.bin"));

    let writable = WritableLog::open(&cfg).unwrap();
    let mut w = writable.writer().unwrap();

    w.allocate(5).unwrap().copy_from_slice(b"alpha");
    w.commit().unwrap();

    // Maps the file a second time, as another process would.
    let readable = ReadOnlyLog::open(&cfg).unwrap();
    let mut it = readable.iter().unwrap();
    assert_eq!(it.next().unwrap().unwrap(), b"alpha");
    assert!(it.next().unwrap().is_none());

    // Frames committed after the second mapping existed are picked up by
    // plain polling.
    w.allocate(4).unwrap().copy_from_slice(b"beta");
    w.allocate(5).unwrap().copy_from_slice(b"gamma");
    w.commit().unwrap();

    let batch = it.next_batch(&BatchOptions::default()).unwrap();
    assert_eq!(batch, vec![b"beta".as_slice(), b"gamma".as_slice()]);
}

#[test]
fn uncommitted_frames_stay_invisible_across_mappings() {
    let dir = tempdir().unwrap();
    let cfg = small_config(dir.path().join("shmlog.bin"));

    let writable = WritableLog::open(&cfg).unwrap();
    let mut w = writable.writer().unwrap();
    w.allocate(6).unwrap().copy_from_slice(b"hidden");

    let readable = ReadOnlyLog::open(&cfg).unwrap();
    let mut it = readable.iter().unwrap();
    assert!(it.next().unwrap().is_none());
    assert_eq!(readable.committed_size().unwrap(), 24);

    w.commit().unwrap();
    assert_eq!(it.next().unwrap().unwrap(), b"hidden");
}

#[test]
fn addresses_resolve_across_mappings() {
    let dir = tempdir().unwrap();
    let cfg = small_config(dir.path().join("shmlog.bin"));

    let writable = WritableLog::open(&cfg).unwrap();
    let mut w = writable.writer().unwrap();

    w.allocate(3).unwrap().copy_from_slice(b"one");
    let addr = w.last_allocated_address().unwrap();
    w.commit().unwrap();

    let readable = ReadOnlyLog::open(&cfg).unwrap();
    assert_eq!(readable.payload_at(addr, 3).unwrap(), b"one");
}

#[test]
fn writer_restart_is_transparent_to_readers() {
    let dir = tempdir().unwrap();
    let cfg = small_config(dir.path().join("shmlog.bin"));

    {
        let writable = WritableLog::open(&cfg).unwrap();
        let mut w = writable.writer().unwrap();
        w.allocate(5).unwrap().copy_from_slice(b"first");
        w.commit().unwrap();
    }

    let readable = ReadOnlyLog::open(&cfg).unwrap();
    let mut it = readable.iter().unwrap();

    // A fresh writer process appends where the previous one stopped.
    let writable = WritableLog::open(&cfg).unwrap();
    let mut w = writable.writer().unwrap();
    w.allocate(6).unwrap().copy_from_slice(b"second");
    w.commit().unwrap();

    assert_eq!(it.next().unwrap().unwrap(), b"first");
    assert_eq!(it.next().unwrap().unwrap(), b"second");
    assert!(it.next().unwrap().is_none());
}

#[test]
fn many_frames_across_the_segment_boundary() {
    let dir = tempdir().unwrap();
    let cfg = small_config(dir.path().join("shmlog.bin"));

    let writable = WritableLog::open(&cfg).unwrap();
    let mut w = writable.writer().unwrap();

    // 60 frames of 100 payload bytes cross the boundary at 4096.
    for i in 0..60u8 {
        w.allocate(100).unwrap().copy_from_slice(&[i; 100]);
    }
    w.commit().unwrap();

    let readable = ReadOnlyLog::open(&cfg).unwrap();
    let mut it = readable.iter().unwrap();
    let mut seen = 0u8;
    loop {
        let batch = it.next_batch(&BatchOptions::default()).unwrap();
        if batch.is_empty() {
            break;
        }
        for payload in batch {
            assert_eq!(payload, &[seen; 100]);
            seen += 1;
        }
    }
    assert_eq!(seen, 60);
    assert_eq!(it.cursor(), readable.committed_size().unwrap());
}
