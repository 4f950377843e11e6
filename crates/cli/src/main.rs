///! # CLI - shmlog Interactive Shell
///!
///! A REPL-style command-line interface for the shared-memory frame log.
///! Reads commands from stdin, executes them against the log, and prints
///! results to stdout. Designed for both interactive use and scripted
///! testing (pipe commands via stdin). Run one writable shell and any
///! number of read-only shells against the same path to watch frames
///! flow between processes.
///!
///! ## Commands
///!
///! ```text
///! APPEND text        Allocate a frame and fill it (invisible until COMMIT)
///! COMMIT             Publish every allocation since the last commit
///! NEXT               Read the next committed frame (or "(none)")
///! BATCH [n]          Read up to n committed frames (default 64)
///! SEEK addr          Move this shell's cursor to an absolute address
///! READ addr len      Random-access read of a frame payload by address
///! ADDR               Print the address of the last allocation
///! STATS              Print header, capacity and cursor state
///! EXIT / QUIT        Shut down gracefully
///! ```
///!
///! ## Configuration
///!
///! All settings are controlled via environment variables:
///!
///! ```text
///! SHMLOG_PATH        Backing file path        (default: "shmlog.bin")
///! SHMLOG_SEGMENT_KB  Segment size in KiB      (default: 1024 = 1 MiB)
///! SHMLOG_SEGMENTS    Segment count            (default: 8)
///! SHMLOG_OVERLAP_KB  Overlap window in KiB    (default: 64)
///! SHMLOG_WRITABLE    Open read-write          (default: "true")
///! SHMLOG_DEBUG       Extra frame validation   (default: "false")
///! ```
///!
///! ## Example
///!
///! ```text
///! $ cargo run -p cli
///! shmlog started (path=shmlog.bin, capacity=8388608, committed=24, writable=true)
///! > APPEND hello world
///! OK addr=24 pending=15
///! > COMMIT
///! OK size=39
///! > NEXT
///! hello world
///! > EXIT
///! bye
///! ```

use anyhow::Result;
use shmlog::{
    BatchOptions, Header, LogConfig, LogError, LogIterator, LogWriter, ReadOnlyLog, WritableLog,
};
use std::io::{self, BufRead, Write};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Either side of the single-writer contract.
enum Handle {
    Writable(WritableLog),
    ReadOnly(ReadOnlyLog),
}

impl Handle {
    fn open(cfg: &LogConfig, writable: bool) -> Result<Self, LogError> {
        if writable {
            Ok(Handle::Writable(WritableLog::open(cfg)?))
        } else {
            Ok(Handle::ReadOnly(ReadOnlyLog::open(cfg)?))
        }
    }

    fn header(&self) -> Result<Header, LogError> {
        match self {
            Handle::Writable(log) => log.header(),
            Handle::ReadOnly(log) => log.header(),
        }
    }

    fn iter(&self) -> Result<LogIterator, LogError> {
        match self {
            Handle::Writable(log) => log.iter(),
            Handle::ReadOnly(log) => log.iter(),
        }
    }

    fn payload_at(&self, address: u64, len: usize) -> Result<&[u8], LogError> {
        match self {
            Handle::Writable(log) => log.payload_at(address, len),
            Handle::ReadOnly(log) => log.payload_at(address, len),
        }
    }

    fn capacity(&self) -> u64 {
        match self {
            Handle::Writable(log) => log.capacity(),
            Handle::ReadOnly(log) => log.capacity(),
        }
    }

    fn writer(&self) -> Result<Option<LogWriter>, LogError> {
        match self {
            Handle::Writable(log) => Ok(Some(log.writer()?)),
            Handle::ReadOnly(_) => Ok(None),
        }
    }
}

fn main() -> Result<()> {
    // Configuration via environment variables with sensible defaults.
    //
    //  SHMLOG_PATH        - backing file path        (default: "shmlog.bin")
    //  SHMLOG_SEGMENT_KB  - segment size in KiB      (default: 1024 = 1 MiB)
    //  SHMLOG_SEGMENTS    - segment count            (default: 8)
    //  SHMLOG_OVERLAP_KB  - overlap window in KiB    (default: 64)
    //  SHMLOG_WRITABLE    - open read-write          (default: "true")
    //  SHMLOG_DEBUG       - extra frame validation   (default: "false")
    let path = env_or("SHMLOG_PATH", "shmlog.bin");
    let segment_kb: u64 = env_or("SHMLOG_SEGMENT_KB", "1024").parse().unwrap_or(1024);
    let segments: u32 = env_or("SHMLOG_SEGMENTS", "8").parse().unwrap_or(8);
    let overlap_kb: u32 = env_or("SHMLOG_OVERLAP_KB", "64").parse().unwrap_or(64);
    let writable: bool = env_or("SHMLOG_WRITABLE", "true").parse().unwrap_or(true);
    let debug: bool = env_or("SHMLOG_DEBUG", "false").parse().unwrap_or(false);

    let mut cfg = LogConfig::new(&path);
    cfg.segment_len = segment_kb * 1024;
    cfg.segment_count = segments;
    cfg.overlap = overlap_kb * 1024;
    cfg.debug_checks = debug;

    let handle = Handle::open(&cfg, writable)?;
    let mut writer = handle.writer()?;
    let mut it = handle.iter()?;

    println!(
        "shmlog started (path={}, capacity={}, committed={}, writable={})",
        path,
        handle.capacity(),
        handle.header()?.size,
        writable
    );
    println!("Commands: APPEND text | COMMIT | NEXT | BATCH [n] | SEEK addr");
    println!("          READ addr len | ADDR | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "APPEND" => {
                    let payload: String = parts.collect::<Vec<&str>>().join(" ");
                    if payload.is_empty() {
                        println!("ERR usage: APPEND text");
                    } else if let Some(w) = writer.as_mut() {
                        match w.allocate(payload.len()) {
                            Ok(buf) => {
                                buf.copy_from_slice(payload.as_bytes());
                                println!(
                                    "OK addr={} pending={}",
                                    w.last_allocated_address().unwrap_or(0),
                                    w.pending_bytes()
                                );
                            }
                            Err(e) => println!("ERR append failed: {}", e),
                        }
                    } else {
                        println!("ERR log opened read-only");
                    }
                }
                "COMMIT" => {
                    if let Some(w) = writer.as_mut() {
                        match w.commit() {
                            Ok(()) => println!("OK size={}", w.committed_size()),
                            Err(e) => println!("ERR commit failed: {}", e),
                        }
                    } else {
                        println!("ERR log opened read-only");
                    }
                }
                "NEXT" => match it.next() {
                    Ok(Some(payload)) => println!("{}", String::from_utf8_lossy(payload)),
                    Ok(None) => println!("(none)"),
                    Err(e) => println!("ERR read failed: {}", e),
                },
                "BATCH" => {
                    let n: u32 = parts
                        .next()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(shmlog::DEFAULT_MAX_MESSAGES);
                    let opts = BatchOptions {
                        max_messages: n,
                        ..BatchOptions::default()
                    };
                    match it.next_batch(&opts) {
                        Ok(batch) => {
                            if batch.is_empty() {
                                println!("(empty)");
                            } else {
                                for payload in &batch {
                                    println!("{}", String::from_utf8_lossy(payload));
                                }
                                println!("({} frames)", batch.len());
                            }
                        }
                        Err(e) => println!("ERR batch failed: {}", e),
                    }
                }
                "SEEK" => {
                    if let Some(addr) = parts.next().and_then(|s| s.parse::<u64>().ok()) {
                        match it.seek(addr) {
                            Ok(()) => println!("OK cursor={}", it.cursor()),
                            Err(e) => println!("ERR seek failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: SEEK addr");
                    }
                }
                "READ" => {
                    let addr = parts.next().and_then(|s| s.parse::<u64>().ok());
                    let len = parts.next().and_then(|s| s.parse::<usize>().ok());
                    match (addr, len) {
                        (Some(addr), Some(len)) => match handle.payload_at(addr, len) {
                            Ok(payload) => println!("{}", String::from_utf8_lossy(payload)),
                            Err(e) => println!("ERR read failed: {}", e),
                        },
                        _ => println!("ERR usage: READ addr len"),
                    }
                }
                "ADDR" => match writer.as_ref().and_then(|w| w.last_allocated_address()) {
                    Some(addr) => println!("{}", addr),
                    None => println!("(none)"),
                },
                "STATS" => {
                    match handle.header() {
                        Ok(h) => println!(
                            "header_size={} data_offset={} size={} capacity={}",
                            h.header_size,
                            h.data_offset,
                            h.size,
                            handle.capacity()
                        ),
                        Err(e) => println!("ERR header read failed: {}", e),
                    }
                    println!("cursor={} consumed={}", it.cursor(), it.consumed_bytes());
                    if let Some(w) = writer.as_ref() {
                        println!("committed={} pending={}", w.committed_size(), w.pending_bytes());
                    }
                }
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => {
                    println!("unknown command: {}", other);
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use shmlog::{LogConfig, WritableLog};

    #[test]
    fn append_commit_next_over_one_shell_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = LogConfig::new(dir.path().join("shmlog.bin"));
        cfg.segment_len = 4096;
        cfg.segment_count = 2;
        cfg.overlap = 512;

        let log = WritableLog::open(&cfg).unwrap();
        let mut w = log.writer().unwrap();
        w.allocate(11).unwrap().copy_from_slice(b"hello world");
        w.commit().unwrap();

        let mut it = log.iter().unwrap();
        assert_eq!(it.next().unwrap().unwrap(), b"hello world");
        assert!(it.next().unwrap().is_none());
    }
}
