// Global in-memory log sink for Cosmares
//
// The crate logs through the `log` facade. Hosts without their own backend
// can install `MemoryLogger`, which keeps the newest records in a fixed-size
// ring that a shell or debug screen can dump later.

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

const MAX_LOG_ENTRIES: usize = 64;

/// One captured log record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

/// `log` backend that retains the newest `MAX_LOG_ENTRIES` records
pub struct MemoryLogger {
    entries: Mutex<VecDeque<LogEntry>>,
}

impl MemoryLogger {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == MAX_LOG_ENTRIES {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for MemoryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for MemoryLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.push(LogEntry {
            level: record.level(),
            message: format!("{}", record.args()),
        });
    }

    fn flush(&self) {}
}

static LOGGER: MemoryLogger = MemoryLogger::new();

/// Install the in-memory logger as the global `log` backend.
///
/// Fails if another backend was installed first.
pub fn init(max_level: LevelFilter) -> Result<(), ()> {
    log::set_logger(&LOGGER).map_err(|_| ())?;
    log::set_max_level(max_level);
    Ok(())
}

/// Copy of the retained records, oldest first
pub fn entries() -> Vec<LogEntry> {
    LOGGER.snapshot()
}

pub fn log_count() -> usize {
    LOGGER.len()
}
