//! Stderr logging backend
//!
//! Everything the service has to say goes to stderr with the program
//! name as prefix; a service manager collects it from there.

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::config::PROGRAM;

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Error => eprintln!("{}: error: {}", PROGRAM, record.args()),
            Level::Warn => eprintln!("{}: warning: {}", PROGRAM, record.args()),
            _ => eprintln!("{}: {}", PROGRAM, record.args()),
        }
    }

    fn flush(&self) {}
}

/// Install the logger. `verbose` enables per-request debug records.
pub fn init(verbose: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        });
    }
}
