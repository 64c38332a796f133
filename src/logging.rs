//! Logging setup (§4.8, §4.9).
//!
//! Stderr output is always on, formatted by `pretty_env_logger` and filtered
//! by `GEOCORE_LOG`. When the configuration carries a `geo_log` path, every
//! record is additionally appended to that file in plain text.

use log::{Log, Metadata, Record};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

struct TeeLogger {
    stderr: Box<dyn Log>,
    file: Option<Mutex<std::fs::File>>,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.stderr.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.stderr.log(record);
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = writeln!(f, "{} [{}] {}", record.level(), record.target(), record.args());
            }
        }
    }

    fn flush(&self) {
        self.stderr.flush();
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

/// Initializes the global logger. `geo_log` is the optional file sink read
/// from configuration; stderr output happens regardless.
pub fn init(geo_log: Option<&Path>) -> io::Result<()> {
    let level = std::env::var("GEOCORE_LOG")
        .ok()
        .and_then(|v| v.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);

    let stderr = pretty_env_logger::formatted_builder().filter_level(level).build();

    let file = geo_log
        .map(|path| OpenOptions::new().create(true).append(true).open(path))
        .transpose()?
        .map(Mutex::new);

    log::set_max_level(level);
    log::set_boxed_logger(Box::new(TeeLogger {
        stderr: Box::new(stderr),
        file,
    }))
    .expect("logger already initialized");

    Ok(())
}
