use std::{
    fs::File,
    io::{self, Write},
    sync::Mutex,
    time::Instant,
};

use chrono::Utc;
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<Logger> = OnceCell::new();

/// Where log lines end up: the console or a file in the temp directory.
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum LogKind {
    /// Log to stdout, the default choice.
    Stdout,

    /// Log to /tmp/satsuma-<timestamp>.log
    File,
}

struct Sink {
    out: Box<dyn Write + Send>,
    started: Instant,
}

impl Sink {
    fn new(kind: LogKind) -> Self {
        let started = Instant::now();
        let out: Box<dyn Write + Send> = match kind {
            LogKind::Stdout => Box::new(io::stdout()),
            LogKind::File => {
                let filename = format!("satsuma-{}.log", Utc::now().timestamp());
                let path = std::env::temp_dir().join(filename);
                Box::new(File::create(path).unwrap())
            }
        };

        Self { out, started }
    }

    fn write<T: std::fmt::Display>(&mut self, data: T) {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs();
        let millis = elapsed.subsec_millis();

        writeln!(
            self.out,
            "[{:02}:{:02}:{:02}.{millis:03}] {data}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        )
        .unwrap();
    }
}

struct Logger {
    sink: Mutex<Sink>,
}

impl Logger {
    fn new(kind: LogKind) -> Self {
        Self {
            sink: Mutex::new(Sink::new(kind)),
        }
    }
}

/// Install the global logger. Calling it twice keeps the first sink.
pub fn init_logger(kind: LogKind) {
    LOGGER.set(Logger::new(kind)).ok();
}

/// Write a timestamped line to the global logger. A no-op until
/// [`init_logger`] has been called.
pub fn log<T: std::fmt::Display>(data: T) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut sink) = logger.sink.lock() {
            sink.write(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{init_logger, log, LogKind};

    #[test]
    fn log_to_file() {
        init_logger(LogKind::File);
        log("ok");

        let files = fs::read_dir(std::env::temp_dir()).unwrap();
        for f in files.flatten() {
            let path = f.path();
            let name = path.to_str().unwrap().to_string();
            if name.contains("satsuma") && name.ends_with(".log") {
                let content = fs::read_to_string(&path).unwrap();
                fs::remove_file(path).unwrap();
                assert_eq!(content, "[00:00:00.000] ok\n");
            }
        }
    }
}
