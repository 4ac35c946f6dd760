use crate::errors::{BinanceError, Result};
use chrono::{NaiveDate, Utc};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Daily-rotating file sink plus stderr stream on the `log` facade.
///
/// The live file is `log/<name>/<name>.log`; at the first write of a new UTC
/// day the file is renamed to `<name>.log.<YYYY-MM-DD>` (the day it covers)
/// and a fresh one is started. The chat notifier tails exactly that rotated
/// name.
pub struct DailyFileLogger {
    name: &'static str,
    dir: PathBuf,
    state: Mutex<LoggerState>,
}

struct LoggerState {
    date: NaiveDate,
    file: File,
}

impl DailyFileLogger {
    /// Installs the logger for this process at Info level. Must be called
    /// once, before any strategy task starts.
    pub fn init(name: &'static str) -> Result<()> {
        let dir = PathBuf::from(format!("log/{name}"));
        std::fs::create_dir_all(&dir)?;
        let file = open_live_file(&dir, name)?;
        let logger = DailyFileLogger {
            name,
            dir,
            state: Mutex::new(LoggerState {
                date: Utc::now().date_naive(),
                file,
            }),
        };
        log::set_boxed_logger(Box::new(logger))
            .map_err(|err| BinanceError::Unexpected(err.to_string()))?;
        log::set_max_level(LevelFilter::Info);
        Ok(())
    }

    fn rotate_if_needed(&self, state: &mut LoggerState) -> std::io::Result<()> {
        let today = Utc::now().date_naive();
        if state.date == today {
            return Ok(());
        }
        let live = self.dir.join(format!("{}.log", self.name));
        let rotated = self
            .dir
            .join(format!("{}.log.{}", self.name, state.date.format("%Y-%m-%d")));
        let _ = std::fs::rename(&live, &rotated);
        state.file = open_live_file(&self.dir, self.name)?;
        state.date = today;
        Ok(())
    }
}

fn open_live_file(dir: &PathBuf, name: &str) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{name}.log")))
}

impl Log for DailyFileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} - {} - {} - {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            self.name,
            record.level(),
            record.args()
        );
        eprintln!("{line}");
        let mut state = self.state.lock().expect("logger state poisoned");
        if self.rotate_if_needed(&mut state).is_ok() {
            let _ = writeln!(state.file, "{line}");
        }
    }

    fn flush(&self) {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.file.flush();
        }
    }
}

/// Path of the rotated log file covering `date`, as the notifier reads it.
pub fn rotated_log_path(name: &str, date: NaiveDate) -> PathBuf {
    PathBuf::from(format!(
        "log/{name}/{name}.log.{}",
        date.format("%Y-%m-%d")
    ))
}
