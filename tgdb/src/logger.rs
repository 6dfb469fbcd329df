/// File-backed logger recording `file:line` with every message, wired
/// into the `log` facade so call sites elsewhere in `tgdb` don't need to
/// know a custom logger is installed.
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};

pub struct FileLogger {
    file: Mutex<File>,
    level: LevelFilter,
}

impl FileLogger {
    pub fn open(path: &Path, level: LevelFilter) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            level,
        })
    }

    /// Installs this logger as the global `log` backend. Call once, near
    /// process start.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        log::set_max_level(self.level);
        log::set_boxed_logger(Box::new(self))
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let file = record.file().unwrap_or("?");
        let line = record.line().unwrap_or(0);
        let mut f = self.file.lock().unwrap();
        let _ = writeln!(
            f,
            "{}:{}: {}: {}",
            file,
            line,
            record.level(),
            record.args()
        );
        if record.level() <= Level::Warn {
            let _ = f.flush();
        }
    }

    fn flush(&self) {
        if let Ok(mut f) = self.file.lock() {
            let _ = f.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let logger = FileLogger::open(&path, LevelFilter::Trace).unwrap();
        let record = Record::builder()
            .args(format_args!("hello"))
            .level(Level::Warn)
            .file(Some("src/foo.rs"))
            .line(Some(42))
            .build();
        logger.log(&record);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("src/foo.rs:42: WARN: hello"));
    }
}
