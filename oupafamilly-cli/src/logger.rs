use chrono::Local;
use log::{set_logger, set_max_level, Level, LevelFilter, Log, Metadata, Record};

/// The most verbose level logged for records from other crates. sqlx logs every statement at
/// `INFO`.
const DEPENDENCY_LEVEL: LevelFilter = LevelFilter::Warn;

/// Installs the [`Logger`]. Calling this more than once has no effect.
pub fn init(level: LevelFilter) {
    if set_logger(&Logger).is_ok() {
        set_max_level(level);
    }
}

/// Changes the most verbose level logged from now on.
pub fn set_level(level: LevelFilter) {
    set_max_level(level);
    log::debug!("Log level set to {}", level);
}

/// Writes log records to stderr, keeping stdout for command output.
#[derive(Copy, Clone, Debug)]
pub struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("oupafamilly") || metadata.level() <= DEPENDENCY_LEVEL
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now = Local::now().format("%Y-%m-%d %H:%M:%S");

        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };

        eprintln!(
            "[{}] [{}:{}] [{}] {}",
            now,
            record.file().unwrap_or("???"),
            record.line().unwrap_or(0),
            level,
            record.args()
        );
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use log::{Level, LevelFilter, Log, Metadata};

    use super::{set_level, Logger};

    fn metadata(target: &str, level: Level) -> Metadata<'_> {
        Metadata::builder().target(target).level(level).build()
    }

    #[test]
    fn test_logger_enabled() {
        assert!(Logger.enabled(&metadata("oupafamilly_core::bracket", Level::Trace)));
        assert!(Logger.enabled(&metadata("oupafamilly::service", Level::Debug)));
        assert!(Logger.enabled(&metadata("sqlx::query", Level::Warn)));
        assert!(!Logger.enabled(&metadata("sqlx::query", Level::Info)));
    }

    #[test]
    fn test_logger_set_level() {
        set_level(LevelFilter::Debug);
        assert_eq!(log::max_level(), LevelFilter::Debug);

        set_level(LevelFilter::Warn);
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
