//! Level loading log and logger setup
//!
//! Level operations report through a [`LevelLog`] so callers decide where
//! the messages end up. [`StandardLog`] forwards them to the `log` facade and
//! a `Vec<LogLine>` keeps them in memory.

use std::{
    fmt,
    fs::File,
    io::{self, Write},
    path::Path,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LogCategory {
    Event,
    Message,
    Info,
    Error,
    Warning,
}

impl LogCategory {
    pub fn label(self) -> &'static str {
        match self {
            LogCategory::Event => "EVENT",
            LogCategory::Message => "MESSAGE",
            LogCategory::Info => "INFO",
            LogCategory::Error => "ERROR",
            LogCategory::Warning => "WARNING",
        }
    }

    fn level(self) -> log::Level {
        match self {
            LogCategory::Error => log::Level::Error,
            LogCategory::Warning => log::Level::Warn,
            LogCategory::Event | LogCategory::Info => log::Level::Info,
            LogCategory::Message => log::Level::Debug,
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sink for categorized level loading messages.
pub trait LevelLog {
    fn log(&mut self, category: LogCategory, message: &str);
}

/// Forwards to the `log` crate with the category as a prefix.
#[derive(Copy, Clone, Debug, Default)]
pub struct StandardLog;

impl LevelLog for StandardLog {
    fn log(&mut self, category: LogCategory, message: &str) {
        log::log!(category.level(), "[{}] {}", category, message);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub category: LogCategory,
    pub message: String,
}

impl LevelLog for Vec<LogLine> {
    fn log(&mut self, category: LogCategory, message: &str) {
        self.push(LogLine {
            category,
            message: message.to_owned(),
        });
    }
}

/// Copies every write to a log file and to stderr.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        io::stderr().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        io::stderr().flush()
    }
}

/// Initializes `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
///
/// With `log_file` set, output is mirrored into that file (truncated first).
pub fn init(log_file: Option<&Path>) -> io::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }
    if let Err(e) = builder.try_init() {
        eprintln!("Warning: Could not initialize logger: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_keeps_order() {
        let mut lines: Vec<LogLine> = Vec::new();
        lines.log(LogCategory::Error, "H2B Not Found: Models/Ball.h2b");
        lines.log(LogCategory::Warning, "Loading will continue");

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].category, LogCategory::Error);
        assert_eq!(lines[1].message, "Loading will continue");
    }

    #[test]
    fn test_category_levels() {
        assert_eq!(LogCategory::Error.level(), log::Level::Error);
        assert_eq!(LogCategory::Warning.level(), log::Level::Warn);
        assert_eq!(LogCategory::Event.level(), log::Level::Info);
        assert_eq!(LogCategory::Message.level(), log::Level::Debug);
        assert_eq!(LogCategory::Warning.to_string(), "WARNING");
    }

    #[test]
    fn test_tee_writes_file() {
        let path = std::env::temp_dir().join("level-renderer-tee.log");
        let mut tee = Tee {
            file: File::create(&path).unwrap(),
        };
        tee.write_all(b"[ERROR] H2B Not Found\n").unwrap();
        tee.flush().unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[ERROR] H2B Not Found\n"
        );
        let _ = std::fs::remove_file(path);
    }
}
