use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::RwLock,
};

use anyhow::Result;
use once_cell::sync::Lazy;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const LOG_FILE: &str = "chatrelay.log";

struct Settings {
    enabled: bool,
    dir: PathBuf,
}

static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| {
    RwLock::new(Settings {
        enabled: false,
        dir: PathBuf::from("logs"),
    })
});

#[derive(Debug, Clone, Copy)]
enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/**
 * \brief Switch logging on or off and point it at `dir`.
 */
pub fn configure(enabled: bool, dir: impl Into<PathBuf>) {
    if let Ok(mut guard) = SETTINGS.write() {
        guard.enabled = enabled;
        guard.dir = dir.into();
    }
}

pub fn set_enabled(enabled: bool) {
    if let Ok(mut guard) = SETTINGS.write() {
        guard.enabled = enabled;
    }
}

pub fn is_enabled() -> bool {
    SETTINGS.read().map(|g| g.enabled).unwrap_or(false)
}

pub fn log_event(category: &str, message: &str) {
    record(Level::Info, category, message);
}

pub fn log_warn(category: &str, message: &str) {
    record(Level::Warn, category, message);
}

pub fn log_error(category: &str, message: &str) {
    record(Level::Error, category, message);
}

fn record(level: Level, category: &str, message: &str) {
    let dir = match SETTINGS.read() {
        Ok(g) if g.enabled => g.dir.clone(),
        _ => return,
    };
    if let Err(err) = write_line(&dir, level, category, message) {
        eprintln!("telemetry write failed: {}", err);
    }
}

fn write_line(dir: &Path, level: Level, category: &str, message: &str) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))?;
    writeln!(
        file,
        "{} [{}] {} - {}",
        timestamp,
        level.as_str(),
        category,
        message
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lines_are_written_only_when_enabled() {
        let dir = TempDir::new().expect("tempdir");
        let log_dir = dir.path().join("logs");

        configure(false, &log_dir);
        log_event("test.telemetry", "disabled-line");
        assert!(!is_enabled());

        set_enabled(true);
        log_event("test.telemetry", "enabled-line");
        log_error("test.telemetry", "broken-line");
        set_enabled(false);

        let contents = std::fs::read_to_string(log_dir.join(LOG_FILE)).expect("read log");
        assert!(!contents.contains("disabled-line"));
        assert!(contents.contains("[INFO] test.telemetry - enabled-line"));
        assert!(contents.contains("[ERROR] test.telemetry - broken-line"));
    }
}
