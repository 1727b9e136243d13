//! Rotating `current.log` writer (spec §4.18, §6 "Log file").
//!
//! This is user-facing conversation/debug log content, not developer
//! telemetry (that's `tracing`, initialized separately by `ikigai-cli`), so
//! it stays a small hand-rolled appender the same way the source keeps a
//! single `FILE*` under a mutex (SPEC_FULL §1.1).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{Category, Error, Result};

const LOG_SUBDIR: &str = ".ikigai/logs";
const CURRENT_LOG: &str = "current.log";

/// Line-oriented, mutex-protected log writer rooted at `<cwd>/.ikigai/logs/`.
pub struct Logger {
    dir: PathBuf,
    file: Mutex<File>,
}

impl Logger {
    /// Ensures `<working_dir>/.ikigai/logs/` exists and opens `current.log`
    /// for append (spec §4.18 "On init").
    pub fn init(working_dir: &Path) -> Result<Self> {
        let dir = working_dir.join(LOG_SUBDIR);
        fs::create_dir_all(&dir)?;
        let file = open_append(&dir.join(CURRENT_LOG))?;
        Ok(Logger {
            dir,
            file: Mutex::new(file),
        })
    }

    /// Renames `current.log` to `current.<timestamp>.log` and opens a fresh
    /// file (spec §4.18 "On reinit"), e.g. on `/clear`.
    pub fn reinit(&self) -> Result<()> {
        let mut guard = self.file.lock().unwrap();
        guard.flush().ok();

        let current = self.dir.join(CURRENT_LOG);
        if current.exists() {
            let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3f");
            let rotated = self.dir.join(format!("current.{}.log", stamp));
            fs::rename(&current, &rotated)?;
        }
        *guard = open_append(&current)?;
        Ok(())
    }

    /// Appends one line (a trailing `\n` is added if missing).
    pub fn write_line(&self, line: &str) -> Result<()> {
        let mut guard = self.file.lock().unwrap();
        guard.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            guard.write_all(b"\n")?;
        }
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::new(Category::Io, format!("open {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_log_dir_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::init(dir.path()).unwrap();
        logger.write_line("hello").unwrap();
        let contents = fs::read_to_string(dir.path().join(LOG_SUBDIR).join(CURRENT_LOG)).unwrap();
        assert_eq!(contents, "hello\n");
    }

    #[test]
    fn reinit_rotates_current_log_and_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::init(dir.path()).unwrap();
        logger.write_line("before rotation").unwrap();
        logger.reinit().unwrap();
        logger.write_line("after rotation").unwrap();

        let logs_dir = dir.path().join(LOG_SUBDIR);
        let rotated: Vec<_> = fs::read_dir(&logs_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n != CURRENT_LOG)
            .collect();
        assert_eq!(rotated.len(), 1);
        assert!(rotated[0].starts_with("current.") && rotated[0].ends_with(".log"));

        let current = fs::read_to_string(logs_dir.join(CURRENT_LOG)).unwrap();
        assert_eq!(current, "after rotation\n");
    }

    #[test]
    fn reinit_without_prior_current_log_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::init(dir.path()).unwrap();
        fs::remove_file(dir.path().join(LOG_SUBDIR).join(CURRENT_LOG)).unwrap();
        logger.reinit().unwrap();
        logger.write_line("ok").unwrap();
    }
}
