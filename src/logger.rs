//! Session logging
//!
//! Optional per-session diagnostic files for offline debugging of
//! recognition behavior. Logging is off unless a marker file named
//! `enabled` exists in the log directory, and it must never interfere
//! with recognition: every IO failure here is logged and swallowed.

use crate::actions::{ActionDescriptor, Hypothesis};
use crate::contacts::ContactRecord;
use chrono::Local;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Oldest session files beyond this count are deleted.
pub const MAX_LOG_FILES: usize = 20;

const ENABLE_MARKER: &str = "enabled";
const LOG_SUFFIX: &str = ".log";

/// Writes one dated file per recognition session.
pub struct SessionLogger {
    dir: PathBuf,
}

impl SessionLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// True when the marker file is present.
    pub fn is_enabled(&self) -> bool {
        self.dir.join(ENABLE_MARKER).exists()
    }

    pub fn enable(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        File::create(self.dir.join(ENABLE_MARKER))?;
        Ok(())
    }

    pub fn disable(&self) -> std::io::Result<()> {
        let marker = self.dir.join(ENABLE_MARKER);
        if marker.exists() {
            fs::remove_file(marker)?;
        }
        Ok(())
    }

    /// Write one session file. A no-op when logging is disabled; never
    /// returns an error.
    pub fn log(
        &self,
        header: &str,
        contacts: &[ContactRecord],
        hypotheses: &[Hypothesis],
        actions: &[ActionDescriptor],
    ) {
        if !self.is_enabled() {
            return;
        }
        if let Err(e) = self.write_session(header, contacts, hypotheses, actions) {
            warn!("session log write failed: {e}");
        }
        self.rotate();
    }

    fn write_session(
        &self,
        header: &str,
        contacts: &[ContactRecord],
        hypotheses: &[Hypothesis],
        actions: &[ActionDescriptor],
    ) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let stem = Local::now().format("log_%Y_%m_%d_%H_%M_%S");
        let path = self.dir.join(format!("{stem}{LOG_SUFFIX}"));
        debug!("writing session log {}", path.display());

        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "{header}")?;
        writeln!(out, "contacts: {}", contacts.len())?;
        for contact in contacts {
            writeln!(out, "  {contact}")?;
        }
        writeln!(out, "hypotheses: {}", hypotheses.len())?;
        for hypothesis in hypotheses {
            writeln!(out, "  {hypothesis}")?;
        }
        writeln!(out, "actions: {}", actions.len())?;
        for action in actions {
            writeln!(out, "  {action}")?;
        }
        out.flush()
    }

    /// Delete the oldest session files past [`MAX_LOG_FILES`]. Failures
    /// are non-fatal.
    fn rotate(&self) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        let mut logs: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| is_session_log(p))
            .collect();
        if logs.len() <= MAX_LOG_FILES {
            return;
        }
        // dated stems sort chronologically
        logs.sort();
        for stale in &logs[..logs.len() - MAX_LOG_FILES] {
            debug!("rotating out {}", stale.display());
            if let Err(e) = fs::remove_file(stale) {
                warn!("failed to remove {}: {e}", stale.display());
            }
        }
    }
}

fn is_session_log(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("log_") && n.ends_with(LOG_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_disabled_by_default() {
        let dir = TempDir::new().unwrap();
        let logger = SessionLogger::new(dir.path());
        assert!(!logger.is_enabled());

        logger.log("header", &[], &[], &[]);
        let count = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_enable_disable() {
        let dir = TempDir::new().unwrap();
        let logger = SessionLogger::new(dir.path());
        logger.enable().unwrap();
        assert!(logger.is_enabled());
        logger.disable().unwrap();
        assert!(!logger.is_enabled());
    }

    #[test]
    fn test_log_writes_session_file() {
        let dir = TempDir::new().unwrap();
        let logger = SessionLogger::new(dir.path());
        logger.enable().unwrap();

        let contacts = vec![ContactRecord::named("jack jones", 1)];
        let hypotheses = vec![Hypothesis::new(0.9, "call jack jones", "CALL 1 -1 2 -1 -1 -1")];
        logger.log("session start", &contacts, &hypotheses, &[]);

        let log = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.path())
            .find(|p| is_session_log(p))
            .expect("a session log file");
        let text = fs::read_to_string(log).unwrap();
        assert!(text.starts_with("session start"));
        assert!(text.contains("jack jones"));
        assert!(text.contains("CALL 1 -1 2 -1 -1 -1"));
    }

    #[test]
    fn test_rotation_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let logger = SessionLogger::new(dir.path());
        logger.enable().unwrap();

        // fabricate a backlog of dated files, then log once more
        for i in 0..25 {
            let name = format!("log_2026_01_01_00_00_{i:02}.log");
            fs::write(dir.path().join(name), "old").unwrap();
        }
        logger.log("header", &[], &[], &[]);

        let logs: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.path())
            .filter(|p| is_session_log(p))
            .collect();
        assert_eq!(logs.len(), MAX_LOG_FILES);
        // the very oldest fabricated file must be gone
        assert!(!dir.path().join("log_2026_01_01_00_00_00.log").exists());
        // the marker survives rotation
        assert!(logger.is_enabled());
    }
}
