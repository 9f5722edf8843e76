//! Audit trail.
//!
//! Every stage that can distort what the oracle actually said leaves forensic
//! evidence: raw responses are persisted verbatim, and all coercion and
//! validation warnings are written next to them, timestamped per run.

use crate::consensus::AttemptRecord;
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use ticksheet_core::types::AttemptOutcome;
use tracing::debug;

/// Filesystem audit trail for one pipeline run.
pub struct AuditTrail {
    dir: PathBuf,
}

impl AuditTrail {
    /// Create a run-scoped audit directory under `base`, named by label and
    /// UTC timestamp.
    pub fn create(base: impl AsRef<Path>, label: &str) -> io::Result<Self> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let dir = base.as_ref().join(format!("{}_{}", label, stamp));
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "audit trail created");
        Ok(Self { dir })
    }

    /// The run's audit directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist the normalized input and any normalization notes.
    pub fn write_input(&self, text: &str, notes: &[String]) -> io::Result<()> {
        fs::write(self.dir.join("input.txt"), text)?;
        if !notes.is_empty() {
            fs::write(self.dir.join("input_notes.txt"), notes.join("\n"))?;
        }
        Ok(())
    }

    /// Persist one attempt: raw response verbatim plus its warnings.
    pub fn write_attempt(&self, label: &str, record: &AttemptRecord) -> io::Result<()> {
        let stem = format!("{}_attempt{}", label, record.attempt);

        match (&record.raw_response, &record.outcome) {
            (Some(raw), _) => {
                fs::write(self.dir.join(format!("{}_response.txt", stem)), raw)?;
            }
            (None, AttemptOutcome::Failed(error)) => {
                fs::write(self.dir.join(format!("{}_error.txt", stem)), error)?;
            }
            (None, _) => {}
        }

        if !record.warnings.is_empty() {
            fs::write(
                self.dir.join(format!("{}_warnings.txt", stem)),
                record.warnings.join("\n"),
            )?;
        }
        Ok(())
    }

    /// Persist free-standing warnings (alignment of a single run, merges).
    pub fn write_warnings(&self, label: &str, warnings: &[String]) -> io::Result<()> {
        if warnings.is_empty() {
            return Ok(());
        }
        fs::write(
            self.dir.join(format!("{}_warnings.txt", label)),
            warnings.join("\n"),
        )
    }

    /// Persist an output artifact (result CSV) alongside the trail.
    pub fn write_artifact(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.dir.join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticksheet_core::types::OutputRowSet;

    fn temp_base() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ticksheet_audit_test_{}_{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_attempt_artifacts_written() {
        let base = temp_base();
        let trail = AuditTrail::create(&base, "lv").unwrap();

        let record = AttemptRecord {
            attempt: 1,
            temperature: 0.3,
            raw_response: Some("N1: Yes | x | y".to_string()),
            warnings: vec!["row count coerced: oracle returned 1 rows for 3 master rows".to_string()],
            outcome: AttemptOutcome::Success(OutputRowSet::new(Vec::new())),
        };
        trail.write_attempt("lv", &record).unwrap();

        assert!(trail.dir().join("lv_attempt1_response.txt").exists());
        assert!(trail.dir().join("lv_attempt1_warnings.txt").exists());
        fs::remove_dir_all(base).unwrap();
    }

    #[test]
    fn test_failed_attempt_writes_error() {
        let base = temp_base();
        let trail = AuditTrail::create(&base, "en").unwrap();

        let record = AttemptRecord {
            attempt: 2,
            temperature: 0.4,
            raw_response: None,
            warnings: Vec::new(),
            outcome: AttemptOutcome::Failed("connection reset".to_string()),
        };
        trail.write_attempt("en", &record).unwrap();

        let error = fs::read_to_string(trail.dir().join("en_attempt2_error.txt")).unwrap();
        assert_eq!(error, "connection reset");
        fs::remove_dir_all(base).unwrap();
    }

    #[test]
    fn test_empty_warnings_write_nothing() {
        let base = temp_base();
        let trail = AuditTrail::create(&base, "run").unwrap();
        trail.write_warnings("merge", &[]).unwrap();
        assert!(!trail.dir().join("merge_warnings.txt").exists());
        fs::remove_dir_all(base).unwrap();
    }
}
