//! Output directory management for a run.
//!
//! A session is one output directory holding:
//! - `.session.json` with run metadata (id, created, host, executable, target file)
//! - the numbered screenshots and their manifests
//! - `summary.json`, written after cleanup

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::runner::RunSummary;

/// Metadata file written when the session is initialized
pub const SESSION_FILE: &str = ".session.json";

/// Run summary written at the end of the run
pub const SUMMARY_FILE: &str = "summary.json";

/// A run's output directory
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session ID
    pub id: String,
    /// Output directory
    pub dir: PathBuf,
    pub created: DateTime<Utc>,
}

impl Session {
    /// A session rooted at `dir`; nothing is created until [`Session::init`]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            id: generate_session_id(),
            dir: dir.into(),
            created: Utc::now(),
        }
    }

    /// Create the directory (if absent) and write the session metadata
    pub fn init(&self, executable: Option<&Path>, target_file: &Path) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = serde_json::json!({
            "id": self.id,
            "created": self.created.to_rfc3339(),
            "host": host,
            "executable": executable.map(|p| p.display().to_string()),
            "target_file": target_file.display().to_string(),
        });

        let metadata_path = self.dir.join(SESSION_FILE);
        fs::write(metadata_path, serde_json::to_string_pretty(&metadata)?)?;

        Ok(())
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    /// Persist the run summary as pretty JSON
    pub fn write_summary(&self, summary: &RunSummary) -> std::io::Result<PathBuf> {
        let path = self.summary_path();
        fs::write(&path, serde_json::to_string_pretty(summary)?)?;
        Ok(path)
    }
}

/// Generate a unique session ID
fn generate_session_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let pid = std::process::id();
    format!("session_{}_{}", timestamp, pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_directory_and_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let session = Session::in_dir(tmp.path().join("nested/out"));
        session
            .init(Some(Path::new("/opt/xenia")), Path::new("/games/a.iso"))
            .unwrap();

        let raw = fs::read_to_string(session.dir.join(SESSION_FILE)).unwrap();
        let meta: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(meta["id"], session.id.as_str());
        assert_eq!(meta["executable"], "/opt/xenia");
        assert_eq!(meta["target_file"], "/games/a.iso");
    }

    #[test]
    fn test_session_id_format() {
        let session = Session::in_dir("out");
        assert!(session.id.starts_with("session_"));
    }
}
