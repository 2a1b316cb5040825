// Define core types for screenshot capture

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::capability::AutomationError;

/// Configuration for screenshot capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Directory where screenshots will be saved
    pub output_dir: PathBuf,

    /// Whether to write a JSON manifest next to each image
    pub include_manifest: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(crate::config::DEFAULT_OUTPUT_DIR),
            include_manifest: true,
        }
    }
}

/// Represents a persisted screenshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Path to the image file
    pub image_path: PathBuf,

    /// Position in capture order (1-based)
    pub ordinal: usize,

    /// Logical step label the image documents
    pub label: String,

    /// Source type (e.g., "desktop", "virtual")
    pub source: String,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Timestamp when the screenshot was taken
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Error types for snapshot operations
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The automation backend failed to produce an image
    #[error("Capture error: {0}")]
    Automation(#[from] AutomationError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
