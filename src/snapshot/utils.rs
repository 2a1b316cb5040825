use std::fs;

use crate::snapshot::types::{Snapshot, SnapshotConfig, SnapshotResult};

/// Filename for the `ordinal`-th capture: `NN_label.png`.
///
/// The two-digit prefix makes a lexicographic directory listing match
/// capture order.
pub fn capture_filename(ordinal: usize, label: &str) -> String {
    format!("{:02}_{}.png", ordinal, sanitize_label(label))
}

/// Sanitize a label for use in filenames
pub fn sanitize_label(label: &str) -> String {
    let sanitized: String = label
        .trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect();

    if sanitized.is_empty() {
        "capture".to_string()
    } else {
        sanitized
    }
}

/// Write the JSON manifest for a snapshot if configured
pub fn write_manifest(snapshot: &Snapshot, config: &SnapshotConfig) -> SnapshotResult<()> {
    if config.include_manifest {
        let manifest_path = snapshot.image_path.with_extension("json");
        fs::write(manifest_path, serde_json::to_string_pretty(snapshot)?)?;
    }
    Ok(())
}
