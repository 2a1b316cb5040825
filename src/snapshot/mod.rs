pub mod sink;
pub mod types;
pub mod utils;

pub use sink::ScreenshotSink;
pub use types::{Snapshot, SnapshotConfig, SnapshotError, SnapshotResult};
pub use utils::{capture_filename, sanitize_label, write_manifest};
