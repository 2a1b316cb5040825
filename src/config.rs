//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for the harness, supporting:
//! - Environment variables for all timing knobs and the output directory
//! - Sensible defaults for driving a desktop application
//! - A cached global instance for the binary, plain constructors for tests
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `GUI_HARNESS_OUTPUT_DIR` | Directory for screenshots | `screenshots` |
//! | `GUI_HARNESS_LAUNCH_GRACE_MS` | Wait after spawning before the liveness check | `5000` |
//! | `GUI_HARNESS_TERMINATE_GRACE_MS` | Wait after a graceful terminate before killing | `5000` |
//! | `GUI_HARNESS_TYPE_INTERVAL_MS` | Delay between typed characters | `50` |
//! | `GUI_HARNESS_SETTLE_SCALE` | Multiplier for every settle delay | `1.0` |
//!
//! # Example
//!
//! ```bash
//! # Fast dry run against a virtual display
//! export GUI_HARNESS_SETTLE_SCALE=0
//! export GUI_HARNESS_LAUNCH_GRACE_MS=500
//! ```

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default screenshot output directory
pub const DEFAULT_OUTPUT_DIR: &str = "screenshots";

/// Default wait after spawning the target before polling liveness (milliseconds)
pub const DEFAULT_LAUNCH_GRACE_MS: u64 = 5_000;

/// Default wait for a graceful exit before force-killing (milliseconds)
pub const DEFAULT_TERMINATE_GRACE_MS: u64 = 5_000;

/// Default delay between typed characters (milliseconds)
pub const DEFAULT_TYPE_INTERVAL_MS: u64 = 50;

/// Settle after opening the File menu (milliseconds)
pub const DEFAULT_MENU_SETTLE_MS: u64 = 1_000;

/// Settle after choosing Open; dialogs take longer to render (milliseconds)
pub const DEFAULT_DIALOG_SETTLE_MS: u64 = 2_000;

/// Settle after typing the file path (milliseconds)
pub const DEFAULT_PATH_SETTLE_MS: u64 = 1_000;

/// Settle after confirming; loading the file may be slow (milliseconds)
pub const DEFAULT_CONFIRM_SETTLE_MS: u64 = 3_000;

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the output directory
pub const ENV_OUTPUT_DIR: &str = "GUI_HARNESS_OUTPUT_DIR";

/// Environment variable for the launch grace period
pub const ENV_LAUNCH_GRACE_MS: &str = "GUI_HARNESS_LAUNCH_GRACE_MS";

/// Environment variable for the terminate grace period
pub const ENV_TERMINATE_GRACE_MS: &str = "GUI_HARNESS_TERMINATE_GRACE_MS";

/// Environment variable for the typing interval
pub const ENV_TYPE_INTERVAL_MS: &str = "GUI_HARNESS_TYPE_INTERVAL_MS";

/// Environment variable for the settle delay multiplier
pub const ENV_SETTLE_SCALE: &str = "GUI_HARNESS_SETTLE_SCALE";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for the harness
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory for screenshots and the run summary
    pub output_dir: String,
    /// Process and interaction timings
    pub timings: Timings,
}

/// Every wait the harness performs
#[derive(Debug, Clone, PartialEq)]
pub struct Timings {
    /// Wait after spawn before the single liveness poll
    pub launch_grace: Duration,
    /// Wait for a graceful exit before escalating to kill
    pub terminate_grace: Duration,
    /// Delay between characters when typing text
    pub type_interval: Duration,
    /// Settle after the File menu hotkey
    pub menu_settle: Duration,
    /// Settle after choosing Open
    pub dialog_settle: Duration,
    /// Settle after typing the path
    pub path_settle: Duration,
    /// Settle after confirming
    pub confirm_settle: Duration,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            output_dir: env::var(ENV_OUTPUT_DIR).unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
            timings: Timings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            timings: Timings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Timings {
    /// Read timings from the environment
    pub fn from_env() -> Self {
        let scale = env::var(ENV_SETTLE_SCALE)
            .ok()
            .and_then(|s| parse_scale(&s))
            .unwrap_or(1.0);

        Self {
            launch_grace: env_millis(ENV_LAUNCH_GRACE_MS, DEFAULT_LAUNCH_GRACE_MS),
            terminate_grace: env_millis(ENV_TERMINATE_GRACE_MS, DEFAULT_TERMINATE_GRACE_MS),
            type_interval: env_millis(ENV_TYPE_INTERVAL_MS, DEFAULT_TYPE_INTERVAL_MS),
            ..Self::defaults().scaled(scale)
        }
    }

    /// Hardcoded defaults
    pub fn defaults() -> Self {
        Self {
            launch_grace: Duration::from_millis(DEFAULT_LAUNCH_GRACE_MS),
            terminate_grace: Duration::from_millis(DEFAULT_TERMINATE_GRACE_MS),
            type_interval: Duration::from_millis(DEFAULT_TYPE_INTERVAL_MS),
            menu_settle: Duration::from_millis(DEFAULT_MENU_SETTLE_MS),
            dialog_settle: Duration::from_millis(DEFAULT_DIALOG_SETTLE_MS),
            path_settle: Duration::from_millis(DEFAULT_PATH_SETTLE_MS),
            confirm_settle: Duration::from_millis(DEFAULT_CONFIRM_SETTLE_MS),
        }
    }

    /// All waits zeroed, for tests and virtual-display dry runs
    pub fn immediate() -> Self {
        Self {
            launch_grace: Duration::ZERO,
            terminate_grace: Duration::ZERO,
            type_interval: Duration::ZERO,
            menu_settle: Duration::ZERO,
            dialog_settle: Duration::ZERO,
            path_settle: Duration::ZERO,
            confirm_settle: Duration::ZERO,
        }
    }

    /// Multiply every settle delay by `factor`; process grace periods are untouched.
    /// A delay the factor would overflow keeps its unscaled value.
    pub fn scaled(mut self, factor: f64) -> Self {
        let factor = factor.max(0.0);
        let scale =
            |d: Duration| Duration::try_from_secs_f64(d.as_secs_f64() * factor).unwrap_or(d);
        self.menu_settle = scale(self.menu_settle);
        self.dialog_settle = scale(self.dialog_settle);
        self.path_settle = scale(self.path_settle);
        self.confirm_settle = scale(self.confirm_settle);
        self
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::defaults()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn env_millis(name: &str, default: u64) -> Duration {
    let millis = env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default);
    Duration::from_millis(millis)
}

fn parse_scale(value: &str) -> Option<f64> {
    let scale: f64 = value.trim().parse().ok()?;
    (scale.is_finite() && scale >= 0.0).then_some(scale)
}

/// Get the default output directory (convenience function)
pub fn output_dir() -> String {
    get().output_dir.clone()
}
