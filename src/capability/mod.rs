//! GUI-automation capability.
//!
//! The harness never talks to the desktop directly. Everything it needs
//! (screen size, full-screen capture, key synthesis, typing) goes through the
//! [`Automation`] trait, and a [`Capability`] pairs one backend with the
//! status determined when it was probed:
//! - [`DesktopAutomation`] drives the real display (enigo + xcap)
//! - [`VirtualDisplay`] is an in-memory screen for tests and dry runs
//!
//! # Example
//!
//! ```rust,no_run
//! use gui_harness::capability::{Capability, CapabilityStatus};
//!
//! let capability = Capability::probe();
//! match capability.status() {
//!     CapabilityStatus::Ready { width, height } => println!("display {}x{}", width, height),
//!     other => println!("headless: {}", other),
//! }
//! ```

pub mod desktop;
pub mod keys;
pub mod virtual_display;

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use desktop::DesktopAutomation;
pub use keys::KeyCode;
pub use virtual_display::{Journal, VirtualDisplay};

/// Result type for automation calls
pub type AutomationResult<T> = Result<T, AutomationError>;

/// Errors raised by an automation backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutomationError {
    /// The backend could not be initialized at all
    #[error("automation unavailable: {0}")]
    Unavailable(String),

    /// The backend initialized but there is no usable display
    #[error("no display: {0}")]
    NoDisplay(String),

    /// Synthetic input refused because it was judged unsafe
    #[error("safety interlock triggered: {0}")]
    Interlock(String),

    /// A key name that no backend understands
    #[error("unknown key '{0}'")]
    UnknownKey(String),

    /// Key or text synthesis failed
    #[error("input failed: {0}")]
    Input(String),

    /// Screen capture failed
    #[error("screen capture failed: {0}")]
    Capture(String),
}

impl AutomationError {
    pub fn is_interlock(&self) -> bool {
        matches!(self, AutomationError::Interlock(_))
    }
}

/// Whether an error message points at a missing display rather than a broken step
pub fn looks_headless(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["display", "screen", "headless"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// A full-screen capture
#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// PNG-encoded image data
    pub image_data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// The operations the harness consumes from a GUI-automation backend
pub trait Automation {
    /// Source type identifier written into screenshot manifests (e.g. "desktop", "virtual")
    fn source_type(&self) -> &str;

    /// Query the primary screen size; fails when there is no display
    fn screen_size(&mut self) -> AutomationResult<(u32, u32)>;

    /// Capture the whole screen as PNG
    fn capture_screen(&mut self) -> AutomationResult<CaptureResult>;

    /// Press `keys` in order, then release them in reverse order
    fn send_hotkey(&mut self, keys: &[String]) -> AutomationResult<()>;

    /// Press and release a single key
    fn send_key(&mut self, key: &str) -> AutomationResult<()>;

    /// Type `text` one character at a time, waiting `interval` after each
    fn type_text(&mut self, text: &str, interval: Duration) -> AutomationResult<()>;
}

/// Outcome of probing the automation capability, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CapabilityStatus {
    /// Backend missing or failed to initialize
    Unavailable { reason: String },
    /// Backend present, screen query failed
    NoDisplay { reason: String },
    /// Screen query succeeded
    Ready { width: u32, height: u32 },
}

impl CapabilityStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, CapabilityStatus::Ready { .. })
    }
}

impl fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityStatus::Unavailable { reason } => write!(f, "unavailable ({})", reason),
            CapabilityStatus::NoDisplay { reason } => write!(f, "no display ({})", reason),
            CapabilityStatus::Ready { width, height } => write!(f, "ready ({}x{})", width, height),
        }
    }
}

/// A probed automation capability: the status plus, when ready, the backend
pub struct Capability {
    status: CapabilityStatus,
    backend: Option<Box<dyn Automation>>,
}

impl Capability {
    /// Probe the real desktop
    pub fn probe() -> Self {
        Self::probe_with(|| DesktopAutomation::new().map(|d| Box::new(d) as Box<dyn Automation>))
    }

    /// Probe using a custom backend constructor.
    ///
    /// Never fails and never panics past this call: an initialization error
    /// (or panic) yields `Unavailable`, a failing screen query yields
    /// `NoDisplay`, anything else yields `Ready`.
    pub fn probe_with<F>(init: F) -> Self
    where
        F: FnOnce() -> AutomationResult<Box<dyn Automation>>,
    {
        let mut backend = match panic::catch_unwind(AssertUnwindSafe(init)) {
            Ok(Ok(backend)) => backend,
            Ok(Err(err)) => return Self::unavailable(err.to_string()),
            Err(payload) => {
                return Self::unavailable(format!(
                    "backend panicked: {}",
                    panic_message(payload.as_ref())
                ));
            }
        };

        debug!(source = backend.source_type(), "Automation backend initialized");

        let size = panic::catch_unwind(AssertUnwindSafe(|| backend.screen_size()));
        let status = match size {
            Ok(Ok((width, height))) => CapabilityStatus::Ready { width, height },
            Ok(Err(err)) => CapabilityStatus::NoDisplay {
                reason: err.to_string(),
            },
            Err(payload) => CapabilityStatus::NoDisplay {
                reason: format!("screen query panicked: {}", panic_message(payload.as_ref())),
            },
        };

        match &status {
            CapabilityStatus::Ready { width, height } => {
                info!(width, height, "Display detected");
                Self {
                    status,
                    backend: Some(backend),
                }
            }
            _ => {
                warn!(%status, "No display detected; automation will be limited");
                Self {
                    status,
                    backend: None,
                }
            }
        }
    }

    /// A capability that is known to be unusable
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(%reason, "GUI automation unavailable");
        Self {
            status: CapabilityStatus::Unavailable { reason },
            backend: None,
        }
    }

    pub fn status(&self) -> &CapabilityStatus {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    /// The backend, only when the probe reported `Ready`
    pub fn automation(&mut self) -> Option<&mut (dyn Automation + 'static)> {
        if !self.status.is_ready() {
            return None;
        }
        self.backend.as_deref_mut()
    }

    pub fn source_type(&self) -> &str {
        self.backend
            .as_deref()
            .map(|b| b.source_type())
            .unwrap_or("none")
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("status", &self.status)
            .field("source", &self.source_type())
            .finish()
    }
}

/// Encode an RGBA frame as PNG bytes
pub(crate) fn encode_png(img: &image::RgbaImage) -> AutomationResult<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| AutomationError::Capture(format!("Failed to encode PNG: {}", e)))?;
    Ok(bytes)
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_unavailable_when_init_fails() {
        let capability =
            Capability::probe_with(|| Err(AutomationError::Unavailable("no backend".into())));
        assert!(matches!(
            capability.status(),
            CapabilityStatus::Unavailable { .. }
        ));
        assert!(!capability.is_ready());
    }

    #[test]
    fn test_probe_unavailable_when_init_panics() {
        let mut capability = Capability::probe_with(|| panic!("cannot open display"));
        match capability.status() {
            CapabilityStatus::Unavailable { reason } => {
                assert!(reason.contains("cannot open display"))
            }
            other => panic!("unexpected status {:?}", other),
        }
        assert!(capability.automation().is_none());
    }

    #[test]
    fn test_probe_no_display_when_size_query_fails() {
        let mut capability = Capability::probe_with(|| {
            Ok(Box::new(VirtualDisplay::headless()) as Box<dyn Automation>)
        });
        assert!(matches!(capability.status(), CapabilityStatus::NoDisplay { .. }));
        assert!(capability.automation().is_none());
    }

    #[test]
    fn test_probe_ready_carries_dimensions() {
        let mut capability = Capability::probe_with(|| {
            Ok(Box::new(VirtualDisplay::new(320, 200)) as Box<dyn Automation>)
        });
        assert_eq!(
            capability.status(),
            &CapabilityStatus::Ready {
                width: 320,
                height: 200
            }
        );
        assert_eq!(capability.source_type(), "virtual");
        assert!(capability.automation().is_some());
    }

    #[test]
    fn test_looks_headless() {
        assert!(looks_headless("Can't open DISPLAY :0"));
        assert!(looks_headless("no screen available"));
        assert!(!looks_headless("unknown key 'foo'"));
    }
}
