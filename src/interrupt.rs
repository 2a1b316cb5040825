//! Turns SIGINT/SIGTERM into a cancellation flag.
//!
//! The sequencer checks the flag before every step, so an interrupted run
//! still reaches cleanup. A second signal while the flag is already set
//! exits immediately with [`FORCED_EXIT_CODE`].

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag as signal_flag;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::AtomicBool;

/// Exit status when a second signal arrives before cleanup finished
pub const FORCED_EXIT_CODE: i32 = 130;

static FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// The process-wide cancellation flag
pub fn flag() -> Arc<AtomicBool> {
    FLAG.get_or_init(|| Arc::new(AtomicBool::new(false))).clone()
}

/// Install the SIGINT/SIGTERM handlers
pub fn install() -> std::io::Result<Arc<AtomicBool>> {
    let cancel = flag();
    for signal in [SIGINT, SIGTERM] {
        // registered first so it sees the flag as it was before this signal
        signal_flag::register_conditional_shutdown(signal, FORCED_EXIT_CODE, Arc::clone(&cancel))?;
        signal_flag::register(signal, Arc::clone(&cancel))?;
    }
    Ok(cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_flag_is_shared() {
        let a = flag();
        let b = flag();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[cfg(unix)]
    #[test]
    fn test_first_signal_sets_flag_without_exiting() {
        let cancel = install().unwrap();
        assert!(Arc::ptr_eq(&cancel, &flag()));

        signal_hook::low_level::raise(SIGTERM).unwrap();

        assert!(cancel.load(Ordering::SeqCst));
    }
}
