//! Developer trace records (`dev6!`): one-line JSON timing records sent to the
//! `nexuswire::dev6` log target and, when enabled, to a per-thread capture
//! buffer that tests can inspect.

use std::cell::RefCell;

thread_local! {
    static CAPTURE: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Stops capturing on the current thread when dropped.
#[must_use = "capture stops as soon as the guard is dropped"]
pub struct CaptureGuard(());

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURE.with(|c| *c.borrow_mut() = None);
    }
}

/// Starts capturing `dev6!` records emitted on this thread.
pub fn capture() -> CaptureGuard {
    CAPTURE.with(|c| *c.borrow_mut() = Some(Vec::new()));
    CaptureGuard(())
}

#[doc(hidden)]
pub fn record(msg: &str) {
    CAPTURE.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Takes the records captured so far on this thread.
pub fn take() -> Vec<String> {
    CAPTURE.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

#[macro_export]
macro_rules! dev6 {
    ($($arg:tt)*) => {{
        let __line = format!($($arg)*);
        $crate::utils::devlog::record(&__line);
        log::trace!(target: "nexuswire::dev6", "{}", __line);
    }};
}
