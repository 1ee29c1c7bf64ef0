//! Fatal invariant checks.
//!
//! Firmware built on these primitives follows a fail-fast policy: a broken
//! invariant halts with a diagnostic at the point of detection rather than
//! continuing in a state that would surface later as a use-after-free or a
//! silent deadlock. With `panic = "abort"` the halt is immediate; in tests the
//! panic can be observed with `#[should_panic]`.

use core::fmt;

/// Logs the diagnostic and halts.
#[cold]
#[track_caller]
pub fn crash(args: fmt::Arguments<'_>) -> ! {
    let location = core::panic::Location::caller();
    log::error!(target: "crash", "{args} ({}:{})", location.file(), location.line());
    panic!("{args}");
}

/// Halts with a formatted diagnostic.
#[macro_export]
macro_rules! crash {
    ($($arg:tt)+) => {
        $crate::check::crash(format_args!($($arg)+))
    };
}

/// Halts unless the condition holds.
#[macro_export]
macro_rules! check {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::check::crash(format_args!("check failed: {}", stringify!($cond)))
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::check::crash(format_args!($($arg)+))
        }
    };
}
