//! Interrupt/signal handling for graceful shutdown

use std::sync::atomic::{AtomicBool, Ordering};

use crate::status::ExitStatus;

/// Global flag for Ctrl+C interrupt handling
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if the application was interrupted (Ctrl+C pressed)
#[inline]
pub fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Set the interrupted flag (called from signal handler)
#[inline]
pub fn set_interrupted() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Reset the interrupted flag
#[inline]
pub fn reset_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Install the Ctrl+C handler.
///
/// The first interrupt only raises the flag so destructors and pending
/// cache writes can finish; a second one exits immediately.
pub fn install_handler() {
    ctrlc::set_handler(move || {
        set_interrupted();
        eprintln!("\nInterrupted");

        static SECOND_CTRL_C: AtomicBool = AtomicBool::new(false);
        if SECOND_CTRL_C.swap(true, Ordering::SeqCst) {
            std::process::exit(ExitStatus::Interrupted as i32);
        }
    })
    .ok();
}

/// Terminate the whole process with the SIGINT exit code
pub fn exit_interrupted() -> ! {
    eprintln!();
    std::process::exit(ExitStatus::Interrupted as i32)
}
