use reqchain::{core, signals, ExitStatus};

/// Entry point - catches Ctrl+C and calls core::run()
///
/// Returns ExitStatus directly, which implements std::process::Termination.
fn main() -> ExitStatus {
    signals::install_handler();

    let status = core::run(std::env::args().collect());

    if signals::was_interrupted() {
        return ExitStatus::Interrupted;
    }

    status
}
