//! Binary entrypoint for the Echo terminal front end.

use std::process::ExitCode;

use echo_assistant::start_echo;

/// Run the session engine on standard input.
fn main() -> ExitCode {
    start_echo::run()
}
