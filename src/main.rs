//! datagest binary entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    match datagest::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            datagest::ui::output::error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
