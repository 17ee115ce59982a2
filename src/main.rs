//! extpack - Command-line tool for building and packaging browser extensions

use std::process::ExitCode;

use extpack::cli;

fn main() -> ExitCode {
    cli::run()
}
