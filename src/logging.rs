//! Log output for the command-line tool.
//!
//! Informational messages, step failures and watch events all go through
//! `tracing`; this module installs the subscriber that prints them.

use std::io::IsTerminal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither a flag nor `RUST_LOG` says otherwise.
const DEFAULT_FILTER: &str = "extpack=info";

/// Choose the filter for the given verbosity flags.
///
/// `verbose` wins over `quiet`; without either, `RUST_LOG` is honoured.
pub fn filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("extpack=debug")
    } else if quiet {
        EnvFilter::new("extpack=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbose: bool, quiet: bool) {
    let ansi = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(ansi)
        .compact();

    let _ = tracing_subscriber::registry().with(filter(verbose, quiet)).with(fmt_layer).try_init();
}
