//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to the command
//! runners in [`build`].

mod build;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::CliOverrides;

/// Process exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// extpack - Build and package browser extensions
#[derive(Parser, Debug)]
#[command(name = "extpack")]
#[command(about = "extpack - Build, watch and package browser extensions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Flags accepted by every command.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Let collaborators minify for production
    #[arg(long, global = true)]
    pub production: bool,

    /// Vendor runtime dependencies: 1 = public/libs, 2 = js/libs
    #[arg(
        long,
        global = true,
        value_name = "MODE",
        value_parser = clap::value_parser!(u8).range(0..=2)
    )]
    pub include_dependencies: Option<u8>,

    /// Source directory (overrides extpack.toml)
    #[arg(long, global = true)]
    pub src: Option<PathBuf>,

    /// Artifact directory (overrides extpack.toml)
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Archive directory (overrides extpack.toml)
    #[arg(long, global = true)]
    pub package: Option<PathBuf>,

    /// Path to extpack.toml (default: search upwards from the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Do not send desktop notifications
    #[arg(long, global = true)]
    pub no_notify: bool,

    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl GlobalArgs {
    /// Configuration overrides carried by the flags.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            src: self.src.clone(),
            out: self.out.clone(),
            package: self.package.clone(),
            production: self.production.then_some(true),
            include_dependencies: self.include_dependencies,
            no_notify: self.no_notify,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Clear, build, notify, then rebuild on changes (default)
    Dev,
    /// Clear and build once
    Build,
    /// Clear, build and write the .zip and .xpi archives
    Package,
    /// Delete the artifact directory
    Clear {
        /// Also delete the archive directory
        #[arg(long)]
        packages: bool,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    crate::logging::init(cli.global.verbose, cli.global.quiet);

    match cli.command.unwrap_or(Commands::Dev) {
        Commands::Dev => build::run_dev(&cli.global),
        Commands::Build => build::run_build(&cli.global),
        Commands::Package => build::run_package(&cli.global),
        Commands::Clear { packages } => build::run_clear(&cli.global, packages),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::try_parse_from(["extpack"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.global.production);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "extpack",
            "package",
            "--production",
            "--include-dependencies",
            "2",
            "--no-notify",
        ])
        .unwrap();

        assert_eq!(cli.command, Some(Commands::Package));
        let overrides = cli.global.overrides();
        assert_eq!(overrides.production, Some(true));
        assert_eq!(overrides.include_dependencies, Some(2));
        assert!(overrides.no_notify);
    }

    #[test]
    fn test_include_dependencies_out_of_range() {
        assert!(Cli::try_parse_from(["extpack", "build", "--include-dependencies", "3"]).is_err());
    }

    #[test]
    fn test_production_unset_does_not_override() {
        let cli = Cli::try_parse_from(["extpack", "build"]).unwrap();
        assert_eq!(cli.global.overrides().production, None);
    }

    #[test]
    fn test_clear_packages_flag() {
        let cli = Cli::try_parse_from(["extpack", "clear", "--packages"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Clear { packages: true }));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["extpack", "-v", "-q"]).is_err());
    }
}
