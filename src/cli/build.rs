//! Command runners (dev, build, package, clear)

use std::path::PathBuf;
use std::process::ExitCode;

use super::{GlobalArgs, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{BuildContext, BuildError, BuildPipeline, BuildResult};
use crate::config::{load_project, merge_cli_overrides, ConfigError};
use crate::notifier::{self, Completion};
use crate::transform::Toolchain;
use crate::watch::WatchSession;

/// Load configuration, apply the flags and assemble the pipeline.
fn prepare(args: &GlobalArgs) -> Result<BuildPipeline, ExitCode> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let (mut config, project_root) = match load_project(&cwd, args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e @ ConfigError::Io(_)) => {
            tracing::error!("{}", e);
            return Err(ExitCode::from(EXIT_ERROR));
        }
        Err(e) => {
            tracing::error!("{}", e);
            return Err(ExitCode::from(EXIT_INVALID_ARGS));
        }
    };

    if let Err(e) = merge_cli_overrides(&mut config, &args.overrides()) {
        tracing::error!("{}", e);
        return Err(ExitCode::from(EXIT_INVALID_ARGS));
    }

    let context = BuildContext::new(&config, project_root.clone());
    tracing::debug!(
        src = %context.src_dir().display(),
        out = %context.out_dir().display(),
        production = context.is_production(),
        dependencies = %context.packaging_mode(),
        "build context"
    );

    let toolchain = Toolchain::from_config(&config.tools, &project_root);
    Ok(BuildPipeline::new(context, toolchain).with_sink(notifier::sink(config.notify.enabled)))
}

/// Print the summary and map the result to an exit code.
fn finish(result: &BuildResult) -> ExitCode {
    if result.is_success() {
        println!("{}", result.summary());
        ExitCode::from(EXIT_SUCCESS)
    } else {
        eprintln!("{}", result.summary());
        ExitCode::from(EXIT_ERROR)
    }
}

fn report_error(error: &BuildError) -> ExitCode {
    if let BuildError::IncompleteBuild { result, .. } = error {
        eprintln!("{}", result.summary());
    }
    tracing::error!("{}", error);
    ExitCode::from(EXIT_ERROR)
}

/// Run the dev command: clear, build, then watch.
pub fn run_dev(args: &GlobalArgs) -> ExitCode {
    let pipeline = match prepare(args) {
        Ok(pipeline) => pipeline,
        Err(code) => return code,
    };

    let initial = match pipeline.build_with(Completion::DEV) {
        Ok(result) => {
            if result.is_success() {
                println!("{}", result.summary());
            } else {
                eprintln!("{}", result.summary());
            }
            result
        }
        Err(e) => return report_error(&e),
    };

    println!("Press Ctrl+C to stop");
    match WatchSession::new(&pipeline, Some(&initial)).run() {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            tracing::error!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the build command
pub fn run_build(args: &GlobalArgs) -> ExitCode {
    let pipeline = match prepare(args) {
        Ok(pipeline) => pipeline,
        Err(code) => return code,
    };

    match pipeline.build() {
        Ok(result) => finish(&result),
        Err(e) => report_error(&e),
    }
}

/// Run the package command
pub fn run_package(args: &GlobalArgs) -> ExitCode {
    let pipeline = match prepare(args) {
        Ok(pipeline) => pipeline,
        Err(code) => return code,
    };

    match pipeline.package() {
        Ok(outcome) => {
            println!("{}", outcome.build.summary());
            for archive in &outcome.archives {
                println!("Packaged {}", archive.display());
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => report_error(&e),
    }
}

/// Run the clear command
pub fn run_clear(args: &GlobalArgs, packages: bool) -> ExitCode {
    let pipeline = match prepare(args) {
        Ok(pipeline) => pipeline,
        Err(code) => return code,
    };

    let mut cleared = vec![pipeline.context().out_dir().to_path_buf()];
    let result = pipeline.clear().and_then(|()| {
        if packages {
            cleared.push(pipeline.context().package_dir().to_path_buf());
            pipeline.clear_packages()
        } else {
            Ok(())
        }
    });

    match result {
        Ok(()) => {
            for dir in &cleared {
                println!("Cleared {}", dir.display());
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => report_error(&e),
    }
}
