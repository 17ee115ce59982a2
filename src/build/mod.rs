//! Build pipeline for browser extensions
//!
//! Turns a source tree into an unpacked extension in the artifact store
//! and, on request, into installer archives.
//!
//! # Overview
//!
//! The build consists of:
//! - **Context**: resolved paths and flags, fixed for one invocation
//! - **Steps**: one per family of source files, each isolated from the others
//! - **Phases**: manifest first, then every asset step in parallel, then
//!   dependency vendoring
//! - **Pipeline**: clear, build, package and incremental re-runs
//!
//! # Example
//!
//! ```ignore
//! use extpack::build::{BuildContext, BuildPipeline};
//! use extpack::config::default_config;
//! use extpack::transform::Toolchain;
//!
//! let config = default_config();
//! let context = BuildContext::new(&config, project_root.clone());
//! let toolchain = Toolchain::from_config(&config.tools, &project_root);
//!
//! let result = BuildPipeline::new(context, toolchain).build()?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod phase;
pub mod pipeline;
pub mod result;
pub mod step;

pub use context::*;
pub use discovery::DiscoveryError;
pub use phase::PhaseRunner;
pub use pipeline::*;
pub use result::*;
pub use step::*;
