//! extpack - Build pipeline for browser extensions
//!
//! This library provides functionality to:
//! - Build an unpacked extension from a source tree (manifest, locales,
//!   images, icons, markup, styles, scripts, vendored dependencies)
//! - Rebuild only the affected steps when source files change
//! - Package the built extension as `.zip` and `.xpi` archives

pub mod build;
pub mod cli;
pub mod config;
pub mod deps;
pub mod logging;
pub mod manifest;
pub mod notifier;
pub mod package;
pub mod transform;
pub mod watch;
