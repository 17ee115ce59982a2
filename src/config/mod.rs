//! Configuration module for the extpack build system
//!
//! Provides types and parsing for `extpack.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
