//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/libris/config.toml)
//! 3. Project config (.libris/config.toml)
//! 4. Environment variables (LIBRIS_*)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
