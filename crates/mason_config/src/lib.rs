//! Parsing and validation of `mason.toml` project configuration files.
//!
//! This crate reads the project configuration and produces a strongly-typed
//! [`ProjectConfig`], then resolves individual compilation scopes into
//! absolute directories and a [`ScopeKey`](mason_common::ScopeKey).

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_all, resolve_scope, ResolvedScope};
pub use types::*;
