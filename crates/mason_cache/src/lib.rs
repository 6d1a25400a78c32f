//! Per-scope snapshot of post-processed class files.
//!
//! After a successful `compile_files` the cache holds a byte copy of every
//! unit's class file and its nested classes, mirrored under the scope's cache
//! directory. Recovery restores from it when the host's own recompilation
//! has replaced the post-processed bytecode.

#![warn(missing_docs)]

pub mod error;
pub mod hasher;
pub mod manifest;
pub mod store;

pub use error::CacheError;
pub use manifest::{CacheManifest, UnitEntry};
pub use store::{ArtifactCache, RestoreOutcome};
