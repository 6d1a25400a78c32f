//! Shared foundational types used across the Mason markup build pipeline.
//!
//! This crate provides content hashing, scope identity keys, the classified
//! error taxonomy surfaced to the host build tool, and the leveled logging
//! sink that is passed through to the external markup compiler.

#![warn(missing_docs)]

pub mod error;
pub mod hash;
pub mod log;
pub mod scope;

pub use error::{ErrorKind, MarkupDiagnostic, MasonError, MasonResult};
pub use hash::ContentHash;
pub use log::{LogLevel, LogSink, MemorySink, TracingSink};
pub use scope::ScopeKey;
