//! Isolation loader for the external markup compiler.
//!
//! The compiler and its runtime dependencies are looked up on their own
//! search path first. Anything the search path does not provide falls back
//! to the host's resolver. Search path entries are directories or jar/zip
//! archives. Each name is bound once: after a name resolves
//! from either tier, later lookups return the same binding, so neither side
//! can shadow a definition the other has already supplied.

#![warn(missing_docs)]

pub mod archive;
pub mod loader;
pub mod resolver;

pub use archive::Archive;
pub use loader::IsolationLoader;
pub use resolver::{
    class_resource_name, DirectoryResolver, EmptyResolver, HostResolver, Origin, Resolved,
};
