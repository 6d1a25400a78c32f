//! Compiler sessions and the per-build session registry.
//!
//! A [`Session`] wraps exactly one external compiler instance bound to one
//! search path and records a [`CompilationUnit`] for every markup file the
//! compiler accepts. The [`SessionRegistry`] keeps at most one live session
//! per [`ScopeKey`](mason_common::ScopeKey) for the lifetime of a build.

#![warn(missing_docs)]

pub mod compiler;
pub mod registry;
pub mod scan;
pub mod session;
pub mod unit;

pub use compiler::{CompilerContext, CompilerFactory, CompilerLog, MarkupCompiler};
pub use registry::{SearchPathSource, SessionRegistry};
pub use scan::{discover_markup, is_markup_file, MarkupSources};
pub use session::{Session, SessionSpec, Toolchain};
pub use unit::{CompilationUnit, CompilationUnitCollection};
