//! Marker attribute support for compiled class files.
//!
//! Post-processing tags every class file it rewrites with a class-level
//! attribute. Recovery later asks one question of a class file on disk: does
//! it carry that attribute? A copy the host recompiled on its own will not.
//!
//! The scanner walks the class file layout (constant pool, fields, methods,
//! class attributes) by offsets only and never builds an object model, so it
//! is cheap enough to run over every class in a scope.

#![warn(missing_docs)]

pub mod error;
pub mod layout;
pub mod marker;

pub use error::ClassFileError;
pub use layout::{empty_class, ClassLayout};
pub use marker::{add_attribute, has_attribute, scan_attributes, stamp_file, MARKER_ATTRIBUTE};
