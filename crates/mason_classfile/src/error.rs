//! Error types for class file inspection and rewriting.

use mason_common::MasonError;

/// Errors produced while walking or rewriting a class file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassFileError {
    /// The file does not start with `0xCAFEBABE`.
    #[error("not a class file: bad magic {0:#010x}")]
    BadMagic(u32),

    /// The data ended before the structure being read.
    #[error("class file truncated at offset {0}")]
    Truncated(usize),

    /// A constant pool entry has an unknown tag.
    #[error("unknown constant pool tag {tag} at index {index}")]
    BadConstantTag {
        /// The tag byte.
        tag: u8,
        /// The constant pool index of the entry.
        index: u16,
    },

    /// An attribute name index does not point at a UTF-8 constant.
    #[error("attribute name index {0} is not a UTF-8 constant")]
    BadNameIndex(u16),

    /// Data follows the end of the class structure.
    #[error("{0} trailing bytes after class structure")]
    TrailingBytes(usize),

    /// A count would overflow its 16-bit field.
    #[error("{0} is full")]
    Overflow(&'static str),
}

impl From<ClassFileError> for MasonError {
    fn from(err: ClassFileError) -> Self {
        MasonError::internal(err.to_string())
    }
}
