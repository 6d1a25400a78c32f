//! Reading and embedding the marker attribute.

use std::path::Path;

use mason_common::{MasonError, MasonResult};

use crate::error::ClassFileError;
use crate::layout::{push_utf8, ClassLayout};

/// Name of the class-level attribute that marks a post-processed class file.
pub const MARKER_ATTRIBUTE: &str = "MasonCompiledMarkup";

/// Returns the names of all class-level attributes in file order.
pub fn scan_attributes(data: &[u8]) -> Result<Vec<String>, ClassFileError> {
    let layout = ClassLayout::parse(data)?;
    layout
        .attributes()
        .iter()
        .map(|a| {
            layout
                .attribute_name(a)
                .map(|n| String::from_utf8_lossy(n).into_owned())
        })
        .collect()
}

/// Returns `true` if the class file at `path` carries a class-level attribute
/// called `name`.
///
/// Never fails: a missing file, a directory, or bytes that are not a class
/// file all answer `false`.
pub fn has_attribute(path: &Path, name: &str) -> bool {
    let Ok(data) = std::fs::read(path) else {
        return false;
    };
    let Ok(layout) = ClassLayout::parse(&data) else {
        return false;
    };
    contains(&layout, name)
}

/// Appends a class-level attribute called `name` with the given payload.
///
/// If the class already has an attribute with that name the input is returned
/// unchanged, so stamping twice yields identical bytes. The attribute name is
/// added to the constant pool when no matching UTF-8 constant exists.
pub fn add_attribute(data: &[u8], name: &str, payload: &[u8]) -> Result<Vec<u8>, ClassFileError> {
    let layout = ClassLayout::parse(data)?;
    if contains(&layout, name) {
        return Ok(data.to_vec());
    }

    let attributes_count = u16::try_from(layout.attributes().len())
        .ok()
        .and_then(|n| n.checked_add(1))
        .ok_or(ClassFileError::Overflow("attribute table"))?;
    let payload_len =
        u32::try_from(payload.len()).map_err(|_| ClassFileError::Overflow("attribute payload"))?;

    let (name_index, new_constant) = match layout.find_utf8(name) {
        Some(index) => (index, Vec::new()),
        None => {
            let index = layout.constant_pool_count();
            if index == u16::MAX {
                return Err(ClassFileError::Overflow("constant pool"));
            }
            let mut constant = Vec::with_capacity(3 + name.len());
            push_utf8(&mut constant, name);
            (index, constant)
        }
    };

    let pool_count = layout.constant_pool_count() + u16::from(!new_constant.is_empty());
    let count_offset = layout.attributes_count_offset();

    let mut out = Vec::with_capacity(data.len() + new_constant.len() + 6 + payload.len());
    out.extend_from_slice(&data[..8]);
    out.extend_from_slice(&pool_count.to_be_bytes());
    out.extend_from_slice(&data[10..layout.pool_end()]);
    out.extend_from_slice(&new_constant);
    out.extend_from_slice(&data[layout.pool_end()..count_offset]);
    out.extend_from_slice(&attributes_count.to_be_bytes());
    out.extend_from_slice(&data[count_offset + 2..]);
    out.extend_from_slice(&name_index.to_be_bytes());
    out.extend_from_slice(&payload_len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Embeds [`MARKER_ATTRIBUTE`] into the class file at `path` in place.
///
/// Returns `true` if the file was rewritten, `false` if it already carried
/// the marker.
pub fn stamp_file(path: &Path) -> MasonResult<bool> {
    let data = std::fs::read(path).map_err(|e| MasonError::io(path, e))?;
    let stamped = add_attribute(&data, MARKER_ATTRIBUTE, &[])?;
    if stamped == data {
        return Ok(false);
    }
    std::fs::write(path, &stamped).map_err(|e| MasonError::io(path, e))?;
    Ok(true)
}

fn contains(layout: &ClassLayout<'_>, name: &str) -> bool {
    layout
        .attributes()
        .iter()
        .any(|a| layout.attribute_name(a).ok() == Some(name.as_bytes()))
}
