//! Offset-level view of a class file.

use crate::error::ClassFileError;

const MAGIC: u32 = 0xCAFE_BABE;

// Constant pool tags (JVMS §4.4).
const CONSTANT_UTF8: u8 = 1;
const CONSTANT_INTEGER: u8 = 3;
const CONSTANT_FLOAT: u8 = 4;
const CONSTANT_LONG: u8 = 5;
const CONSTANT_DOUBLE: u8 = 6;
const CONSTANT_CLASS: u8 = 7;
const CONSTANT_STRING: u8 = 8;
const CONSTANT_FIELDREF: u8 = 9;
const CONSTANT_METHODREF: u8 = 10;
const CONSTANT_INTERFACE_METHODREF: u8 = 11;
const CONSTANT_NAME_AND_TYPE: u8 = 12;
const CONSTANT_METHOD_HANDLE: u8 = 15;
const CONSTANT_METHOD_TYPE: u8 = 16;
const CONSTANT_DYNAMIC: u8 = 17;
const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
const CONSTANT_MODULE: u8 = 19;
const CONSTANT_PACKAGE: u8 = 20;

/// Byte range of one class-level attribute, header included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpan {
    /// Constant pool index of the attribute name.
    pub name_index: u16,
    /// Offset of the attribute header.
    pub start: usize,
    /// Offset one past the attribute payload.
    pub end: usize,
}

/// Offsets of the parts of a class file that marker handling touches.
///
/// Only UTF-8 constants are indexed. Everything else is skipped by length.
#[derive(Debug)]
pub struct ClassLayout<'a> {
    data: &'a [u8],
    constant_pool_count: u16,
    pool_end: usize,
    utf8: Vec<Option<(usize, usize)>>,
    attributes_count_offset: usize,
    attributes: Vec<AttributeSpan>,
}

impl<'a> ClassLayout<'a> {
    /// Walks `data` and records the offsets of the constant pool end and the
    /// class attribute table.
    pub fn parse(data: &'a [u8]) -> Result<Self, ClassFileError> {
        let mut cur = Cursor { data, pos: 0 };

        let magic = cur.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        cur.skip(4)?; // minor, major

        let constant_pool_count = cur.u16()?;
        let mut utf8 = vec![None; usize::from(constant_pool_count)];
        let mut index: u16 = 1;
        while index < constant_pool_count {
            let tag = cur.u8()?;
            let mut slots = 1;
            match tag {
                CONSTANT_UTF8 => {
                    let len = usize::from(cur.u16()?);
                    let start = cur.pos;
                    cur.skip(len)?;
                    utf8[usize::from(index)] = Some((start, start + len));
                }
                CONSTANT_CLASS | CONSTANT_STRING | CONSTANT_METHOD_TYPE | CONSTANT_MODULE
                | CONSTANT_PACKAGE => cur.skip(2)?,
                CONSTANT_METHOD_HANDLE => cur.skip(3)?,
                CONSTANT_INTEGER
                | CONSTANT_FLOAT
                | CONSTANT_FIELDREF
                | CONSTANT_METHODREF
                | CONSTANT_INTERFACE_METHODREF
                | CONSTANT_NAME_AND_TYPE
                | CONSTANT_DYNAMIC
                | CONSTANT_INVOKE_DYNAMIC => cur.skip(4)?,
                CONSTANT_LONG | CONSTANT_DOUBLE => {
                    cur.skip(8)?;
                    slots = 2;
                }
                _ => return Err(ClassFileError::BadConstantTag { tag, index }),
            }
            index = index.saturating_add(slots);
        }
        let pool_end = cur.pos;

        cur.skip(6)?; // access_flags, this_class, super_class
        let interfaces = usize::from(cur.u16()?);
        cur.skip(interfaces * 2)?;
        skip_members(&mut cur)?; // fields
        skip_members(&mut cur)?; // methods

        let attributes_count_offset = cur.pos;
        let count = cur.u16()?;
        let mut attributes = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let start = cur.pos;
            let name_index = cur.u16()?;
            let len = cur.u32()? as usize;
            cur.skip(len)?;
            attributes.push(AttributeSpan {
                name_index,
                start,
                end: cur.pos,
            });
        }

        if cur.pos != data.len() {
            return Err(ClassFileError::TrailingBytes(data.len() - cur.pos));
        }

        Ok(Self {
            data,
            constant_pool_count,
            pool_end,
            utf8,
            attributes_count_offset,
            attributes,
        })
    }

    /// The raw class file bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The `constant_pool_count` field (one more than the highest index).
    pub fn constant_pool_count(&self) -> u16 {
        self.constant_pool_count
    }

    /// Offset just past the last constant pool entry.
    pub fn pool_end(&self) -> usize {
        self.pool_end
    }

    /// Offset of the class `attributes_count` field.
    pub fn attributes_count_offset(&self) -> usize {
        self.attributes_count_offset
    }

    /// Class-level attributes in file order.
    pub fn attributes(&self) -> &[AttributeSpan] {
        &self.attributes
    }

    /// Returns the bytes of the UTF-8 constant at `index`.
    pub fn utf8(&self, index: u16) -> Option<&'a [u8]> {
        let (start, end) = (*self.utf8.get(usize::from(index))?)?;
        Some(&self.data[start..end])
    }

    /// Returns the index of the UTF-8 constant whose bytes equal `value`.
    pub fn find_utf8(&self, value: &str) -> Option<u16> {
        (1..self.constant_pool_count).find(|&i| self.utf8(i) == Some(value.as_bytes()))
    }

    /// Returns the name of `attribute`.
    pub fn attribute_name(&self, attribute: &AttributeSpan) -> Result<&'a [u8], ClassFileError> {
        self.utf8(attribute.name_index)
            .ok_or(ClassFileError::BadNameIndex(attribute.name_index))
    }
}

/// Builds a minimal class file for `name` extending `super_name`, with no
/// interfaces, members or attributes. Names may use `.` or `/` separators.
pub fn empty_class(name: &str, super_name: &str) -> Vec<u8> {
    let this = name.replace('.', "/");
    let sup = super_name.replace('.', "/");

    let mut out = Vec::with_capacity(32 + this.len() + sup.len());
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // minor
    out.extend_from_slice(&52u16.to_be_bytes()); // major
    out.extend_from_slice(&5u16.to_be_bytes());
    push_utf8(&mut out, &this); // #1
    out.push(CONSTANT_CLASS); // #2
    out.extend_from_slice(&1u16.to_be_bytes());
    push_utf8(&mut out, &sup); // #3
    out.push(CONSTANT_CLASS); // #4
    out.extend_from_slice(&3u16.to_be_bytes());
    out.extend_from_slice(&0x0021u16.to_be_bytes()); // ACC_PUBLIC | ACC_SUPER
    out.extend_from_slice(&2u16.to_be_bytes());
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&[0; 8]); // interfaces, fields, methods, attributes
    out
}

pub(crate) fn push_utf8(out: &mut Vec<u8>, value: &str) {
    out.push(CONSTANT_UTF8);
    // Constant names are short identifiers; longer strings are truncated by the format.
    let bytes = value.as_bytes();
    let len = bytes.len().min(usize::from(u16::MAX));
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(&bytes[..len]);
}

fn skip_members(cur: &mut Cursor<'_>) -> Result<(), ClassFileError> {
    let count = cur.u16()?;
    for _ in 0..count {
        cur.skip(6)?; // access_flags, name_index, descriptor_index
        let attributes = cur.u16()?;
        for _ in 0..attributes {
            cur.skip(2)?;
            let len = cur.u32()? as usize;
            cur.skip(len)?;
        }
    }
    Ok(())
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], ClassFileError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(ClassFileError::Truncated(self.pos))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn skip(&mut self, n: usize) -> Result<(), ClassFileError> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ClassFileError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ClassFileError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
