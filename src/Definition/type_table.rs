use super::chunk::{
    check_span, is_settled, mark_settled, table_count, table_slice_mut, unsettled_count, TABLE_HEADER,
};
use crate::Core::endian::{read_i32_ne, read_u32_ne, settle_u32_le};
use crate::Core::{DefinitionError, Hash};
use std::fmt;
use std::ops::{BitOr, BitOrAssign, Range};

const ENTRY_SIZE: usize = 20;

/// Type flag bitset as stored on disk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeFlags(u32);

impl TypeFlags {
    pub const NONE: TypeFlags = TypeFlags(0);
    pub const INPUT: TypeFlags = TypeFlags(1 << 0);
    pub const OUTPUT: TypeFlags = TypeFlags(1 << 1);
    pub const POD: TypeFlags = TypeFlags(1 << 2);
    pub const STRUCT: TypeFlags = TypeFlags(1 << 3);
    pub const POINTER: TypeFlags = TypeFlags(1 << 4);
    pub const REFERENCE: TypeFlags = TypeFlags(1 << 5);
    pub const ALIAS: TypeFlags = TypeFlags(1 << 6);
    pub const ARRAY: TypeFlags = TypeFlags(1 << 7);
    pub const ENDIANSWAP: TypeFlags = TypeFlags(1 << 8);

    const NAMES: [(TypeFlags, &'static str); 9] = [
        (Self::INPUT, "INPUT"),
        (Self::OUTPUT, "OUTPUT"),
        (Self::POD, "POD"),
        (Self::STRUCT, "STRUCT"),
        (Self::POINTER, "POINTER"),
        (Self::REFERENCE, "REFERENCE"),
        (Self::ALIAS, "ALIAS"),
        (Self::ARRAY, "ARRAY"),
        (Self::ENDIANSWAP, "ENDIANSWAP"),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        TypeFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: TypeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: TypeFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn without(self, other: TypeFlags) -> Self {
        TypeFlags(self.0 & !other.0)
    }
}

impl BitOr for TypeFlags {
    type Output = TypeFlags;
    fn bitor(self, rhs: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for TypeFlags {
    fn bitor_assign(&mut self, rhs: TypeFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for TypeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("NONE")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeFlags({self})")
    }
}

/// One type record. `aliased_type_id` is the string ID of the aliased type's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeEntry {
    pub hash: Hash,
    pub data_size: u32,
    pub flags: TypeFlags,
    pub aliased_type_id: i32,
    pub num_elements: i32,
}

impl TypeEntry {
    pub fn is_alias(&self) -> bool {
        self.flags.contains(TypeFlags::ALIAS)
    }

    pub fn is_array(&self) -> bool {
        self.flags.contains(TypeFlags::ARRAY) && self.num_elements > 0
    }
}

/// View over the type chunk: `i32 numTypes, i32 settled, [hash, dataSize, flags, aliasedTypeID, numElements] x n`.
#[derive(Clone, Copy)]
pub struct TypeTable<'a> {
    chunk: &'a [u8],
}

impl<'a> TypeTable<'a> {
    pub fn new(blob: &'a [u8], range: Range<usize>) -> Self {
        let end = range.end.min(blob.len());
        Self {
            chunk: &blob[range.start.min(end)..end],
        }
    }

    pub(crate) fn settle(blob: &mut [u8], range: Range<usize>) -> Result<(), DefinitionError> {
        let chunk = table_slice_mut(blob, &range, "type")?;
        let count = unsettled_count(chunk, "type")?;
        check_span(chunk, "type", TABLE_HEADER, count, ENTRY_SIZE)?;

        // Type records hold no offsets; settling is a pure byte-order pass.
        for i in 0..count {
            let at = TABLE_HEADER + i * ENTRY_SIZE;
            for field in 0..5 {
                settle_u32_le(chunk, at + field * 4);
            }
        }
        mark_settled(chunk, count);
        Ok(())
    }

    pub fn is_settled(&self) -> bool {
        is_settled(self.chunk)
    }

    pub fn count(&self) -> usize {
        table_count(self.chunk)
    }

    pub fn get_by_index(&self, index: usize) -> Option<TypeEntry> {
        if !self.is_settled() || index >= self.count() {
            return None;
        }
        let at = TABLE_HEADER + index * ENTRY_SIZE;
        Some(TypeEntry {
            hash: read_u32_ne(self.chunk, at)?,
            data_size: read_u32_ne(self.chunk, at + 4)?,
            flags: TypeFlags::from_bits(read_u32_ne(self.chunk, at + 8)?),
            aliased_type_id: read_i32_ne(self.chunk, at + 12)?,
            num_elements: read_i32_ne(self.chunk, at + 16)?,
        })
    }

    pub fn find_by_hash(&self, hash: Hash) -> Option<usize> {
        if !self.is_settled() {
            return None;
        }
        (0..self.count()).find(|&i| read_u32_ne(self.chunk, TABLE_HEADER + i * ENTRY_SIZE) == Some(hash))
    }
}
