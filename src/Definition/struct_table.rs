use super::chunk::{
    check_span, claim_record, is_settled, mark_settled, table_count, table_slice, table_slice_mut, unsettled_count,
    TABLE_HEADER,
};
use super::string_table::StringTable;
use crate::Core::endian::{read_i32_le, read_i32_ne, read_u32_ne, settle_u32_le, write_u32_ne};
use crate::Core::{DefinitionError, Hash};
use std::ops::Range;

const RECORD_HEADER: usize = 8; // nameID + numMembers
const MEMBER_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructMember {
    pub hash: Hash,
    pub name_id: i32,
    /// String ID of the member's type name.
    pub type_id: i32,
    pub data_size: i32,
    pub alignment_padding: i32,
}

/// A struct layout: members in declaration order, which is also wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDefinition {
    pub name_id: i32,
    pub members: Vec<StructMember>,
}

impl StructDefinition {
    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    pub fn get_member(&self, hash: Hash) -> Option<&StructMember> {
        self.members.iter().find(|m| m.hash == hash)
    }

    pub fn get_member_by_index(&self, index: usize) -> Option<&StructMember> {
        self.members.get(index)
    }

    /// Size of the in-memory layout, alignment padding included.
    pub fn native_size(&self) -> u32 {
        self.members
            .iter()
            .map(|m| (m.data_size + m.alignment_padding).max(0) as u32)
            .sum()
    }
}

/// View over the struct chunk: `i32 count, i32 settled, [u32 offset] x count, records`.
#[derive(Clone, Copy)]
pub struct StructTable<'a> {
    blob: &'a [u8],
    start: usize,
    end: usize,
}

impl<'a> StructTable<'a> {
    pub fn new(blob: &'a [u8], range: Range<usize>) -> Self {
        let end = range.end.min(blob.len());
        Self {
            blob,
            start: range.start.min(end),
            end,
        }
    }

    fn chunk(&self) -> &'a [u8] {
        &self.blob[self.start..self.end]
    }

    pub(crate) fn settle(blob: &mut [u8], range: Range<usize>) -> Result<(), DefinitionError> {
        let base = range.start;
        let chunk = table_slice(blob, &range, "struct")?;
        let count = unsettled_count(chunk, "struct")?;
        let records_start = check_span(chunk, "struct", TABLE_HEADER, count, 4)?;

        let mut records = Vec::with_capacity(count);
        let mut spans: Vec<(usize, usize)> = Vec::with_capacity(count);
        for i in 0..count {
            let rel = read_i32_le(chunk, TABLE_HEADER + i * 4).unwrap_or(-1);
            if rel < records_start as i32 {
                return Err(DefinitionError::BadOffset {
                    what: "struct record",
                    offset: rel as i64,
                    len: chunk.len(),
                });
            }
            let rel = rel as usize;
            if records.iter().any(|&(seen, _)| seen == rel) {
                return Err(DefinitionError::Corrupt(format!("struct {i} shares its record offset")));
            }
            check_span(chunk, "struct record", rel, 1, RECORD_HEADER)?;
            let num_members = read_i32_le(chunk, rel + 4).unwrap_or(-1);
            if num_members < 0 {
                return Err(DefinitionError::Corrupt(format!(
                    "struct {i} has negative member count {num_members}"
                )));
            }
            let end = check_span(chunk, "struct members", rel + RECORD_HEADER, num_members as usize, MEMBER_SIZE)?;
            claim_record(&spans, "struct", i, rel, end)?;
            spans.push((rel, end));
            records.push((rel, num_members as usize));
        }

        let chunk = table_slice_mut(blob, &range, "struct")?;
        for (i, (rel, num_members)) in records.into_iter().enumerate() {
            write_u32_ne(chunk, TABLE_HEADER + i * 4, (base + rel) as u32);
            settle_u32_le(chunk, rel);
            settle_u32_le(chunk, rel + 4);
            for m in 0..num_members {
                let at = rel + RECORD_HEADER + m * MEMBER_SIZE;
                for field in 0..5 {
                    settle_u32_le(chunk, at + field * 4);
                }
            }
        }
        mark_settled(chunk, count);
        Ok(())
    }

    pub fn is_settled(&self) -> bool {
        is_settled(self.chunk())
    }

    pub fn count(&self) -> usize {
        table_count(self.chunk())
    }

    fn record_offset(&self, index: usize) -> Option<usize> {
        if !self.is_settled() || index >= self.count() {
            return None;
        }
        let handle = read_u32_ne(self.chunk(), TABLE_HEADER + index * 4)? as usize;
        (handle >= self.start && handle < self.end).then(|| handle - self.start)
    }

    pub fn get_by_index(&self, index: usize) -> Option<StructDefinition> {
        let rel = self.record_offset(index)?;
        let chunk = self.chunk();
        let name_id = read_i32_ne(chunk, rel)?;
        let num_members = read_i32_ne(chunk, rel + 4)?.max(0) as usize;
        let members = (0..num_members)
            .map(|m| {
                let at = rel + RECORD_HEADER + m * MEMBER_SIZE;
                Some(StructMember {
                    hash: read_u32_ne(chunk, at)?,
                    name_id: read_i32_ne(chunk, at + 4)?,
                    type_id: read_i32_ne(chunk, at + 8)?,
                    data_size: read_i32_ne(chunk, at + 12)?,
                    alignment_padding: read_i32_ne(chunk, at + 16)?,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(StructDefinition { name_id, members })
    }

    /// Index of the struct whose name (looked up in `strings`) hashes to `hash`.
    pub fn find_by_name_hash(&self, strings: &StringTable<'_>, hash: Hash) -> Option<usize> {
        (0..self.count()).find(|&i| {
            self.record_offset(i)
                .and_then(|rel| read_i32_ne(self.chunk(), rel))
                .and_then(|name_id| usize::try_from(name_id).ok())
                .and_then(|name_id| strings.get_by_index(name_id))
                .map_or(false, |entry| entry.hash == hash)
        })
    }
}
