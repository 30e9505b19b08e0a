use super::chunk::{
    check_span, is_settled, mark_settled, table_count, table_slice, table_slice_mut, unsettled_count, TABLE_HEADER,
};
use crate::Core::endian::{read_i32_le, read_u32_le, read_u32_ne, write_u32_ne};
use crate::Core::{DefinitionError, Hash};
use std::borrow::Cow;
use std::ops::Range;

const ENTRY_SIZE: usize = 8; // u32 hash + i32 offset

/// An interned name: its hash plus the text, borrowed from a settled table or
/// owned by the process-local registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEntry<'a> {
    pub hash: Hash,
    pub text: Cow<'a, str>,
}

impl<'a> StringEntry<'a> {
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// View over the string chunk of a loaded definition file.
///
/// Layout: `i32 numStrings, i32 settled, [u32 hash, i32 offset] x n, text...`.
/// Text is NUL-terminated; offsets are relative to the chunk start on disk and
/// absolute within the blob once settled.
#[derive(Clone, Copy)]
pub struct StringTable<'a> {
    blob: &'a [u8],
    start: usize,
    end: usize,
}

impl<'a> StringTable<'a> {
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

    /// Validates the whole chunk, then rewrites it to host order with every text
    /// offset turned into an absolute handle. Nothing is written if validation fails.
    pub(crate) fn settle(blob: &mut [u8], range: Range<usize>) -> Result<(), DefinitionError> {
        let base = range.start;
        let chunk = table_slice(blob, &range, "string")?;
        let count = unsettled_count(chunk, "string")?;
        let texts_start = check_span(chunk, "string", TABLE_HEADER, count, ENTRY_SIZE)?;

        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let at = TABLE_HEADER + i * ENTRY_SIZE;
            let rel = read_i32_le(chunk, at + 4).unwrap_or(-1);
            if rel < texts_start as i32 || rel as usize >= chunk.len() {
                return Err(DefinitionError::BadOffset {
                    what: "string text",
                    offset: rel as i64,
                    len: chunk.len(),
                });
            }
            let text = &chunk[rel as usize..];
            let nul = text
                .iter()
                .position(|&b| b == 0)
                .ok_or(DefinitionError::InvalidText { index: i })?;
            std::str::from_utf8(&text[..nul]).map_err(|_| DefinitionError::InvalidText { index: i })?;
            let hash = read_u32_le(chunk, at).unwrap_or(0);
            handles.push((hash, (base + rel as usize) as u32));
        }

        let chunk = table_slice_mut(blob, &range, "string")?;
        for (i, (hash, handle)) in handles.into_iter().enumerate() {
            let at = TABLE_HEADER + i * ENTRY_SIZE;
            write_u32_ne(chunk, at, hash);
            write_u32_ne(chunk, at + 4, handle);
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

    /// Entry `index`, or `None` when out of range or not yet settled.
    pub fn get_by_index(&self, index: usize) -> Option<StringEntry<'a>> {
        if !self.is_settled() || index >= self.count() {
            return None;
        }
        let chunk = self.chunk();
        let at = TABLE_HEADER + index * ENTRY_SIZE;
        let hash = read_u32_ne(chunk, at)?;
        let handle = read_u32_ne(chunk, at + 4)? as usize;
        if handle < self.start || handle >= self.end {
            return None;
        }
        let tail = &self.blob[handle..self.end];
        let nul = tail.iter().position(|&b| b == 0)?;
        let text = std::str::from_utf8(&tail[..nul]).ok()?;
        Some(StringEntry {
            hash,
            text: Cow::Borrowed(text),
        })
    }

    /// First entry whose hash equals `hash`. Not an identity test on its own.
    pub fn find_by_hash(&self, hash: Hash) -> Option<usize> {
        (0..self.count()).find(|&i| self.hash_at(i) == Some(hash))
    }

    /// Entry matching both `hash` and the exact `text`.
    pub fn find_by_hash_and_text(&self, hash: Hash, text: &str) -> Option<usize> {
        (0..self.count()).find(|&i| {
            self.hash_at(i) == Some(hash)
                && self.get_by_index(i).map_or(false, |entry| entry.text == text)
        })
    }

    fn hash_at(&self, index: usize) -> Option<Hash> {
        if !self.is_settled() {
            return None;
        }
        read_u32_ne(self.chunk(), TABLE_HEADER + index * ENTRY_SIZE)
    }
}
