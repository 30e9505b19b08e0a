use crate::Core::endian::{read_u32_le, write_u32_ne};
use crate::Core::DefinitionError;
use std::fmt;
use std::ops::Range;

const HEADER_PREFIX: usize = 8; // 4-byte id + u32 chunk count

/// A named blob holding `N` sub-chunks addressed by byte offsets from the blob start.
///
/// The blob is copied into owned storage on load. Chunk views are slices of that
/// storage; the only mutation ever performed is the one-shot settle pass run by
/// the owning [`DefinitionFile`](super::DefinitionFile).
pub struct ChunkContainer {
    blob: Vec<u8>,
    id: [u8; 4],
    offsets: Vec<usize>,
}

impl ChunkContainer {
    /// Parses the container header and validates every chunk offset.
    ///
    /// # Arguments
    /// * `bytes` - the raw file image, little-endian header fields
    ///
    /// # Returns
    /// The container, or `Truncated`/`BadOffset` if the header does not fit.
    pub fn load(bytes: &[u8]) -> Result<Self, DefinitionError> {
        let len = bytes.len();
        if len < HEADER_PREFIX {
            return Err(DefinitionError::Truncated {
                what: "chunk header",
                offset: 0,
                needed: HEADER_PREFIX,
                len,
            });
        }

        let mut id = [0u8; 4];
        id.copy_from_slice(&bytes[0..4]);
        let num_chunks = read_u32_le(bytes, 4).unwrap_or(0) as usize;

        let table_end = num_chunks
            .checked_mul(4)
            .and_then(|n| n.checked_add(HEADER_PREFIX))
            .filter(|&end| end <= len)
            .ok_or(DefinitionError::Truncated {
                what: "chunk offset table",
                offset: HEADER_PREFIX,
                needed: num_chunks.saturating_mul(4),
                len,
            })?;

        let mut offsets = Vec::with_capacity(num_chunks);
        for i in 0..num_chunks {
            let at = HEADER_PREFIX + i * 4;
            let offset = read_u32_le(bytes, at).unwrap_or(u32::MAX) as usize;
            if offset < table_end || offset >= len {
                return Err(DefinitionError::BadOffset {
                    what: "chunk",
                    offset: offset as i64,
                    len,
                });
            }
            offsets.push(offset);
        }

        Ok(Self {
            blob: bytes.to_vec(),
            id,
            offsets,
        })
    }

    pub fn id(&self) -> [u8; 4] {
        self.id
    }

    pub fn num_chunks(&self) -> usize {
        self.offsets.len()
    }

    /// Byte view `blob[offsets[i]..]`.
    pub fn chunk_data(&self, index: usize) -> Option<&[u8]> {
        let start = *self.offsets.get(index)?;
        self.blob.get(start..)
    }

    /// Absolute range of chunk `index` within the blob.
    ///
    /// A chunk ends where the next higher chunk offset begins, or at the end of
    /// the blob. Offsets are not required to be ordered.
    pub fn chunk_range(&self, index: usize) -> Option<Range<usize>> {
        let start = *self.offsets.get(index)?;
        let end = self
            .offsets
            .iter()
            .copied()
            .filter(|&o| o > start)
            .min()
            .unwrap_or(self.blob.len());
        Some(start..end)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }

    pub(crate) fn blob_mut(&mut self) -> &mut [u8] {
        &mut self.blob
    }

    /// Normalises the header offsets to host order once the chunks have been settled.
    pub(crate) fn settle_header(&mut self) {
        let count = self.offsets.len() as u32;
        write_u32_ne(&mut self.blob, 4, count);
        for (i, &offset) in self.offsets.iter().enumerate() {
            write_u32_ne(&mut self.blob, HEADER_PREFIX + i * 4, offset as u32);
        }
    }
}

impl fmt::Debug for ChunkContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::TableDebug::debug_chunk_container(self, f)
    }
}

/// Size of the `{i32 count, i32 settled}` prefix shared by all table chunks.
pub(crate) const TABLE_HEADER: usize = 8;

pub(crate) fn is_settled(chunk: &[u8]) -> bool {
    crate::Core::endian::read_u32_ne(chunk, 4).map_or(false, |flag| flag != 0)
}

/// Entry count of a table chunk, honouring whether it has been settled yet.
pub(crate) fn table_count(chunk: &[u8]) -> usize {
    let raw = if is_settled(chunk) {
        crate::Core::endian::read_i32_ne(chunk, 0)
    } else {
        crate::Core::endian::read_i32_le(chunk, 0)
    };
    raw.filter(|&n| n > 0).map_or(0, |n| n as usize)
}

/// Validates the header of a table that is about to be settled.
///
/// # Returns
/// The on-disk entry count.
pub(crate) fn unsettled_count(chunk: &[u8], table: &'static str) -> Result<usize, DefinitionError> {
    if chunk.len() < TABLE_HEADER {
        return Err(DefinitionError::Truncated {
            what: table,
            offset: 0,
            needed: TABLE_HEADER,
            len: chunk.len(),
        });
    }
    if is_settled(chunk) {
        return Err(DefinitionError::AlreadySettled { table });
    }
    let count = crate::Core::endian::read_i32_le(chunk, 0).unwrap_or(-1);
    if count < 0 {
        return Err(DefinitionError::Corrupt(format!("{table} table has negative count {count}")));
    }
    Ok(count as usize)
}

/// Checks that `count` fixed-size entries starting at `start` fit in the chunk.
pub(crate) fn check_span(
    chunk: &[u8],
    table: &'static str,
    start: usize,
    count: usize,
    stride: usize,
) -> Result<usize, DefinitionError> {
    count
        .checked_mul(stride)
        .and_then(|n| n.checked_add(start))
        .filter(|&end| end <= chunk.len())
        .ok_or(DefinitionError::Truncated {
            what: table,
            offset: start,
            needed: count.saturating_mul(stride),
            len: chunk.len(),
        })
}

pub(crate) fn mark_settled(chunk: &mut [u8], count: usize) {
    write_u32_ne(chunk, 0, count as u32);
    write_u32_ne(chunk, 4, 1);
}

/// Bounds-checked view of one table chunk inside the blob.
pub(crate) fn table_slice<'a>(
    blob: &'a [u8],
    range: &Range<usize>,
    table: &'static str,
) -> Result<&'a [u8], DefinitionError> {
    let len = blob.len();
    blob.get(range.clone()).ok_or(DefinitionError::Truncated {
        what: table,
        offset: range.start,
        needed: range.end.saturating_sub(range.start),
        len,
    })
}

pub(crate) fn table_slice_mut<'a>(
    blob: &'a mut [u8],
    range: &Range<usize>,
    table: &'static str,
) -> Result<&'a mut [u8], DefinitionError> {
    let len = blob.len();
    blob.get_mut(range.clone()).ok_or(DefinitionError::Truncated {
        what: table,
        offset: range.start,
        needed: range.end.saturating_sub(range.start),
        len,
    })
}

/// Rejects a record span `[start, end)` that intersects one already claimed.
pub(crate) fn claim_record(
    claimed: &[(usize, usize)],
    table: &'static str,
    index: usize,
    start: usize,
    end: usize,
) -> Result<(), DefinitionError> {
    match claimed.iter().find(|&&(s, e)| start < e && s < end) {
        Some(&(s, e)) => Err(DefinitionError::Corrupt(format!(
            "{table} {index} record {start}..{end} overlaps record {s}..{e}"
        ))),
        None => Ok(()),
    }
}
