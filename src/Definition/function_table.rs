use super::chunk::{
    check_span, claim_record, is_settled, mark_settled, table_count, table_slice, table_slice_mut, unsettled_count,
    TABLE_HEADER,
};
use super::string_table::StringTable;
use super::type_table::TypeFlags;
use crate::Core::endian::{read_i32_le, read_i32_ne, read_u32_ne, settle_u32_le, write_u32_ne};
use crate::Core::{DefinitionError, Hash};
use std::fmt;
use std::ops::Range;

const RECORD_HEADER: usize = 20; // nameID, returnTypeID, parameterDataSize, numInputs, numOutputs
const PARAM_SIZE: usize = 20;

/// Direction of a parameter. Stored on disk as the matching [`TypeFlags`] bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    Input,
    Output,
}

impl ParamMode {
    pub fn flag(self) -> TypeFlags {
        match self {
            ParamMode::Input => TypeFlags::INPUT,
            ParamMode::Output => TypeFlags::OUTPUT,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match TypeFlags::from_bits(bits) {
            TypeFlags::INPUT => Some(ParamMode::Input),
            TypeFlags::OUTPUT => Some(ParamMode::Output),
            _ => None,
        }
    }
}

impl fmt::Display for ParamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamMode::Input => f.write_str("INPUT"),
            ParamMode::Output => f.write_str("OUTPUT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionParameter {
    pub hash: Hash,
    pub name_id: i32,
    /// String ID of the parameter's type name.
    pub type_id: i32,
    /// Position in the combined inputs-then-outputs sequence.
    pub index: i32,
    pub mode: ParamMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name_id: i32,
    pub return_type_id: i32,
    pub parameter_data_size: u32,
    pub inputs: Vec<FunctionParameter>,
    pub outputs: Vec<FunctionParameter>,
}

impl FunctionDefinition {
    pub fn num_params(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    /// All parameters, inputs first.
    pub fn params(&self) -> impl Iterator<Item = &FunctionParameter> + '_ {
        self.inputs.iter().chain(self.outputs.iter())
    }

    pub fn param_by_index(&self, index: usize) -> Option<&FunctionParameter> {
        self.params().nth(index)
    }

    pub fn param_by_hash(&self, hash: Hash) -> Option<&FunctionParameter> {
        self.params().find(|p| p.hash == hash)
    }
}

/// View over the function chunk: `i32 count, i32 settled, [u32 offset] x count, records`.
///
/// Each record is `nameID, returnTypeID, parameterDataSize, numInputs, numOutputs`
/// followed by `numInputs + numOutputs` parameters of `{hash, nameID, typeID, index, mode}`.
#[derive(Clone, Copy)]
pub struct FunctionTable<'a> {
    blob: &'a [u8],
    start: usize,
    end: usize,
}

impl<'a> FunctionTable<'a> {
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
        let chunk = table_slice(blob, &range, "function")?;
        let count = unsettled_count(chunk, "function")?;
        let records_start = check_span(chunk, "function", TABLE_HEADER, count, 4)?;

        let mut records: Vec<(usize, usize)> = Vec::with_capacity(count);
        let mut spans: Vec<(usize, usize)> = Vec::with_capacity(count);
        for i in 0..count {
            let rel = read_i32_le(chunk, TABLE_HEADER + i * 4).unwrap_or(-1);
            if rel < records_start as i32 {
                return Err(DefinitionError::BadOffset {
                    what: "function record",
                    offset: rel as i64,
                    len: chunk.len(),
                });
            }
            let rel = rel as usize;
            if records.iter().any(|&(seen, _)| seen == rel) {
                return Err(DefinitionError::Corrupt(format!("function {i} shares its record offset")));
            }
            check_span(chunk, "function record", rel, 1, RECORD_HEADER)?;
            let num_inputs = read_i32_le(chunk, rel + 12).unwrap_or(-1);
            let num_outputs = read_i32_le(chunk, rel + 16).unwrap_or(-1);
            if num_inputs < 0 || num_outputs < 0 {
                return Err(DefinitionError::Corrupt(format!(
                    "function {i} has negative parameter counts {num_inputs}/{num_outputs}"
                )));
            }
            let num_params = num_inputs.checked_add(num_outputs).ok_or_else(|| {
                DefinitionError::Corrupt(format!(
                    "function {i} parameter counts {num_inputs}/{num_outputs} overflow"
                ))
            })? as usize;
            let end = check_span(chunk, "function parameters", rel + RECORD_HEADER, num_params, PARAM_SIZE)?;
            claim_record(&spans, "function", i, rel, end)?;
            spans.push((rel, end));

            for p in 0..num_params {
                let at = rel + RECORD_HEADER + p * PARAM_SIZE;
                let index = read_i32_le(chunk, at + 12).unwrap_or(-1);
                if index != p as i32 {
                    return Err(DefinitionError::Corrupt(format!(
                        "function {i} parameter {p} has index {index}"
                    )));
                }
                let expected = if p < num_inputs as usize { ParamMode::Input } else { ParamMode::Output };
                let mode = read_i32_le(chunk, at + 16).unwrap_or(0) as u32;
                if ParamMode::from_bits(mode) != Some(expected) {
                    return Err(DefinitionError::Corrupt(format!(
                        "function {i} parameter {p} has mode 0x{mode:X}, expected {expected}"
                    )));
                }
            }
            records.push((rel, num_params));
        }

        let chunk = table_slice_mut(blob, &range, "function")?;
        for (i, (rel, num_params)) in records.into_iter().enumerate() {
            write_u32_ne(chunk, TABLE_HEADER + i * 4, (base + rel) as u32);
            for field in 0..5 {
                settle_u32_le(chunk, rel + field * 4);
            }
            // parameters after the function's own scalars
            for p in 0..num_params {
                let at = rel + RECORD_HEADER + p * PARAM_SIZE;
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

    fn name_id_at(&self, index: usize) -> Option<i32> {
        read_i32_ne(self.chunk(), self.record_offset(index)?)
    }

    pub fn get_by_index(&self, index: usize) -> Option<FunctionDefinition> {
        let rel = self.record_offset(index)?;
        let chunk = self.chunk();
        let num_inputs = read_i32_ne(chunk, rel + 12)?.max(0) as usize;
        let num_outputs = read_i32_ne(chunk, rel + 16)?.max(0) as usize;

        let mut params = (0..num_inputs + num_outputs).map(|p| {
            let at = rel + RECORD_HEADER + p * PARAM_SIZE;
            Some(FunctionParameter {
                hash: read_u32_ne(chunk, at)?,
                name_id: read_i32_ne(chunk, at + 4)?,
                type_id: read_i32_ne(chunk, at + 8)?,
                index: read_i32_ne(chunk, at + 12)?,
                mode: ParamMode::from_bits(read_u32_ne(chunk, at + 16)?)?,
            })
        });
        let inputs = params.by_ref().take(num_inputs).collect::<Option<Vec<_>>>()?;
        let outputs = params.collect::<Option<Vec<_>>>()?;

        Some(FunctionDefinition {
            name_id: read_i32_ne(chunk, rel)?,
            return_type_id: read_i32_ne(chunk, rel + 4)?,
            parameter_data_size: read_u32_ne(chunk, rel + 8)?,
            inputs,
            outputs,
        })
    }

    pub fn find_by_name_hash(&self, strings: &StringTable<'_>, hash: Hash) -> Option<usize> {
        (0..self.count()).find(|&i| {
            self.name_id_at(i)
                .and_then(|id| usize::try_from(id).ok())
                .and_then(|id| strings.get_by_index(id))
                .map_or(false, |entry| entry.hash == hash)
        })
    }

    pub fn find_by_name_id(&self, name_id: i32) -> Option<usize> {
        (0..self.count()).find(|&i| self.name_id_at(i) == Some(name_id))
    }
}
