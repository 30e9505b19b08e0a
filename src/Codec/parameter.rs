use super::value::Value;
use crate::Core::{LesError, Result};
use crate::Definition::{ParamMode, TypeEntry, TypeFlags};
use crate::Registry::lookup::{SymbolLookup, MAX_NESTING_DEPTH};

/// Flat parameter buffer with a forward-only write cursor and an independent
/// forward-only read cursor.
///
/// Writes append tightly packed bytes: struct members back to back, array
/// elements back to back, no alignment padding. Whether the total matches a
/// function's declared size is checked by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterData {
    buffer: Vec<u8>,
    read_cursor: usize,
}

impl ParameterData {
    pub fn with_capacity(size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(size),
            read_cursor: 0,
        }
    }

    /// Wraps received bytes for reading.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buffer: bytes,
            read_cursor: 0,
        }
    }

    pub fn num_bytes_written(&self) -> usize {
        self.buffer.len()
    }

    pub fn num_bytes_read(&self) -> usize {
        self.read_cursor
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.read_cursor
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Marshals `value` as type `ty`.
    ///
    /// `ty` must carry the `mode` flag. Pointer and reference types are
    /// dereferenced once: `value` is the pointee. A rejected value leaves the
    /// buffer as it was, even when some of its members were already appended.
    pub fn write<L: SymbolLookup + ?Sized>(
        &mut self,
        lookup: &L,
        ty: &TypeEntry,
        value: &Value,
        mode: ParamMode,
    ) -> Result<()> {
        if !ty.flags.contains(mode.flag()) {
            return Err(LesError::Decode(format!(
                "type 0x{:X} ({}) does not allow {mode}",
                ty.hash, ty.flags
            )));
        }
        let mark = self.buffer.len();
        let written = self.write_internal(lookup, ty, value, 0);
        if written.is_err() {
            self.buffer.truncate(mark);
        }
        written
    }

    fn write_internal<L: SymbolLookup + ?Sized>(
        &mut self,
        lookup: &L,
        ty: &TypeEntry,
        value: &Value,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_NESTING_DEPTH {
            return Err(LesError::Decode(format!("type 0x{:X} nests too deeply", ty.hash)));
        }
        if ty.is_array() {
            let elements = value.elements().ok_or_else(|| shape_error(ty, "array", value))?;
            if elements.len() != ty.num_elements as usize {
                return Err(LesError::Decode(format!(
                    "type 0x{:X} expects {} elements, got {}",
                    ty.hash,
                    ty.num_elements,
                    elements.len()
                )));
            }
            let element_type = lookup.resolve_root(ty)?;
            for element in elements {
                self.write_item(lookup, &element_type, element, depth)?;
            }
            return Ok(());
        }
        self.write_item(lookup, ty, value, depth)
    }

    fn write_item<L: SymbolLookup + ?Sized>(
        &mut self,
        lookup: &L,
        ty: &TypeEntry,
        value: &Value,
        depth: usize,
    ) -> Result<()> {
        let root = lookup.resolve_root(ty)?;
        if root.flags.contains(TypeFlags::STRUCT) {
            let definition = lookup
                .struct_by_hash(root.hash)
                .ok_or_else(|| LesError::SymbolNotFound(format!("struct for type 0x{:X}", root.hash)))?;
            let members = value.members().ok_or_else(|| shape_error(&root, "struct", value))?;
            if members.len() != definition.num_members() {
                return Err(LesError::Decode(format!(
                    "struct 0x{:X} has {} members, got {}",
                    root.hash,
                    definition.num_members(),
                    members.len()
                )));
            }
            for (member, member_value) in definition.members.iter().zip(members) {
                let member_type = lookup.type_by_string_id(member.type_id)?;
                self.write_internal(lookup, &member_type, member_value, depth + 1)?;
            }
            return Ok(());
        }
        if root.flags.contains(TypeFlags::POD) {
            let bytes = value.pod_bytes().ok_or_else(|| shape_error(&root, "pod", value))?;
            if bytes.len() != root.data_size as usize {
                return Err(LesError::Decode(format!(
                    "type 0x{:X} is {} bytes, got {}",
                    root.hash,
                    root.data_size,
                    bytes.len()
                )));
            }
            self.buffer.extend_from_slice(bytes);
            return Ok(());
        }
        Err(LesError::Decode(format!(
            "type 0x{:X} ({}) is neither POD nor STRUCT",
            root.hash, root.flags
        )))
    }

    /// Unmarshals one value of type `ty` from the read cursor.
    pub fn read<L: SymbolLookup + ?Sized>(&mut self, lookup: &L, ty: &TypeEntry) -> Result<Value> {
        self.read_internal(lookup, ty, 0)
    }

    fn read_internal<L: SymbolLookup + ?Sized>(&mut self, lookup: &L, ty: &TypeEntry, depth: usize) -> Result<Value> {
        if depth > MAX_NESTING_DEPTH {
            return Err(LesError::Decode(format!("type 0x{:X} nests too deeply", ty.hash)));
        }
        if ty.is_array() {
            let element_type = lookup.resolve_root(ty)?;
            let elements = (0..ty.num_elements)
                .map(|_| self.read_item(lookup, &element_type, depth))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Value::Array(elements));
        }
        self.read_item(lookup, ty, depth)
    }

    fn read_item<L: SymbolLookup + ?Sized>(&mut self, lookup: &L, ty: &TypeEntry, depth: usize) -> Result<Value> {
        let root = lookup.resolve_root(ty)?;
        if root.flags.contains(TypeFlags::STRUCT) {
            let definition = lookup
                .struct_by_hash(root.hash)
                .ok_or_else(|| LesError::SymbolNotFound(format!("struct for type 0x{:X}", root.hash)))?;
            let mut members = Vec::with_capacity(definition.num_members());
            for member in &definition.members {
                let member_type = lookup.type_by_string_id(member.type_id)?;
                members.push(self.read_internal(lookup, &member_type, depth + 1)?);
            }
            return Ok(Value::Struct(members));
        }
        if root.flags.contains(TypeFlags::POD) {
            return Ok(Value::Pod(self.take(root.data_size as usize)?.to_vec()));
        }
        Err(LesError::Decode(format!(
            "type 0x{:X} ({}) is neither POD nor STRUCT",
            root.hash, root.flags
        )))
    }

    /// Advances the read cursor by `len` bytes.
    pub(crate) fn take(&mut self, len: usize) -> Result<&[u8]> {
        let start = self.read_cursor;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.buffer.len())
            .ok_or_else(|| {
                LesError::Decode(format!(
                    "read of {len} bytes at {start} overruns buffer of {}",
                    self.buffer.len()
                ))
            })?;
        self.read_cursor = end;
        Ok(&self.buffer[start..end])
    }
}

fn shape_error(ty: &TypeEntry, expected: &str, value: &Value) -> LesError {
    LesError::Decode(format!(
        "type 0x{:X} expects a {expected} value, got {}",
        ty.hash,
        value.describe()
    ))
}
