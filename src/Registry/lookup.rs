use crate::Core::{DefinitionError, Hash, LesError, Result};
use crate::Definition::{
    DefinitionFile, FunctionDefinition, StringEntry, StructDefinition, TypeEntry, TypeFlags,
};
use std::borrow::Cow;

/// Longest alias chain followed before the chain is declared cyclic.
pub const MAX_ALIAS_DEPTH: usize = 16;

/// Deepest struct-within-struct nesting walked by the size and alignment passes.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Read access to interned symbols.
///
/// Implemented by a bare [`DefinitionFile`] snapshot and by the merged
/// [`SymbolRegistry`](super::SymbolRegistry). The provided methods derive
/// roots, storage sizes and alignments from nothing but these lookups.
pub trait SymbolLookup {
    fn string_by_id(&self, id: i32) -> Option<StringEntry<'_>>;

    /// ID of the string matching both `hash` and `text`.
    fn string_id_by_hash_and_text(&self, hash: Hash, text: &str) -> Option<i32>;

    fn type_by_hash(&self, hash: Hash) -> Option<TypeEntry>;

    fn struct_by_hash(&self, hash: Hash) -> Option<Cow<'_, StructDefinition>>;

    fn function_by_hash(&self, hash: Hash) -> Option<Cow<'_, FunctionDefinition>>;

    fn string_id(&self, text: &str) -> Option<i32> {
        self.string_id_by_hash_and_text(crate::Core::hash_case_sensitive(text), text)
    }

    /// Text of string `id`, or a placeholder for unknown IDs. For log output only.
    fn name_of(&self, id: i32) -> String {
        self.string_by_id(id)
            .map(|entry| entry.text.into_owned())
            .unwrap_or_else(|| format!("<string {id}>"))
    }

    /// Type named by string `id`.
    fn type_by_string_id(&self, id: i32) -> Result<TypeEntry> {
        let entry = self
            .string_by_id(id)
            .ok_or_else(|| LesError::SymbolNotFound(format!("string ID {id}")))?;
        self.type_by_hash(entry.hash)
            .ok_or_else(|| LesError::SymbolNotFound(format!("type '{}'", entry.text)))
    }

    fn type_by_name(&self, name: &str) -> Option<TypeEntry> {
        self.string_id(name)?;
        self.type_by_hash(crate::Core::hash_case_sensitive(name))
    }

    /// Follows the alias chain of `ty` to the type that defines its storage.
    fn resolve_root(&self, ty: &TypeEntry) -> Result<TypeEntry> {
        let mut current = *ty;
        for _ in 0..MAX_ALIAS_DEPTH {
            if !current.is_alias() {
                return Ok(current);
            }
            current = self.type_by_string_id(current.aliased_type_id)?;
        }
        Err(DefinitionError::AliasCycle {
            hash: ty.hash,
            hops: MAX_ALIAS_DEPTH,
        }
        .into())
    }

    /// Bytes `ty` occupies on the wire: struct members and array elements flattened,
    /// no padding.
    fn compute_storage_size(&self, ty: &TypeEntry) -> Result<u32> {
        storage_size(self, ty, 0)
    }

    fn compute_alignment(&self, ty: &TypeEntry) -> Result<u32> {
        alignment(self, ty, 0)
    }

    /// Sum of the storage sizes of every input then every output parameter.
    fn compute_parameter_data_size(&self, function: &FunctionDefinition) -> Result<u32> {
        function.params().try_fold(0u32, |total, param| {
            let ty = self.type_by_string_id(param.type_id)?;
            let size = self.compute_storage_size(&ty)?;
            total.checked_add(size).ok_or_else(|| {
                LesError::from(DefinitionError::Corrupt(format!(
                    "parameter data size overflows at type 0x{:X}",
                    ty.hash
                )))
            })
        })
    }
}

fn nesting_guard(ty: &TypeEntry, depth: usize) -> Result<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(DefinitionError::Corrupt(format!(
            "type 0x{:X} nests deeper than {MAX_NESTING_DEPTH} levels",
            ty.hash
        ))
        .into());
    }
    Ok(())
}

fn size_overflow(ty: &TypeEntry) -> LesError {
    DefinitionError::Corrupt(format!("storage size of type 0x{:X} overflows u32", ty.hash)).into()
}

fn struct_for<'l, L: SymbolLookup + ?Sized>(lookup: &'l L, root: &TypeEntry) -> Result<Cow<'l, StructDefinition>> {
    lookup
        .struct_by_hash(root.hash)
        .ok_or_else(|| LesError::SymbolNotFound(format!("struct definition for type 0x{:X}", root.hash)))
}

fn storage_size<L: SymbolLookup + ?Sized>(lookup: &L, ty: &TypeEntry, depth: usize) -> Result<u32> {
    nesting_guard(ty, depth)?;
    let root = lookup.resolve_root(ty)?;
    let element = if root.flags.contains(TypeFlags::STRUCT) {
        let definition = struct_for(lookup, &root)?;
        let mut total = 0u32;
        for member in &definition.members {
            let member_type = lookup.type_by_string_id(member.type_id)?;
            total = total
                .checked_add(storage_size(lookup, &member_type, depth + 1)?)
                .ok_or_else(|| size_overflow(ty))?;
        }
        total
    } else {
        root.data_size
    };
    if !ty.is_array() {
        return Ok(element);
    }
    element
        .checked_mul(ty.num_elements as u32)
        .ok_or_else(|| size_overflow(ty))
}

fn alignment<L: SymbolLookup + ?Sized>(lookup: &L, ty: &TypeEntry, depth: usize) -> Result<u32> {
    nesting_guard(ty, depth)?;
    // arrays and structs align like their root; pointers keep their own size
    let target = if ty.flags.intersects(TypeFlags::ARRAY | TypeFlags::STRUCT) {
        lookup.resolve_root(ty)?
    } else {
        *ty
    };
    if target.flags.contains(TypeFlags::STRUCT) {
        let definition = struct_for(lookup, &target)?;
        let mut max = 0u32;
        for member in &definition.members {
            let member_type = lookup.type_by_string_id(member.type_id)?;
            max = max.max(alignment(lookup, &member_type, depth + 1)?);
        }
        return Ok(max);
    }
    Ok(target.data_size)
}

/// Padding needed to place a member of `alignment` at `offset`, capped at 4-byte alignment.
pub fn alignment_padding(offset: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return 0;
    }
    let mask = (alignment - 1).min(3);
    (offset.wrapping_add(mask) & !mask).wrapping_sub(offset)
}

impl SymbolLookup for DefinitionFile {
    fn string_by_id(&self, id: i32) -> Option<StringEntry<'_>> {
        self.string_table().get_by_index(usize::try_from(id).ok()?)
    }

    fn string_id_by_hash_and_text(&self, hash: Hash, text: &str) -> Option<i32> {
        self.string_table()
            .find_by_hash_and_text(hash, text)
            .map(|index| index as i32)
    }

    fn type_by_hash(&self, hash: Hash) -> Option<TypeEntry> {
        let table = self.type_table();
        table.get_by_index(table.find_by_hash(hash)?)
    }

    fn struct_by_hash(&self, hash: Hash) -> Option<Cow<'_, StructDefinition>> {
        let table = self.struct_table();
        let index = table.find_by_name_hash(&self.string_table(), hash)?;
        table.get_by_index(index).map(Cow::Owned)
    }

    fn function_by_hash(&self, hash: Hash) -> Option<Cow<'_, FunctionDefinition>> {
        let table = self.function_table();
        let index = table.find_by_name_hash(&self.string_table(), hash)?;
        table.get_by_index(index).map(Cow::Owned)
    }
}
