use super::lookup::{alignment_padding, SymbolLookup};
use crate::Core::{hash_case_sensitive, Hash, LesError, Result};
use crate::Definition::{
    DefinitionFile, FunctionDefinition, FunctionParameter, ParamMode, StringEntry, StructDefinition,
    StructMember, TypeEntry, TypeFlags,
};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Unified symbol index over an optional definition-file snapshot plus
/// process-local, append-only tables.
///
/// ### ID convention
/// For each of strings, types, structs and functions, IDs below the snapshot's
/// table count address the snapshot; IDs at or above it address the local table
/// at `id - count`. An ID never changes meaning once handed out.
///
/// ### Registration policy
/// With a snapshot attached the registry is closed: `add_*` only validates
/// against the snapshot and fails for anything it does not already contain.
/// Without one, new symbols are appended in insertion order. Re-adding an
/// existing symbol re-validates it, and a failed `add_*` leaves every table as
/// it was.
#[derive(Default)]
pub struct SymbolRegistry {
    snapshot: Option<DefinitionFile>,
    strings: Vec<(Hash, String)>,
    types: Vec<TypeEntry>,
    structs: Vec<StructDefinition>,
    functions: Vec<FunctionDefinition>,
}

struct Marks {
    strings: usize,
    types: usize,
    structs: usize,
    functions: usize,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definition_file(file: DefinitionFile) -> Self {
        Self {
            snapshot: Some(file),
            ..Self::default()
        }
    }

    /// Attaches the snapshot. Only allowed once, and only while no local symbols exist.
    pub fn set_definition_file(&mut self, file: DefinitionFile) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(LesError::conflict("definition file", "a definition file is already attached"));
        }
        if self.num_local_symbols() != 0 {
            return Err(LesError::conflict(
                "definition file",
                format!("{} process-local symbols were registered first", self.num_local_symbols()),
            ));
        }
        self.snapshot = Some(file);
        Ok(())
    }

    pub fn definition_file(&self) -> Option<&DefinitionFile> {
        self.snapshot.as_ref()
    }

    pub fn num_local_symbols(&self) -> usize {
        self.strings.len() + self.types.len() + self.structs.len() + self.functions.len()
    }

    fn snapshot_counts(&self) -> (usize, usize, usize, usize) {
        self.snapshot.as_ref().map_or((0, 0, 0, 0), |file| {
            (
                file.string_table().count(),
                file.type_table().count(),
                file.struct_table().count(),
                file.function_table().count(),
            )
        })
    }

    pub fn num_strings(&self) -> usize {
        self.snapshot_counts().0 + self.strings.len()
    }

    pub fn num_types(&self) -> usize {
        self.snapshot_counts().1 + self.types.len()
    }

    pub fn num_structs(&self) -> usize {
        self.snapshot_counts().2 + self.structs.len()
    }

    pub fn num_functions(&self) -> usize {
        self.snapshot_counts().3 + self.functions.len()
    }

    fn marks(&self) -> Marks {
        Marks {
            strings: self.strings.len(),
            types: self.types.len(),
            structs: self.structs.len(),
            functions: self.functions.len(),
        }
    }

    /// Runs `op`, truncating every local table back to its entry length if it fails.
    fn atomically<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let marks = self.marks();
        let result = op(self);
        if let Err(err) = &result {
            warn!("registration rolled back: {err}");
            self.strings.truncate(marks.strings);
            self.types.truncate(marks.types);
            self.structs.truncate(marks.structs);
            self.functions.truncate(marks.functions);
        }
        result
    }

    // --- strings -------------------------------------------------------------

    /// Interns `text`, returning its existing ID when already known.
    pub fn add_string(&mut self, text: &str) -> Result<i32> {
        let hash = hash_case_sensitive(text);
        if let Some(id) = self.string_id_by_hash_and_text(hash, text) {
            return Ok(id);
        }
        if self.snapshot.is_some() {
            return Err(LesError::conflict(text, "string is not in the definition file"));
        }
        let id = (self.snapshot_counts().0 + self.strings.len()) as i32;
        self.strings.push((hash, text.to_string()));
        Ok(id)
    }

    pub fn string_by_hash(&self, hash: Hash) -> Option<StringEntry<'_>> {
        if let Some(file) = &self.snapshot {
            let table = file.string_table();
            if let Some(index) = table.find_by_hash(hash) {
                return table.get_by_index(index);
            }
        }
        self.strings
            .iter()
            .find(|(h, _)| *h == hash)
            .map(|(hash, text)| StringEntry {
                hash: *hash,
                text: Cow::Borrowed(text.as_str()),
            })
    }

    // --- types ---------------------------------------------------------------

    /// Registers a type, or re-validates an existing one.
    ///
    /// # Arguments
    /// * `aliased_name` - the type this one aliases; pass `name` itself for a root type
    /// * `num_elements` - `>= 1` declares a fixed-size array of `aliased_name`
    ///
    /// `ALIAS` and `ARRAY` are derived from the arguments and need not be passed.
    pub fn add_type(
        &mut self,
        name: &str,
        data_size: u32,
        flags: TypeFlags,
        aliased_name: &str,
        num_elements: i32,
    ) -> Result<i32> {
        self.atomically(|reg| reg.add_type_inner(name, data_size, flags, aliased_name, num_elements))
    }

    fn add_type_inner(
        &mut self,
        name: &str,
        data_size: u32,
        mut flags: TypeFlags,
        aliased_name: &str,
        num_elements: i32,
    ) -> Result<i32> {
        let hash = hash_case_sensitive(name);
        let aliased_hash = hash_case_sensitive(aliased_name);
        self.add_string(name)?;

        let aliased = if aliased_hash != hash {
            let aliased = self
                .type_by_name(aliased_name)
                .ok_or_else(|| LesError::SymbolNotFound(format!("aliased type '{aliased_name}' of '{name}'")))?;
            flags |= TypeFlags::ALIAS;
            Some(aliased)
        } else {
            None
        };
        let aliased_type_id = self.add_string(aliased_name)?;

        if num_elements >= 1 {
            flags |= TypeFlags::ARRAY;
            let element = aliased.ok_or_else(|| LesError::conflict(name, "array type must alias its element type"))?;
            if !flags.contains(TypeFlags::REFERENCE)
                && element.flags.intersects(TypeFlags::POINTER | TypeFlags::REFERENCE)
            {
                return Err(LesError::conflict(
                    name,
                    format!("array aliases pointer/reference type '{aliased_name}'"),
                ));
            }
            if element.data_size.checked_mul(num_elements as u32).is_none() {
                return Err(LesError::conflict(
                    name,
                    format!("{num_elements} x {} bytes overflows the array size", element.data_size),
                ));
            }
        }

        let entry = TypeEntry {
            hash,
            data_size,
            flags,
            aliased_type_id,
            num_elements,
        };

        if let Some(id) = self.type_id_by_hash(hash) {
            let existing = self.type_by_id(id).ok_or_else(|| LesError::SymbolNotFound(name.to_string()))?;
            if existing != entry {
                return Err(LesError::conflict(
                    name,
                    format!(
                        "existing size {} flags {} alias {} elements {} vs new size {} flags {} alias {} elements {}",
                        existing.data_size,
                        existing.flags,
                        existing.aliased_type_id,
                        existing.num_elements,
                        data_size,
                        flags,
                        aliased_type_id,
                        num_elements
                    ),
                ));
            }
            return Ok(id);
        }
        if self.snapshot.is_some() {
            return Err(LesError::conflict(name, "type is not in the definition file"));
        }

        let id = self.num_types() as i32;
        debug!(type_name = name, id, size = data_size, flags = %flags, "type added");
        self.types.push(entry);
        Ok(id)
    }

    pub fn type_by_id(&self, id: i32) -> Option<TypeEntry> {
        let id = usize::try_from(id).ok()?;
        let snap = self.snapshot_counts().1;
        if id < snap {
            return self.snapshot.as_ref()?.type_table().get_by_index(id);
        }
        self.types.get(id - snap).copied()
    }

    pub fn type_id_by_hash(&self, hash: Hash) -> Option<i32> {
        if let Some(index) = self.snapshot.as_ref().and_then(|f| f.type_table().find_by_hash(hash)) {
            return Some(index as i32);
        }
        let snap = self.snapshot_counts().1;
        self.types
            .iter()
            .position(|t| t.hash == hash)
            .map(|i| (snap + i) as i32)
    }

    // --- structs -------------------------------------------------------------

    /// Registers a struct from `(type, member)` name pairs in declaration order.
    ///
    /// Member padding follows the 4-byte-capped natural alignment rule. If a
    /// `STRUCT` type of the same name exists, its size must equal the padded
    /// native size of the layout.
    pub fn add_struct(&mut self, name: &str, members: &[(&str, &str)]) -> Result<i32> {
        self.atomically(|reg| reg.add_struct_inner(name, members))
    }

    fn add_struct_inner(&mut self, name: &str, members: &[(&str, &str)]) -> Result<i32> {
        let hash = hash_case_sensitive(name);
        let name_id = self.add_string(name)?;

        let mut built = Vec::with_capacity(members.len());
        let mut offset = 0u32;
        let mut max_alignment = 0u32;
        for &(type_name, member_name) in members {
            let member_hash = hash_case_sensitive(member_name);
            if built.iter().any(|m: &StructMember| m.hash == member_hash) {
                return Err(LesError::conflict(name, format!("member '{member_name}' declared twice")));
            }
            let type_id = self.add_string(type_name)?;
            let member_type = self.type_by_string_id(type_id)?;
            let data_size = if member_type.is_array() && !member_type.flags.contains(TypeFlags::REFERENCE) {
                // inline N x element, not a pointer
                self.compute_storage_size(&member_type)?
            } else {
                member_type.data_size
            };
            let alignment = self.compute_alignment(&member_type)?;
            let padding = alignment_padding(offset, alignment);
            max_alignment = max_alignment.max(alignment);
            offset = offset
                .checked_add(data_size)
                .and_then(|n| n.checked_add(padding))
                .ok_or_else(|| LesError::conflict(name, format!("layout overflows at member '{member_name}'")))?;

            built.push(StructMember {
                hash: member_hash,
                name_id: self.add_string(member_name)?,
                type_id,
                data_size: data_size as i32,
                alignment_padding: padding as i32,
            });
        }
        let native_size = offset
            .checked_add(alignment_padding(offset, max_alignment.min(4)))
            .ok_or_else(|| LesError::conflict(name, "layout overflows"))?;

        if let Some(ty) = self.type_by_hash(hash) {
            if !ty.flags.contains(TypeFlags::STRUCT) {
                return Err(LesError::conflict(name, format!("type has flags {} but is declared as a struct", ty.flags)));
            }
            if ty.data_size != native_size {
                return Err(LesError::conflict(
                    name,
                    format!("type size {} does not match struct layout size {native_size}", ty.data_size),
                ));
            }
        }

        let definition = StructDefinition {
            name_id,
            members: built,
        };
        if let Some(existing) = self.struct_by_hash(hash) {
            if *existing != definition {
                return Err(LesError::conflict(name, "struct layout differs from the registered one"));
            }
            return Ok(self.struct_id_by_hash(hash).unwrap_or(-1));
        }
        if self.snapshot.is_some() {
            return Err(LesError::conflict(name, "struct is not in the definition file"));
        }

        let id = self.num_structs() as i32;
        debug!(struct_name = name, id, members = members.len(), native_size, "struct added");
        self.structs.push(definition);
        Ok(id)
    }

    pub fn struct_by_id(&self, id: i32) -> Option<Cow<'_, StructDefinition>> {
        let id = usize::try_from(id).ok()?;
        let snap = self.snapshot_counts().2;
        if id < snap {
            return self.snapshot.as_ref()?.struct_table().get_by_index(id).map(Cow::Owned);
        }
        self.structs.get(id - snap).map(Cow::Borrowed)
    }

    fn struct_id_by_hash(&self, hash: Hash) -> Option<i32> {
        if let Some(file) = &self.snapshot {
            if let Some(index) = file.struct_table().find_by_name_hash(&file.string_table(), hash) {
                return Some(index as i32);
            }
        }
        let snap = self.snapshot_counts().2;
        self.structs
            .iter()
            .position(|s| self.string_by_id(s.name_id).map_or(false, |e| e.hash == hash))
            .map(|i| (snap + i) as i32)
    }

    // --- functions -----------------------------------------------------------

    /// Registers a function from `(type, name)` pairs for its inputs and outputs.
    pub fn add_function(
        &mut self,
        name: &str,
        return_type: &str,
        inputs: &[(&str, &str)],
        outputs: &[(&str, &str)],
    ) -> Result<i32> {
        self.atomically(|reg| reg.add_function_inner(name, return_type, inputs, outputs))
    }

    fn add_function_inner(
        &mut self,
        name: &str,
        return_type: &str,
        inputs: &[(&str, &str)],
        outputs: &[(&str, &str)],
    ) -> Result<i32> {
        let hash = hash_case_sensitive(name);
        let name_id = self.add_string(name)?;
        let return_type_id = self.add_string(return_type)?;
        self.type_by_string_id(return_type_id)?;

        let mut definition = FunctionDefinition {
            name_id,
            return_type_id,
            parameter_data_size: 0,
            inputs: Vec::with_capacity(inputs.len()),
            outputs: Vec::with_capacity(outputs.len()),
        };
        let declared = inputs
            .iter()
            .map(|p| (p, ParamMode::Input))
            .chain(outputs.iter().map(|p| (p, ParamMode::Output)));
        for (index, (&(type_name, param_name), mode)) in declared.enumerate() {
            let param_hash = hash_case_sensitive(param_name);
            if definition.param_by_hash(param_hash).is_some() {
                return Err(LesError::conflict(name, format!("parameter '{param_name}' declared twice")));
            }
            let type_id = self.add_string(type_name)?;
            let ty = self.type_by_string_id(type_id)?;
            if !ty.flags.contains(mode.flag()) {
                return Err(LesError::conflict(
                    name,
                    format!("parameter '{param_name}' type '{type_name}' ({}) cannot be {mode}", ty.flags),
                ));
            }
            let param = FunctionParameter {
                hash: param_hash,
                name_id: self.add_string(param_name)?,
                type_id,
                index: index as i32,
                mode,
            };
            match mode {
                ParamMode::Input => definition.inputs.push(param),
                ParamMode::Output => definition.outputs.push(param),
            }
        }
        definition.parameter_data_size = self.compute_parameter_data_size(&definition)?;

        if let Some(existing) = self.function_by_hash(hash) {
            if *existing != definition {
                return Err(LesError::conflict(name, "function signature differs from the registered one"));
            }
            return Ok(self.function_id_by_hash(hash).unwrap_or(-1));
        }
        if self.snapshot.is_some() {
            return Err(LesError::conflict(name, "function is not in the definition file"));
        }

        let id = self.num_functions() as i32;
        debug!(
            function = name,
            id,
            parameter_data_size = definition.parameter_data_size,
            "function added"
        );
        self.functions.push(definition);
        Ok(id)
    }

    /// Function named `name`, matched by hash and confirmed by exact text.
    pub fn function_by_name(&self, name: &str) -> Option<Cow<'_, FunctionDefinition>> {
        let function = self.function_by_hash(hash_case_sensitive(name))?;
        let text_matches = self
            .string_by_id(function.name_id)
            .map_or(false, |entry| entry.text == name);
        text_matches.then_some(function)
    }

    pub fn function_by_id(&self, id: i32) -> Option<Cow<'_, FunctionDefinition>> {
        let id = usize::try_from(id).ok()?;
        let snap = self.snapshot_counts().3;
        if id < snap {
            return self.snapshot.as_ref()?.function_table().get_by_index(id).map(Cow::Owned);
        }
        self.functions.get(id - snap).map(Cow::Borrowed)
    }

    fn function_id_by_hash(&self, hash: Hash) -> Option<i32> {
        if let Some(file) = &self.snapshot {
            if let Some(index) = file.function_table().find_by_name_hash(&file.string_table(), hash) {
                return Some(index as i32);
            }
        }
        let snap = self.snapshot_counts().3;
        self.functions
            .iter()
            .position(|f| self.string_by_id(f.name_id).map_or(false, |e| e.hash == hash))
            .map(|i| (snap + i) as i32)
    }

    /// Process-local tables, for exporting into a definition file.
    pub(crate) fn local_tables(
        &self,
    ) -> (&[(Hash, String)], &[TypeEntry], &[StructDefinition], &[FunctionDefinition]) {
        (&self.strings, &self.types, &self.structs, &self.functions)
    }
}

impl SymbolLookup for SymbolRegistry {
    fn string_by_id(&self, id: i32) -> Option<StringEntry<'_>> {
        let index = usize::try_from(id).ok()?;
        let snap = self.snapshot_counts().0;
        if index < snap {
            return self.snapshot.as_ref()?.string_by_id(id);
        }
        self.strings.get(index - snap).map(|(hash, text)| StringEntry {
            hash: *hash,
            text: Cow::Borrowed(text.as_str()),
        })
    }

    fn string_id_by_hash_and_text(&self, hash: Hash, text: &str) -> Option<i32> {
        if let Some(id) = self
            .snapshot
            .as_ref()
            .and_then(|file| file.string_id_by_hash_and_text(hash, text))
        {
            return Some(id);
        }
        let snap = self.snapshot_counts().0;
        self.strings
            .iter()
            .position(|(h, t)| *h == hash && t == text)
            .map(|i| (snap + i) as i32)
    }

    fn type_by_hash(&self, hash: Hash) -> Option<TypeEntry> {
        self.type_by_id(self.type_id_by_hash(hash)?)
    }

    fn struct_by_hash(&self, hash: Hash) -> Option<Cow<'_, StructDefinition>> {
        self.struct_by_id(self.struct_id_by_hash(hash)?)
    }

    fn function_by_hash(&self, hash: Hash) -> Option<Cow<'_, FunctionDefinition>> {
        self.function_by_id(self.function_id_by_hash(hash)?)
    }
}
