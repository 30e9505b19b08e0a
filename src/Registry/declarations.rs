use super::registry::SymbolRegistry;
use crate::Core::Result;
use crate::Definition::TypeFlags;

/// Pointer and reference slots are 32-bit in the definition format.
pub const POINTER_SIZE: u32 = 4;

/// A type declaration, replayable into any registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    pub data_size: u32,
    pub flags: TypeFlags,
    pub aliased_name: String,
    pub num_elements: i32,
}

impl TypeDecl {
    pub fn new(name: &str, data_size: u32, flags: TypeFlags, aliased_name: &str) -> Self {
        Self {
            name: name.to_string(),
            data_size,
            flags,
            aliased_name: aliased_name.to_string(),
            num_elements: 0,
        }
    }

    pub fn pod(name: &str, data_size: u32) -> Self {
        Self::new(name, data_size, TypeFlags::INPUT | TypeFlags::POD, name)
    }

    pub fn pod_pointer(name: &str) -> Self {
        Self::new(
            &format!("{name}*"),
            POINTER_SIZE,
            TypeFlags::INPUT | TypeFlags::OUTPUT | TypeFlags::POD | TypeFlags::POINTER,
            name,
        )
    }

    pub fn pod_reference(name: &str) -> Self {
        Self::new(
            &format!("{name}&"),
            POINTER_SIZE,
            TypeFlags::INPUT | TypeFlags::OUTPUT | TypeFlags::POD | TypeFlags::REFERENCE,
            &format!("{name}*"),
        )
    }

    pub fn pod_array(name: &str, element_size: u32, num_elements: i32) -> Self {
        Self {
            num_elements,
            ..Self::new(
                &format!("{name}[{num_elements}]"),
                element_size.saturating_mul(num_elements.max(0) as u32),
                TypeFlags::INPUT | TypeFlags::POD,
                name,
            )
        }
    }

    pub fn structure(name: &str, data_size: u32) -> Self {
        Self::new(name, data_size, TypeFlags::INPUT | TypeFlags::STRUCT, name)
    }

    pub fn struct_pointer(name: &str) -> Self {
        Self::new(
            &format!("{name}*"),
            POINTER_SIZE,
            TypeFlags::INPUT | TypeFlags::OUTPUT | TypeFlags::STRUCT | TypeFlags::POINTER,
            name,
        )
    }

    pub fn struct_reference(name: &str) -> Self {
        Self::new(
            &format!("{name}&"),
            POINTER_SIZE,
            TypeFlags::INPUT | TypeFlags::OUTPUT | TypeFlags::STRUCT | TypeFlags::REFERENCE,
            &format!("{name}*"),
        )
    }

    pub fn struct_array(name: &str, struct_size: u32, num_elements: i32) -> Self {
        Self {
            num_elements,
            ..Self::new(
                &format!("{name}[{num_elements}]"),
                struct_size.saturating_mul(num_elements.max(0) as u32),
                TypeFlags::INPUT | TypeFlags::STRUCT,
                name,
            )
        }
    }

    /// Adds `flags` on top of the shorthand's defaults.
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn register(&self, registry: &mut SymbolRegistry) -> Result<i32> {
        registry.add_type(
            &self.name,
            self.data_size,
            self.flags,
            &self.aliased_name,
            self.num_elements,
        )
    }
}

fn borrowed(pairs: &[(String, String)]) -> Vec<(&str, &str)> {
    pairs.iter().map(|(t, n)| (t.as_str(), n.as_str())).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    pub name: String,
    pub members: Vec<(String, String)>,
}

impl StructDecl {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, type_name: &str, member_name: &str) -> Self {
        self.members.push((type_name.to_string(), member_name.to_string()));
        self
    }

    pub fn register(&self, registry: &mut SymbolRegistry) -> Result<i32> {
        registry.add_struct(&self.name, &borrowed(&self.members))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: String,
    pub inputs: Vec<(String, String)>,
    pub outputs: Vec<(String, String)>,
}

impl FunctionDecl {
    pub fn new(name: &str, return_type: &str) -> Self {
        Self {
            name: name.to_string(),
            return_type: return_type.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, type_name: &str, name: &str) -> Self {
        self.inputs.push((type_name.to_string(), name.to_string()));
        self
    }

    pub fn output(mut self, type_name: &str, name: &str) -> Self {
        self.outputs.push((type_name.to_string(), name.to_string()));
        self
    }

    pub fn register(&self, registry: &mut SymbolRegistry) -> Result<i32> {
        registry.add_function(
            &self.name,
            &self.return_type,
            &borrowed(&self.inputs),
            &borrowed(&self.outputs),
        )
    }
}

/// An ordered bundle of compiled-in declarations.
///
/// Types are replayed first, then structs, then functions, so later entries may
/// reference earlier ones. Replaying into a registry that holds a definition
/// file validates every declaration against it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub types: Vec<TypeDecl>,
    pub structs: Vec<StructDecl>,
    pub functions: Vec<FunctionDecl>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the scalar types every peer knows about.
    pub fn with_builtin_types() -> Self {
        Self {
            types: super::builtin::BUILTIN_TYPES.clone(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        self.types.push(decl);
        self
    }

    pub fn with_struct(mut self, decl: StructDecl) -> Self {
        self.structs.push(decl);
        self
    }

    pub fn with_function(mut self, decl: FunctionDecl) -> Self {
        self.functions.push(decl);
        self
    }

    pub fn register_into(&self, registry: &mut SymbolRegistry) -> Result<()> {
        for decl in &self.types {
            decl.register(registry)?;
        }
        for decl in &self.structs {
            decl.register(registry)?;
        }
        for decl in &self.functions {
            decl.register(registry)?;
        }
        Ok(())
    }
}
