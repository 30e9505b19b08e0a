use les_rpc::Core::{hash_case_sensitive, DefinitionError, LesError};
use les_rpc::Definition::file::TYPE_CHUNK;
use les_rpc::Definition::{DefinitionFile, DefinitionWriter, TypeFlags};
use les_rpc::Registry::lookup::{alignment_padding, MAX_ALIAS_DEPTH};
use les_rpc::Registry::{Declarations, FunctionDecl, StructDecl, SymbolLookup, SymbolRegistry, TypeDecl};

fn builtin_registry() -> SymbolRegistry {
    let mut registry = SymbolRegistry::new();
    Declarations::with_builtin_types().register_into(&mut registry).unwrap();
    registry
}

fn counts(registry: &SymbolRegistry) -> (usize, usize, usize, usize) {
    (
        registry.num_strings(),
        registry.num_types(),
        registry.num_structs(),
        registry.num_functions(),
    )
}

#[test]
fn alias_and_array_flags_are_derived() {
    let mut registry = builtin_registry();
    TypeDecl::pod_array("int", 4, 4).register(&mut registry).unwrap();

    let pointer = registry.type_by_name("int*").unwrap();
    assert!(pointer.flags.contains(TypeFlags::ALIAS | TypeFlags::POINTER | TypeFlags::OUTPUT));
    assert!(!pointer.is_array());

    let array = registry.type_by_name("int[4]").unwrap();
    assert!(array.flags.contains(TypeFlags::ALIAS | TypeFlags::ARRAY));
    assert_eq!(array.num_elements, 4);
    assert_eq!(array.data_size, 16);

    let int = registry.type_by_name("int").unwrap();
    assert!(!int.is_alias());
    assert_eq!(registry.name_of(int.aliased_type_id), "int");
}

#[test]
fn reference_resolves_through_its_pointer() {
    let registry = builtin_registry();
    let reference = registry.type_by_name("float&").unwrap();
    assert_eq!(registry.name_of(reference.aliased_type_id), "float*");
    let root = registry.resolve_root(&reference).unwrap();
    assert_eq!(root.hash, hash_case_sensitive("float"));
    assert_eq!(registry.compute_storage_size(&reference).unwrap(), 4);
}

#[test]
fn identical_re_add_returns_the_same_id() {
    let mut registry = builtin_registry();
    let first = registry.type_id_by_hash(hash_case_sensitive("short")).unwrap();
    let before = counts(&registry);
    let again = TypeDecl::pod("short", 2).register(&mut registry).unwrap();
    assert_eq!(first, again);
    assert_eq!(counts(&registry), before);
}

#[test]
fn conflicting_re_add_leaves_tables_unchanged() {
    let mut registry = builtin_registry();
    let before = counts(&registry);
    let err = TypeDecl::pod("int", 8).register(&mut registry).unwrap_err();
    assert!(matches!(err, LesError::SymbolConflict { ref name, .. } if name == "int"));
    assert_eq!(counts(&registry), before);
    assert_eq!(registry.type_by_name("int").unwrap().data_size, 4);
}

#[test]
fn unknown_alias_target_rolls_back_the_name() {
    let mut registry = builtin_registry();
    let before = counts(&registry);
    let err = TypeDecl::new("handle", 4, TypeFlags::INPUT | TypeFlags::POD, "missing")
        .register(&mut registry)
        .unwrap_err();
    assert!(matches!(err, LesError::SymbolNotFound(_)));
    assert_eq!(counts(&registry), before);
    assert!(registry.string_id("handle").is_none());
}

#[test]
fn array_of_pointers_needs_the_reference_flag() {
    let mut registry = builtin_registry();
    let err = TypeDecl::pod_array("int*", 4, 2).register(&mut registry).unwrap_err();
    assert!(matches!(err, LesError::SymbolConflict { .. }));

    TypeDecl::pod_array("int&", 4, 2)
        .with_flags(TypeFlags::REFERENCE)
        .register(&mut registry)
        .unwrap();
    assert!(registry.type_by_name("int&[2]").unwrap().is_array());
}

#[test]
fn struct_members_are_padded_to_at_most_four_bytes() {
    let mut registry = builtin_registry();
    TypeDecl::structure("CharInt", 8).register(&mut registry).unwrap();
    StructDecl::new("CharInt")
        .member("char", "c")
        .member("int", "x")
        .register(&mut registry)
        .unwrap();
    TypeDecl::structure("CharDouble", 12).register(&mut registry).unwrap();
    StructDecl::new("CharDouble")
        .member("char", "c")
        .member("double", "d")
        .register(&mut registry)
        .unwrap();

    let char_int = registry.struct_by_hash(hash_case_sensitive("CharInt")).unwrap();
    let x = char_int.get_member(hash_case_sensitive("x")).unwrap();
    assert_eq!(x.alignment_padding, 3);
    assert_eq!(char_int.native_size(), 8);

    let char_double = registry.struct_by_hash(hash_case_sensitive("CharDouble")).unwrap();
    let d = char_double.get_member(hash_case_sensitive("d")).unwrap();
    assert_eq!((d.data_size, d.alignment_padding), (8, 3));

    let ty = registry.type_by_name("CharDouble").unwrap();
    assert_eq!(registry.compute_alignment(&ty).unwrap(), 8);
    assert_eq!(registry.compute_storage_size(&ty).unwrap(), 9);
}

#[test]
fn int_char_struct_has_no_trailing_wire_padding() {
    let mut registry = builtin_registry();
    TypeDecl::structure("Pair", 8).register(&mut registry).unwrap();
    StructDecl::new("Pair")
        .member("int", "x")
        .member("char", "c")
        .register(&mut registry)
        .unwrap();

    let pair = registry.struct_by_hash(hash_case_sensitive("Pair")).unwrap();
    let paddings: Vec<i32> = pair.members.iter().map(|m| m.alignment_padding).collect();
    assert_eq!(paddings, vec![0, 0]);
    let ty = registry.type_by_name("Pair").unwrap();
    assert_eq!(ty.data_size, 8);
    assert_eq!(registry.compute_storage_size(&ty).unwrap(), 5);
}

#[test]
fn struct_type_size_must_match_layout() {
    let mut registry = builtin_registry();
    TypeDecl::structure("Small", 4).register(&mut registry).unwrap();
    let before = counts(&registry);
    let err = StructDecl::new("Small")
        .member("int", "a")
        .member("char", "b")
        .register(&mut registry)
        .unwrap_err();
    assert!(matches!(err, LesError::SymbolConflict { .. }));
    assert_eq!(counts(&registry), before);
}

#[test]
fn array_members_store_their_full_size() {
    let mut registry = builtin_registry();
    TypeDecl::pod_array("short", 2, 3).register(&mut registry).unwrap();
    TypeDecl::structure("Triple", 6).register(&mut registry).unwrap();
    StructDecl::new("Triple")
        .member("short[3]", "v")
        .register(&mut registry)
        .unwrap();
    let triple = registry.struct_by_hash(hash_case_sensitive("Triple")).unwrap();
    assert_eq!(triple.members[0].data_size, 6);
}

#[test]
fn function_parameter_data_size_sums_storage() {
    let mut registry = builtin_registry();
    FunctionDecl::new("jakeInit", "void")
        .input("int", "a")
        .input("short", "b")
        .output("float*", "r")
        .register(&mut registry)
        .unwrap();

    let function = registry.function_by_name("jakeInit").unwrap();
    assert_eq!(function.parameter_data_size, 10);
    assert_eq!(registry.compute_parameter_data_size(&function).unwrap(), 10);
    let indices: Vec<i32> = function.params().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn function_rules_are_enforced() {
    let mut registry = builtin_registry();
    let before = counts(&registry);

    let wrong_mode = FunctionDecl::new("f", "void").output("int", "x").register(&mut registry);
    assert!(matches!(wrong_mode, Err(LesError::SymbolConflict { .. })));

    let duplicate = FunctionDecl::new("g", "void")
        .input("int", "a")
        .input("short", "a")
        .register(&mut registry);
    assert!(matches!(duplicate, Err(LesError::SymbolConflict { .. })));

    let no_return = FunctionDecl::new("h", "Nope").register(&mut registry);
    assert!(matches!(no_return, Err(LesError::SymbolNotFound(_))));

    assert_eq!(counts(&registry), before);
}

#[test]
fn colliding_strings_get_distinct_ids() {
    let mut registry = SymbolRegistry::new();
    let a = registry.add_string("jzhieuv").unwrap();
    let b = registry.add_string("vhdqqql").unwrap();
    assert_ne!(a, b);
    assert_eq!(registry.string_id("jzhieuv"), Some(a));
    assert_eq!(registry.string_id("vhdqqql"), Some(b));
    assert_eq!(registry.string_by_id(b).unwrap().as_str(), "vhdqqql");
    assert_eq!(registry.add_string("vhdqqql").unwrap(), b);
}

#[test]
fn function_lookup_confirms_text() {
    let mut registry = builtin_registry();
    FunctionDecl::new("jzhieuv", "void").register(&mut registry).unwrap();
    assert!(registry.function_by_name("jzhieuv").is_some());
    assert!(registry.function_by_name("vhdqqql").is_none());
}

#[test]
fn ids_are_stable() {
    let mut registry = builtin_registry();
    let names = ["alpha", "beta", "gamma"];
    let ids: Vec<i32> = names.iter().map(|n| registry.add_string(n).unwrap()).collect();
    TypeDecl::pod("wide", 16).register(&mut registry).unwrap();
    for (name, id) in names.iter().zip(ids) {
        let entry = registry.string_by_id(registry.string_id(name).unwrap()).unwrap();
        assert_eq!(registry.string_id(name), Some(id));
        assert_eq!(entry.as_str(), *name);
        assert_eq!(entry.hash, hash_case_sensitive(name));
    }
}

#[test]
fn snapshot_registry_only_validates() {
    let declarations = Declarations::with_builtin_types().with_function(
        FunctionDecl::new("jakeInit", "void")
            .input("int", "a")
            .input("short", "b")
            .output("float*", "r"),
    );
    let mut source = SymbolRegistry::new();
    declarations.register_into(&mut source).unwrap();
    let file = DefinitionFile::load(&DefinitionWriter::write(&source).unwrap()).unwrap();

    let mut registry = SymbolRegistry::with_definition_file(file);
    declarations.register_into(&mut registry).unwrap();
    assert_eq!(registry.num_local_symbols(), 0);
    assert_eq!(counts(&registry), counts(&source));

    let unknown = TypeDecl::pod("long", 4).register(&mut registry);
    assert!(matches!(unknown, Err(LesError::SymbolConflict { .. })));
    let resized = TypeDecl::pod("int", 2).register(&mut registry);
    assert!(matches!(resized, Err(LesError::SymbolConflict { .. })));
    assert_eq!(registry.num_local_symbols(), 0);
}

#[test]
fn definition_file_attaches_only_to_an_empty_registry() {
    let source = builtin_registry();
    let bytes = DefinitionWriter::write(&source).unwrap();

    let mut busy = SymbolRegistry::new();
    busy.add_string("local").unwrap();
    let err = busy.set_definition_file(DefinitionFile::load(&bytes).unwrap()).unwrap_err();
    assert!(matches!(err, LesError::SymbolConflict { .. }));

    let mut empty = SymbolRegistry::new();
    empty.set_definition_file(DefinitionFile::load(&bytes).unwrap()).unwrap();
    assert!(empty.set_definition_file(DefinitionFile::load(&bytes).unwrap()).is_err());
}

#[test]
fn alias_cycle_is_detected() {
    let mut registry = SymbolRegistry::new();
    TypeDecl::pod("int", 4).register(&mut registry).unwrap();
    TypeDecl::new("myint", 4, TypeFlags::INPUT | TypeFlags::POD, "int")
        .register(&mut registry)
        .unwrap();
    let int_id = registry.type_id_by_hash(hash_case_sensitive("int")).unwrap() as usize;
    let myint_name = registry.string_id("myint").unwrap();

    // point "int" back at "myint"
    let mut bytes = DefinitionWriter::write(&registry).unwrap();
    let types = u32::from_le_bytes(bytes[8 + TYPE_CHUNK * 4..12 + TYPE_CHUNK * 4].try_into().unwrap()) as usize;
    let entry = types + 8 + int_id * 20;
    let flags = TypeFlags::INPUT | TypeFlags::POD | TypeFlags::ALIAS;
    bytes[entry + 8..entry + 12].copy_from_slice(&flags.bits().to_le_bytes());
    bytes[entry + 12..entry + 16].copy_from_slice(&myint_name.to_le_bytes());

    let file = DefinitionFile::load(&bytes).unwrap();
    let myint = file.type_by_name("myint").unwrap();
    let err = file.resolve_root(&myint).unwrap_err();
    assert!(matches!(
        err,
        LesError::MalformedDefinitionFile(DefinitionError::AliasCycle { hops, .. }) if hops == MAX_ALIAS_DEPTH
    ));
}

#[test]
fn padding_rule() {
    assert_eq!(alignment_padding(0, 4), 0);
    assert_eq!(alignment_padding(1, 4), 3);
    assert_eq!(alignment_padding(2, 2), 0);
    assert_eq!(alignment_padding(3, 2), 1);
    assert_eq!(alignment_padding(5, 8), 3);
    assert_eq!(alignment_padding(7, 0), 0);
    assert_eq!(alignment_padding(7, 1), 0);
}

#[test]
fn oversized_array_is_refused_at_registration() {
    let mut registry = builtin_registry();
    let before = counts(&registry);
    let err = registry
        .add_type("int[big]", 4, TypeFlags::INPUT | TypeFlags::POD, "int", 1 << 30)
        .unwrap_err();
    assert!(matches!(err, LesError::SymbolConflict { .. }));
    assert_eq!(counts(&registry), before);
}

#[test]
fn storage_size_overflow_is_an_error() {
    let registry = builtin_registry();
    let huge = les_rpc::Definition::TypeEntry {
        hash: hash_case_sensitive("int[big]"),
        data_size: 4,
        flags: TypeFlags::INPUT | TypeFlags::POD | TypeFlags::ALIAS | TypeFlags::ARRAY,
        aliased_type_id: registry.string_id("int").unwrap(),
        num_elements: 1 << 30,
    };
    assert!(matches!(
        registry.compute_storage_size(&huge),
        Err(LesError::MalformedDefinitionFile(DefinitionError::Corrupt(_)))
    ));
}

#[test]
fn array_shorthand_saturates_instead_of_wrapping() {
    let decl = TypeDecl::pod_array("int", 4, i32::MAX);
    let mut registry = builtin_registry();
    assert!(decl.register(&mut registry).is_err());
}
