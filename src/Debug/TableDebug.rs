use crate::Definition::{ChunkContainer, DefinitionFile, TypeEntry};
use crate::Network::CoreEngine;
use crate::Registry::{SymbolLookup, SymbolRegistry};
use std::fmt;
use tracing::info;

/// Debug function for ChunkContainer
///
/// Shows the four-byte id, the chunk offsets and the blob size without dumping
/// the blob itself.
pub fn debug_chunk_container(container: &ChunkContainer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let offsets: Vec<usize> = (0..container.num_chunks())
        .filter_map(|i| container.chunk_range(i).map(|range| range.start))
        .collect();
    f.debug_struct("ChunkContainer")
        .field("id", &String::from_utf8_lossy(&container.id()))
        .field("chunks", &container.num_chunks())
        .field("offsets", &offsets)
        .field("len", &container.as_bytes().len())
        .finish()
}

/// Debug function for DefinitionFile
///
/// Table counts plus the digest; entries are dumped by the `log_*` functions.
pub fn debug_definition_file(file: &DefinitionFile, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DefinitionFile")
        .field("strings", &file.string_table().count())
        .field("types", &file.type_table().count())
        .field("structs", &file.struct_table().count())
        .field("functions", &file.function_table().count())
        .field("digest", &file.digest_hex())
        .finish()
}

pub fn debug_core_engine(engine: &CoreEngine, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CoreEngine")
        .field("state", &engine.state())
        .field("host", &engine.config().host)
        .field("port", &engine.config().port)
        .field("network_running", &engine.is_network_running())
        .field("handlers", &engine.handler_types())
        .field("pending_sends", &engine.queues().pending_sends())
        .field("types", &engine.registry().num_types())
        .field("functions", &engine.registry().num_functions())
        .finish_non_exhaustive()
}

fn type_name(registry: &SymbolRegistry, ty: &TypeEntry) -> String {
    registry
        .string_by_hash(ty.hash)
        .map(|entry| entry.text.into_owned())
        .unwrap_or_else(|| format!("<type 0x{:08X}>", ty.hash))
}

/// Logs every type: size, flags, alias target and element count.
pub fn log_types(registry: &SymbolRegistry) {
    info!("types ({})", registry.num_types());
    for id in 0..registry.num_types() as i32 {
        let Some(ty) = registry.type_by_id(id) else {
            continue;
        };
        let alias = if ty.is_alias() {
            registry.name_of(ty.aliased_type_id)
        } else {
            "-".to_string()
        };
        info!(
            "  [{id}] {} size={} flags={} alias={} elements={}",
            type_name(registry, &ty),
            ty.data_size,
            ty.flags,
            alias,
            ty.num_elements
        );
    }
}

/// Logs every struct with its members' type, size and padding.
pub fn log_structs(registry: &SymbolRegistry) {
    info!("structs ({})", registry.num_structs());
    for id in 0..registry.num_structs() as i32 {
        let Some(definition) = registry.struct_by_id(id) else {
            continue;
        };
        info!("  [{id}] struct {} ({} members)", registry.name_of(definition.name_id), definition.num_members());
        for member in &definition.members {
            info!(
                "      {} {} size={} padding={}",
                registry.name_of(member.type_id),
                registry.name_of(member.name_id),
                member.data_size,
                member.alignment_padding
            );
        }
    }
}

/// Logs every function signature and its parameter data size.
pub fn log_functions(registry: &SymbolRegistry) {
    info!("functions ({})", registry.num_functions());
    for id in 0..registry.num_functions() as i32 {
        let Some(function) = registry.function_by_id(id) else {
            continue;
        };
        let params: Vec<String> = function
            .params()
            .map(|p| format!("{} {} {}", p.mode, registry.name_of(p.type_id), registry.name_of(p.name_id)))
            .collect();
        info!(
            "  [{id}] {} {}({}) parameterDataSize={}",
            registry.name_of(function.return_type_id),
            registry.name_of(function.name_id),
            params.join(", "),
            function.parameter_data_size
        );
    }
}
