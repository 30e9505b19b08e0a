use super::file::{DEFINITION_MAGIC, NUM_CHUNKS};
use crate::Core::endian::{push_i32_le, push_u32_le, round_up_4};
use crate::Core::{LesError, Result};
use crate::Registry::SymbolRegistry;

/// Serialises a registry's process-local tables into the on-disk layout that
/// [`DefinitionFile::load`](super::DefinitionFile::load) reads back.
///
/// IDs are preserved: string, type, struct and function `i` of the registry
/// become entry `i` of the respective table.
pub struct DefinitionWriter;

impl DefinitionWriter {
    pub fn write(registry: &SymbolRegistry) -> Result<Vec<u8>> {
        if registry.definition_file().is_some() {
            return Err(LesError::Protocol(
                "cannot export a registry that already holds a definition file".to_string(),
            ));
        }
        let (strings, types, structs, functions) = registry.local_tables();

        let mut string_chunk = Vec::new();
        push_i32_le(&mut string_chunk, strings.len() as i32);
        push_i32_le(&mut string_chunk, 0);
        let mut text = Vec::new();
        let texts_start = 8 + strings.len() * 8;
        for (hash, s) in strings {
            push_u32_le(&mut string_chunk, *hash);
            push_i32_le(&mut string_chunk, (texts_start + text.len()) as i32);
            text.extend_from_slice(s.as_bytes());
            text.push(0);
        }
        string_chunk.extend_from_slice(&text);

        let mut type_chunk = Vec::new();
        push_i32_le(&mut type_chunk, types.len() as i32);
        push_i32_le(&mut type_chunk, 0);
        for ty in types {
            push_u32_le(&mut type_chunk, ty.hash);
            push_u32_le(&mut type_chunk, ty.data_size);
            push_u32_le(&mut type_chunk, ty.flags.bits());
            push_i32_le(&mut type_chunk, ty.aliased_type_id);
            push_i32_le(&mut type_chunk, ty.num_elements);
        }

        let struct_records = structs.iter().map(|s| {
            let mut record = Vec::new();
            push_i32_le(&mut record, s.name_id);
            push_i32_le(&mut record, s.members.len() as i32);
            for m in &s.members {
                push_u32_le(&mut record, m.hash);
                push_i32_le(&mut record, m.name_id);
                push_i32_le(&mut record, m.type_id);
                push_i32_le(&mut record, m.data_size);
                push_i32_le(&mut record, m.alignment_padding);
            }
            record
        });
        let struct_chunk = offset_table(struct_records.collect());

        let function_records = functions.iter().map(|f| {
            let mut record = Vec::new();
            push_i32_le(&mut record, f.name_id);
            push_i32_le(&mut record, f.return_type_id);
            push_u32_le(&mut record, f.parameter_data_size);
            push_i32_le(&mut record, f.inputs.len() as i32);
            push_i32_le(&mut record, f.outputs.len() as i32);
            for p in f.params() {
                push_u32_le(&mut record, p.hash);
                push_i32_le(&mut record, p.name_id);
                push_i32_le(&mut record, p.type_id);
                push_i32_le(&mut record, p.index);
                push_u32_le(&mut record, p.mode.flag().bits());
            }
            record
        });
        let function_chunk = offset_table(function_records.collect());

        Ok(container([string_chunk, type_chunk, struct_chunk, function_chunk]))
    }
}

/// `i32 count, i32 settled, [u32 offset] x count, records`, offsets relative to the chunk.
fn offset_table(records: Vec<Vec<u8>>) -> Vec<u8> {
    let mut chunk = Vec::new();
    push_i32_le(&mut chunk, records.len() as i32);
    push_i32_le(&mut chunk, 0);
    let mut offset = 8 + records.len() * 4;
    for record in &records {
        push_u32_le(&mut chunk, offset as u32);
        offset += record.len();
    }
    for record in records {
        chunk.extend_from_slice(&record);
    }
    chunk
}

fn container(chunks: [Vec<u8>; NUM_CHUNKS as usize]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&DEFINITION_MAGIC);
    push_u32_le(&mut out, NUM_CHUNKS);
    let mut offset = round_up_4(8 + chunks.len() * 4);
    let mut starts = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        push_u32_le(&mut out, offset as u32);
        starts.push(offset);
        offset = round_up_4(offset + chunk.len());
    }
    for (chunk, start) in chunks.iter().zip(starts) {
        out.resize(start, 0);
        out.extend_from_slice(chunk);
    }
    out
}
