use super::chunk::ChunkContainer;
use super::function_table::FunctionTable;
use super::string_table::StringTable;
use super::struct_table::StructTable;
use super::type_table::TypeTable;
use crate::Core::{DefinitionError, LesError};
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info};

pub const DEFINITION_MAGIC: [u8; 4] = *b"LESD";
pub const NUM_CHUNKS: u32 = 4;

pub const STRING_CHUNK: usize = 0;
pub const TYPE_CHUNK: usize = 1;
pub const STRUCT_CHUNK: usize = 2;
pub const FUNCTION_CHUNK: usize = 3;

/// A loaded, fully settled definition file.
///
/// Owns the backing blob; every table view borrows from it. Construction either
/// settles all four tables or fails, so a partially settled snapshot is never
/// observable.
pub struct DefinitionFile {
    container: ChunkContainer,
    digest: [u8; 32],
}

impl DefinitionFile {
    /// Copies `bytes`, validates the container and settles the four tables.
    pub fn load(bytes: &[u8]) -> Result<Self, DefinitionError> {
        let mut container = ChunkContainer::load(bytes)?;

        if container.id() != DEFINITION_MAGIC {
            return Err(DefinitionError::BadMagic {
                found: container.id(),
                expected: DEFINITION_MAGIC,
            });
        }
        if container.num_chunks() != NUM_CHUNKS as usize {
            return Err(DefinitionError::BadChunkCount {
                found: container.num_chunks() as u32,
                expected: NUM_CHUNKS,
            });
        }

        let ranges = [STRING_CHUNK, TYPE_CHUNK, STRUCT_CHUNK, FUNCTION_CHUNK]
            .map(|index| container.chunk_range(index).unwrap_or(0..0));

        let blob = container.blob_mut();
        StringTable::settle(blob, ranges[STRING_CHUNK].clone())?;
        TypeTable::settle(blob, ranges[TYPE_CHUNK].clone())?;
        StructTable::settle(blob, ranges[STRUCT_CHUNK].clone())?;
        FunctionTable::settle(blob, ranges[FUNCTION_CHUNK].clone())?;
        container.settle_header();

        let digest: [u8; 32] = Sha256::digest(bytes).into();
        let file = Self { container, digest };
        info!(
            strings = file.string_table().count(),
            types = file.type_table().count(),
            structs = file.struct_table().count(),
            functions = file.function_table().count(),
            digest = %file.digest_hex(),
            "definition file loaded ({} bytes)",
            bytes.len()
        );
        Ok(file)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LesError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        debug!("read definition file {}", path.display());
        Ok(Self::load(&bytes)?)
    }

    fn range(&self, index: usize) -> Range<usize> {
        self.container.chunk_range(index).unwrap_or(0..0)
    }

    pub fn string_table(&self) -> StringTable<'_> {
        StringTable::new(self.container.as_bytes(), self.range(STRING_CHUNK))
    }

    pub fn type_table(&self) -> TypeTable<'_> {
        TypeTable::new(self.container.as_bytes(), self.range(TYPE_CHUNK))
    }

    pub fn struct_table(&self) -> StructTable<'_> {
        StructTable::new(self.container.as_bytes(), self.range(STRUCT_CHUNK))
    }

    pub fn function_table(&self) -> FunctionTable<'_> {
        FunctionTable::new(self.container.as_bytes(), self.range(FUNCTION_CHUNK))
    }

    pub fn container(&self) -> &ChunkContainer {
        &self.container
    }

    /// Re-runs the settle pass on one table. Always fails on a loaded file.
    pub fn resettle(&mut self, chunk: usize) -> Result<(), DefinitionError> {
        let range = self.range(chunk);
        let blob = self.container.blob_mut();
        match chunk {
            STRING_CHUNK => StringTable::settle(blob, range),
            TYPE_CHUNK => TypeTable::settle(blob, range),
            STRUCT_CHUNK => StructTable::settle(blob, range),
            FUNCTION_CHUNK => FunctionTable::settle(blob, range),
            _ => Err(DefinitionError::Corrupt(format!("no chunk {chunk}"))),
        }
    }

    /// SHA-256 of the bytes the file was loaded from.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

impl fmt::Debug for DefinitionFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::TableDebug::debug_definition_file(self, f)
    }
}
