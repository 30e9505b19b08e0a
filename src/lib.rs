// Module naming follows project convention (one capitalised group per layer)
#[allow(non_snake_case)]
pub mod Core {
    pub mod endian;
    pub mod error;
    pub mod hash;
    pub use error::{DefinitionError, LesError, QueueRejected, Result}; // re-export for stable path
    pub use hash::{hash, hash_case_sensitive, Hash, INVALID_HASH};
}
#[allow(non_snake_case)]
pub mod Definition {
    pub mod chunk;
    pub mod file;
    pub mod function_table;
    pub mod string_table;
    pub mod struct_table;
    pub mod type_table;
    pub mod writer;
    pub use chunk::ChunkContainer;
    pub use file::DefinitionFile;
    pub use function_table::{FunctionDefinition, FunctionParameter, FunctionTable, ParamMode};
    pub use string_table::{StringEntry, StringTable};
    pub use struct_table::{StructDefinition, StructMember, StructTable};
    pub use type_table::{TypeEntry, TypeFlags, TypeTable};
    pub use writer::DefinitionWriter;
}
#[allow(non_snake_case)]
pub mod Registry {
    pub mod builtin;
    pub mod declarations;
    pub mod lookup;
    pub mod registry;
    pub use declarations::{Declarations, FunctionDecl, StructDecl, TypeDecl};
    pub use lookup::SymbolLookup;
    pub use registry::SymbolRegistry;
}
#[allow(non_snake_case)]
pub mod Codec {
    pub mod call;
    pub mod decode;
    pub mod parameter;
    pub mod value;
    pub use call::{CallBuilder, ParameterBuffer};
    pub use decode::{decode_for_display, DecodeReport};
    pub use parameter::ParameterData;
    pub use value::{Value, WireScalar};
}
#[allow(non_snake_case)]
pub mod Network {
    pub mod builder;
    pub mod double_buffer;
    pub mod engine;
    pub mod message;
    pub mod queue;
    pub mod thread;
    pub mod transport;
    pub use builder::{EngineBuilder, EngineConfig};
    pub use double_buffer::NetworkQueues;
    pub use engine::{ConnectionState, CoreEngine, MessageHandler};
    pub use message::{MessageHeader, ReceivedItem, SendItem};
    pub use queue::RingQueue;
    pub use transport::{TcpTransport, Transport};
}
#[allow(non_snake_case)]
pub mod Debug {
    pub mod TableDebug;
}
