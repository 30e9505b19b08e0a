use les_rpc::Codec::{decode_for_display, ParameterData};
use les_rpc::Core::endian::read_u32_be;
use les_rpc::Core::{hash_case_sensitive, LesError, Result};
use les_rpc::Debug::TableDebug;
use les_rpc::Definition::DefinitionWriter;
use les_rpc::Network::message::{
    FrameDecoder, ReceivedItem, SendItem, CONNECT_ID, RECV_CONNECT_RESPONSE, RECV_DEFINITION_FILE_RESPONSE, RECV_TEST,
    SEND_CONNECT, SEND_DEFINITION_FILE_REQUEST, SEND_FUNCTION_CALL, SEND_TEST,
};
use les_rpc::Network::transport::{RecvStatus, SendStatus};
use les_rpc::Network::{EngineConfig, TcpTransport, Transport};
use les_rpc::Registry::{Declarations, FunctionDecl, StructDecl, SymbolLookup, SymbolRegistry, TypeDecl};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn declarations() -> Declarations {
    Declarations::with_builtin_types()
        .with_type(TypeDecl::structure("Vec2", 8))
        .with_type(TypeDecl::struct_pointer("Vec2"))
        .with_struct(StructDecl::new("Vec2").member("float", "x").member("float", "y"))
        .with_function(
            FunctionDecl::new("jakeInit", "void")
                .input("int", "a")
                .input("short", "b")
                .output("float*", "r"),
        )
        .with_function(FunctionDecl::new("moveTo", "void").input("Vec2", "position"))
}

fn send(transport: &mut TcpTransport, item: SendItem) -> Result<()> {
    let mut written = 0;
    while written < item.message_size() {
        match transport.try_send(&item.wire_bytes()[written..])? {
            SendStatus::Sent(n) => written += n,
            SendStatus::WouldBlock => std::thread::sleep(Duration::from_millis(1)),
        }
    }
    item.release();
    Ok(())
}

fn handle(transport: &mut TcpTransport, registry: &SymbolRegistry, definition: &[u8], item: ReceivedItem) -> Result<()> {
    match item.header.message_type {
        SEND_CONNECT => {
            let hash = hash_case_sensitive(&String::from_utf8_lossy(&item.payload));
            info!("connect from client, hash 0x{hash:08X}");
            send(transport, SendItem::new(RECV_CONNECT_RESPONSE, CONNECT_ID, &hash.to_be_bytes())?)?;
            send(transport, SendItem::new(RECV_TEST, 1, b"hello from the server")?)
        }
        SEND_DEFINITION_FILE_REQUEST => {
            info!("serving definition file ({} bytes)", definition.len());
            send(transport, SendItem::new(RECV_DEFINITION_FILE_RESPONSE, item.header.id, definition)?)
        }
        SEND_FUNCTION_CALL => {
            let hash = read_u32_be(&item.payload, 0)
                .ok_or_else(|| LesError::Protocol("call payload has no function hash".to_string()))?;
            let function = registry
                .function_by_hash(hash)
                .ok_or_else(|| LesError::SymbolNotFound(format!("function 0x{hash:08X}")))?;
            let mut data = ParameterData::from_bytes(item.payload[4..].to_vec());
            let report = decode_for_display(registry, &function, &mut data);
            if !report.is_clean() {
                warn!("call {} decoded with errors: {:?}", item.header.id, report.errors);
            }
            Ok(())
        }
        SEND_TEST => {
            info!("test from client: {}", String::from_utf8_lossy(&item.payload));
            Ok(())
        }
        other => {
            warn!("unknown message type 0x{other:X}");
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env()?;
    let mut registry = SymbolRegistry::new();
    declarations().register_into(&mut registry)?;
    let definition = DefinitionWriter::write(&registry)?;
    TableDebug::log_functions(&registry);

    let keep_alive = Arc::new(AtomicBool::new(true));
    let k = keep_alive.clone();
    ctrlc::set_handler(move || {
        k.store(false, Ordering::SeqCst);
    })
    .map_err(|err| LesError::Protocol(format!("failed to set ctrl-c handler: {err}")))?;

    let listener = TcpListener::bind((config.host.as_str(), config.port))?;
    info!("Server: listening on {}:{}", config.host, config.port);
    let (stream, peer) = listener.accept()?;
    info!("Server: client {peer} connected");

    let mut transport = TcpTransport::from_stream(stream, Duration::from_millis(50))?;
    let mut decoder = FrameDecoder::new(config.max_payload);
    let mut buffer = vec![0u8; config.recv_buffer_size];

    while keep_alive.load(Ordering::SeqCst) {
        match transport.try_recv(&mut buffer) {
            Ok(RecvStatus::Read(n)) => decoder.push(&buffer[..n]),
            Ok(RecvStatus::NoData) => continue,
            Err(err) => {
                info!("Server: client gone ({err})");
                break;
            }
        }
        while let Some(item) = decoder.next_frame()? {
            if let Err(err) = handle(&mut transport, &registry, &definition, item) {
                warn!("Server: {err}");
            }
        }
    }

    info!("Server: shutting down");
    Ok(())
}
