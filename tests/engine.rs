use les_rpc::Core::{hash_case_sensitive, LesError};
use les_rpc::Definition::DefinitionWriter;
use les_rpc::Network::message::{
    FrameDecoder, ReceivedItem, SendItem, CONNECT_ID, RECV_CONNECT_RESPONSE, RECV_DEFINITION_FILE_RESPONSE, RECV_TEST,
    SEND_CONNECT, SEND_DEFINITION_FILE_REQUEST, SEND_FUNCTION_CALL, SEND_TEST,
};
use les_rpc::Network::transport::{RecvStatus, SendStatus};
use les_rpc::Network::{ConnectionState, CoreEngine, EngineBuilder, EngineConfig, TcpTransport, Transport};
use les_rpc::Registry::{Declarations, FunctionDecl, SymbolRegistry};
use parking_lot::Mutex;
use serial_test::serial;
use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const CUSTOM_TYPE: u16 = 0x77;

fn declarations() -> Declarations {
    Declarations::with_builtin_types().with_function(
        FunctionDecl::new("jakeInit", "void")
            .input("int", "a")
            .input("short", "b")
            .output("float*", "r"),
    )
}

fn definition_bytes() -> Vec<u8> {
    let mut registry = SymbolRegistry::new();
    declarations().register_into(&mut registry).unwrap();
    DefinitionWriter::write(&registry).unwrap()
}

#[derive(Clone, Default)]
struct Peer {
    corrupt_hash: bool,
    close_immediately: bool,
    custom_after_connect: bool,
}

fn send(transport: &mut TcpTransport, item: SendItem) {
    let mut written = 0;
    while written < item.message_size() {
        match transport.try_send(&item.wire_bytes()[written..]) {
            Ok(SendStatus::Sent(n)) => written += n,
            Ok(SendStatus::WouldBlock) => thread::sleep(Duration::from_millis(1)),
            Err(_) => return,
        }
    }
    item.release();
}

fn respond(transport: &mut TcpTransport, peer: &Peer, definition: &[u8], frame: &ReceivedItem) {
    match frame.header.message_type {
        SEND_CONNECT => {
            let text = std::str::from_utf8(&frame.payload).unwrap();
            let mut hash = hash_case_sensitive(text);
            if peer.corrupt_hash {
                hash = hash.wrapping_add(1);
            }
            send(transport, SendItem::new(RECV_CONNECT_RESPONSE, CONNECT_ID, &hash.to_be_bytes()).unwrap());
            send(transport, SendItem::new(RECV_TEST, 1, b"welcome").unwrap());
            if peer.custom_after_connect {
                send(transport, SendItem::new(CUSTOM_TYPE, 5, b"custom").unwrap());
            }
        }
        SEND_DEFINITION_FILE_REQUEST => {
            send(transport, SendItem::new(RECV_DEFINITION_FILE_RESPONSE, 0, definition).unwrap());
        }
        _ => {}
    }
}

/// Accepts one client on a loopback port and answers the handshake.
/// Every frame it receives is forwarded on the returned channel.
fn spawn_peer(peer: Peer) -> (u16, Receiver<ReceivedItem>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx): (Sender<ReceivedItem>, Receiver<ReceivedItem>) = mpsc::channel();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        if peer.close_immediately {
            return;
        }
        let definition = definition_bytes();
        let mut transport = TcpTransport::from_stream(stream, Duration::from_millis(20)).unwrap();
        let mut decoder = FrameDecoder::new(1 << 20);
        let mut buffer = vec![0u8; 1024];
        loop {
            match transport.try_recv(&mut buffer) {
                Ok(RecvStatus::Read(n)) => decoder.push(&buffer[..n]),
                Ok(RecvStatus::NoData) => continue,
                Err(_) => break,
            }
            while let Ok(Some(frame)) = decoder.next_frame() {
                respond(&mut transport, &peer, &definition, &frame);
                if tx.send(frame).is_err() {
                    return;
                }
            }
        }
    });
    (port, rx, handle)
}

fn engine_for(port: u16, request_definition_file: bool) -> CoreEngine {
    EngineBuilder::new()
        .with_port(port)
        .with_declarations(declarations())
        .with_definition_request(request_definition_file)
        .build()
        .unwrap()
}

fn tick_until(engine: &mut CoreEngine, target: ConnectionState) -> Vec<ConnectionState> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = vec![engine.state()];
    while engine.state() != target {
        assert!(Instant::now() < deadline, "stuck in {}", engine.state());
        let state = engine.tick().unwrap();
        if seen.last() != Some(&state) {
            seen.push(state);
        }
        thread::sleep(Duration::from_millis(2));
    }
    seen
}

fn next_frame_of(engine: &mut CoreEngine, frames: &Receiver<ReceivedItem>, message_type: u16) -> ReceivedItem {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        assert!(Instant::now() < deadline, "no frame of type 0x{message_type:X}");
        engine.tick().unwrap();
        while let Ok(frame) = frames.try_recv() {
            if frame.header.message_type == message_type {
                return frame;
            }
        }
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn config_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 3141);
    assert_eq!(config.queue_capacity, 64);
    assert_eq!(config.recv_timeout, Duration::from_millis(10));
    assert_eq!(config.send_drain_wait, Duration::from_millis(100));
    assert!(config.request_definition_file);
    assert!(config.validate().is_ok());
}

#[test]
fn builder_rejects_bad_queue_capacity() {
    assert!(EngineBuilder::new().with_queue_capacity(48).build().is_err());
    assert!(EngineBuilder::new().with_queue_capacity(0).build().is_err());
    assert!(EngineBuilder::new().with_recv_timeout(Duration::ZERO).build().is_err());
}

#[test]
#[serial]
fn config_reads_host_and_port_from_env() {
    std::env::set_var("LES_HOST", "localhost");
    std::env::set_var("LES_PORT", "4242");
    let config = EngineConfig::from_env().unwrap();
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 4242);

    std::env::set_var("LES_PORT", "not-a-port");
    assert!(EngineConfig::from_env().is_err());
    std::env::remove_var("LES_HOST");
    std::env::remove_var("LES_PORT");
}

#[test]
fn new_engine_starts_in_boot_with_calls_disabled() {
    let engine = EngineBuilder::new().build().unwrap();
    assert_eq!(engine.state(), ConnectionState::Boot);
    assert!(!engine.is_network_running());
    assert!(matches!(engine.start_call("jakeInit", "void"), Err(LesError::Protocol(_))));
}

#[test]
fn duplicate_handlers_are_rejected() {
    let mut engine = EngineBuilder::new().build().unwrap();
    let builtin = engine.num_handlers();
    assert!(matches!(
        engine.register_handler(RECV_TEST, |_| Ok(())),
        Err(LesError::SymbolConflict { .. })
    ));
    engine.register_handler(CUSTOM_TYPE, |_| Ok(())).unwrap();
    assert!(engine.register_handler(CUSTOM_TYPE, |_| Ok(())).is_err());
    assert_eq!(engine.num_handlers(), builtin + 1);
}

#[test]
#[serial]
fn handshake_and_definition_file_reach_ready() {
    let (port, frames, peer) = spawn_peer(Peer::default());
    let mut engine = engine_for(port, true);

    let seen = tick_until(&mut engine, ConnectionState::Ready);
    assert_eq!(
        seen,
        vec![
            ConnectionState::Boot,
            ConnectionState::NotConnected,
            ConnectionState::WaitingForConnectResponse,
            ConnectionState::Connected,
            ConnectionState::WaitingForDefinitionFileResponse,
            ConnectionState::Ready,
        ]
    );

    let connect = frames.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(connect.header.message_type, SEND_CONNECT);
    assert_eq!(connect.header.id, CONNECT_ID);
    assert_eq!(connect.payload.len(), 16);
    assert!(connect.payload.iter().all(u8::is_ascii_alphanumeric));
    let text = std::str::from_utf8(&connect.payload).unwrap();
    assert_eq!(engine.connect_hash(), Some(hash_case_sensitive(text)));

    let registry = engine.registry();
    assert!(registry.definition_file().is_some());
    assert_eq!(registry.num_local_symbols(), 0);
    assert!(registry.function_by_name("jakeInit").is_some());

    drop(engine);
    peer.join().unwrap();
}

#[test]
#[serial]
fn calls_are_framed_with_the_function_hash() {
    let (port, frames, peer) = spawn_peer(Peer::default());
    let mut engine = engine_for(port, true);
    tick_until(&mut engine, ConnectionState::Ready);

    let r = 0.0f32;
    let call = {
        let mut builder = engine.start_call("jakeInit", "void").unwrap();
        builder
            .add_input("a", 666i32)
            .unwrap()
            .add_input("b", 123i16)
            .unwrap()
            .add_output("r", &r)
            .unwrap();
        builder.finish().unwrap()
    };
    engine.send_call(42, &call).unwrap();

    let frame = next_frame_of(&mut engine, &frames, SEND_FUNCTION_CALL);
    assert_eq!(frame.header.id, 42);
    assert_eq!(frame.header.payload_size, 14);
    assert_eq!(&frame.payload[..4], &hash_case_sensitive("jakeInit").to_be_bytes());
    assert_eq!(&frame.payload[4..], &call.bytes[..]);

    engine.send_test(9, "ping").unwrap();
    let test = next_frame_of(&mut engine, &frames, SEND_TEST);
    assert_eq!(test.header.id, 9);
    assert_eq!(test.payload, b"ping".to_vec());

    drop(engine);
    peer.join().unwrap();
}

#[test]
#[serial]
fn tampered_call_buffer_is_not_sent() {
    let (port, _frames, peer) = spawn_peer(Peer::default());
    let mut engine = engine_for(port, true);
    tick_until(&mut engine, ConnectionState::Ready);

    let mut call = {
        let mut builder = engine.start_call("jakeInit", "void").unwrap();
        builder.add_input("a", 1i32).unwrap().add_input("b", 2i16).unwrap().add_output("r", &0.0f32).unwrap();
        builder.finish().unwrap()
    };
    call.bytes.pop();
    assert!(matches!(engine.send_call(1, &call), Err(LesError::ParameterMismatch { .. })));
    assert_eq!(engine.queues().pending_sends(), 0);

    drop(engine);
    peer.join().unwrap();
}

#[test]
#[serial]
fn skipping_the_definition_file_goes_straight_to_ready() {
    let (port, _frames, peer) = spawn_peer(Peer::default());
    let mut engine = engine_for(port, false);
    let seen = tick_until(&mut engine, ConnectionState::Ready);
    assert_eq!(seen[seen.len() - 2], ConnectionState::Connected);
    assert!(engine.registry().definition_file().is_none());

    drop(engine);
    peer.join().unwrap();
}

#[test]
#[serial]
fn wrong_connect_hash_keeps_waiting() {
    let peer_config = Peer {
        corrupt_hash: true,
        ..Peer::default()
    };
    let (port, _frames, peer) = spawn_peer(peer_config);
    let mut engine = engine_for(port, true);

    let deadline = Instant::now() + Duration::from_secs(5);
    let err = loop {
        assert!(Instant::now() < deadline, "connect response never rejected");
        match engine.tick() {
            Ok(_) => thread::sleep(Duration::from_millis(2)),
            Err(err) => break err,
        }
    };
    assert!(matches!(err, LesError::Protocol(_)));
    assert_eq!(engine.state(), ConnectionState::WaitingForConnectResponse);

    for _ in 0..5 {
        engine.tick().unwrap();
    }
    assert_eq!(engine.state(), ConnectionState::WaitingForConnectResponse);

    drop(engine);
    peer.join().unwrap();
}

#[test]
#[serial]
fn custom_handlers_receive_their_messages() {
    let peer_config = Peer {
        custom_after_connect: true,
        ..Peer::default()
    };
    let (port, _frames, peer) = spawn_peer(peer_config);
    let mut engine = engine_for(port, false);

    let payloads = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&payloads);
    engine
        .register_handler(CUSTOM_TYPE, move |item| {
            sink.lock().push((item.header.id, item.payload.clone()));
            Ok(())
        })
        .unwrap();

    tick_until(&mut engine, ConnectionState::Ready);
    let deadline = Instant::now() + Duration::from_secs(5);
    while payloads.lock().is_empty() {
        assert!(Instant::now() < deadline, "custom handler never ran");
        engine.tick().unwrap();
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(payloads.lock()[0], (5, b"custom".to_vec()));

    drop(engine);
    peer.join().unwrap();
}

#[test]
#[serial]
fn refused_connection_stays_in_boot() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut engine = engine_for(port, true);
    assert!(matches!(engine.tick(), Err(LesError::Transport(_))));
    assert_eq!(engine.state(), ConnectionState::Boot);
    assert!(matches!(engine.tick(), Err(LesError::Transport(_))));
    assert_eq!(engine.state(), ConnectionState::Boot);
}

#[test]
#[serial]
fn peer_disconnect_halts_the_state_machine() {
    let peer_config = Peer {
        close_immediately: true,
        ..Peer::default()
    };
    let (port, _frames, peer) = spawn_peer(peer_config);
    let mut engine = engine_for(port, true);
    assert_eq!(engine.tick().unwrap(), ConnectionState::NotConnected);
    peer.join().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let err = loop {
        assert!(Instant::now() < deadline, "disconnect never surfaced");
        match engine.tick() {
            Ok(_) => thread::sleep(Duration::from_millis(2)),
            Err(err) => break err,
        }
    };
    assert!(matches!(err, LesError::Transport(_)));
    let halted = engine.state();
    assert_ne!(halted, ConnectionState::Ready);

    assert!(matches!(engine.tick(), Err(LesError::Transport(_))));
    assert_eq!(engine.state(), halted);
}
