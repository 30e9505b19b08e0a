use super::builder::EngineConfig;
use super::double_buffer::NetworkQueues;
use super::message::{
    ReceivedItem, SendItem, CONNECT_ID, RECV_CONNECT_RESPONSE, RECV_DEFINITION_FILE_RESPONSE, RECV_TEST,
    SEND_CONNECT, SEND_DEFINITION_FILE_REQUEST, SEND_FUNCTION_CALL, SEND_TEST,
};
use super::thread::{NetworkFailure, NetworkThread};
use super::transport::Transport;
use crate::Codec::{CallBuilder, ParameterBuffer};
use crate::Core::endian::read_u32_be;
use crate::Core::{hash_case_sensitive, Hash, LesError, Result};
use crate::Definition::DefinitionFile;
use crate::Registry::{Declarations, SymbolLookup, SymbolRegistry};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

mod debug;
mod getters;

/// Number of random alphanumeric bytes in the connect payload.
pub const CONNECT_PAYLOAD_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Boot,
    NotConnected,
    WaitingForConnectResponse,
    Connected,
    WaitingForDefinitionFileResponse,
    Ready,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Boot => "Boot",
            ConnectionState::NotConnected => "NotConnected",
            ConnectionState::WaitingForConnectResponse => "WaitingForConnectResponse",
            ConnectionState::Connected => "Connected",
            ConnectionState::WaitingForDefinitionFileResponse => "WaitingForDefinitionFileResponse",
            ConnectionState::Ready => "Ready",
        };
        f.write_str(name)
    }
}

/// User handler for one inbound message type.
pub type MessageHandler = Box<dyn FnMut(&ReceivedItem) -> Result<()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    ConnectResponse,
    DefinitionFileResponse,
    Test,
}

enum Handler {
    Builtin(Builtin),
    Custom(MessageHandler),
}

struct HandlerEntry {
    message_type: u16,
    handler: Handler,
}

/// Client side of the protocol: owns the symbol registry, the queues shared
/// with the network thread, and the connection state machine.
///
/// Everything here runs on the application thread. Each [`tick`](CoreEngine::tick)
/// performs the queue protocol (wait for the send buffer to drain, dispatch
/// received messages, swap, dispatch again) and then advances at most one state.
pub struct CoreEngine {
    config: EngineConfig,
    state: ConnectionState,
    declarations: Declarations,
    registry: SymbolRegistry,
    queues: Arc<NetworkQueues>,
    /// Held until `Boot` hands it to the network thread.
    transport: Option<Box<dyn Transport>>,
    network: Option<NetworkThread>,
    failure: Option<NetworkFailure>,
    handlers: Vec<HandlerEntry>,
    connect_hash: Option<Hash>,
    connect_confirmed: bool,
    definition_loaded: bool,
}

impl CoreEngine {
    pub(crate) fn new(
        config: EngineConfig,
        declarations: Declarations,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        let mut registry = SymbolRegistry::new();
        declarations.register_into(&mut registry)?;
        let queues = Arc::new(NetworkQueues::new(config.queue_capacity)?);

        let mut engine = Self {
            config,
            state: ConnectionState::Boot,
            declarations,
            registry,
            queues,
            transport: Some(transport),
            network: None,
            failure: None,
            handlers: Vec::new(),
            connect_hash: None,
            connect_confirmed: false,
            definition_loaded: false,
        };
        engine.add_handler(RECV_CONNECT_RESPONSE, Handler::Builtin(Builtin::ConnectResponse))?;
        engine.add_handler(RECV_DEFINITION_FILE_RESPONSE, Handler::Builtin(Builtin::DefinitionFileResponse))?;
        engine.add_handler(RECV_TEST, Handler::Builtin(Builtin::Test))?;
        Ok(engine)
    }

    /// Registers `handler` for inbound messages of `message_type`.
    ///
    /// # Arguments
    /// * `message_type` - the frame `type` field to match
    /// * `handler` - called with every received item of that type
    ///
    /// # Returns
    /// `SymbolConflict` if the type already has a handler, builtin ones included.
    pub fn register_handler<F>(&mut self, message_type: u16, handler: F) -> Result<()>
    where
        F: FnMut(&ReceivedItem) -> Result<()> + Send + 'static,
    {
        self.add_handler(message_type, Handler::Custom(Box::new(handler)))
    }

    fn add_handler(&mut self, message_type: u16, handler: Handler) -> Result<()> {
        if self.handlers.iter().any(|entry| entry.message_type == message_type) {
            return Err(LesError::conflict(
                &format!("handler 0x{message_type:X}"),
                "a handler for this message type is already registered",
            ));
        }
        debug!("registered handler for message type 0x{message_type:X}");
        self.handlers.push(HandlerEntry { message_type, handler });
        Ok(())
    }

    /// Runs one application tick.
    ///
    /// # Returns
    /// The state after the tick. A transport failure on the network thread is
    /// returned as `Transport` on this and every later tick; the state is left
    /// where it was.
    pub fn tick(&mut self) -> Result<ConnectionState> {
        self.check_network()?;
        if self.network.is_some() {
            self.pump()?;
        }
        self.step()?;
        Ok(self.state)
    }

    fn check_network(&mut self) -> Result<()> {
        if let Some(failure) = self.network.as_ref().and_then(|network| network.take_failure()) {
            error!(state = %self.state, "transport failure: {}", failure.message);
            self.failure = Some(failure);
        }
        match &self.failure {
            Some(failure) => Err(LesError::Transport(failure.clone().into())),
            None => Ok(()),
        }
    }

    fn pump(&mut self) -> Result<()> {
        if !self.queues.wait_for_send_drained(self.config.send_drain_wait) {
            // never swap with an item in flight
            debug!("send buffer still draining, swap skipped");
            return self.drain_received();
        }
        self.drain_received()?;
        self.queues.swap();
        self.drain_received()
    }

    fn drain_received(&mut self) -> Result<()> {
        while let Some(item) = self.queues.pop_received()? {
            self.dispatch(&item)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, item: &ReceivedItem) -> Result<()> {
        let message_type = item.header.message_type;
        let Some(index) = self.handlers.iter().position(|entry| entry.message_type == message_type) else {
            warn!(id = item.header.id, "no handler for message type 0x{message_type:X}, dropped");
            return Ok(());
        };
        if let Handler::Builtin(builtin) = self.handlers[index].handler {
            return self.run_builtin(builtin, item);
        }
        if let Handler::Custom(handler) = &mut self.handlers[index].handler {
            return handler(item);
        }
        Ok(())
    }

    fn run_builtin(&mut self, builtin: Builtin, item: &ReceivedItem) -> Result<()> {
        match builtin {
            Builtin::ConnectResponse => self.on_connect_response(item),
            Builtin::DefinitionFileResponse => self.on_definition_file(item),
            Builtin::Test => {
                info!(id = item.header.id, "test message: {}", String::from_utf8_lossy(&item.payload));
                Ok(())
            }
        }
    }

    fn on_connect_response(&mut self, item: &ReceivedItem) -> Result<()> {
        if self.state != ConnectionState::WaitingForConnectResponse {
            warn!(state = %self.state, "unexpected connect response ignored");
            return Ok(());
        }
        let header = item.header;
        if header.id != CONNECT_ID || header.payload_size != 4 || item.payload.len() != 4 {
            return Err(LesError::Protocol(format!(
                "connect response must be id {CONNECT_ID} with 4 payload bytes, got id {} with {}",
                header.id, header.payload_size
            )));
        }
        let received = read_u32_be(&item.payload, 0)
            .ok_or_else(|| LesError::Protocol("connect response payload is truncated".to_string()))?;
        match self.connect_hash {
            Some(expected) if expected == received => {
                info!("connect hash 0x{received:08X} confirmed");
                self.connect_confirmed = true;
                Ok(())
            }
            expected => Err(LesError::Protocol(format!(
                "connect response hash 0x{received:08X} does not match 0x{:08X}",
                expected.unwrap_or_default()
            ))),
        }
    }

    fn on_definition_file(&mut self, item: &ReceivedItem) -> Result<()> {
        if self.state != ConnectionState::WaitingForDefinitionFileResponse {
            warn!(state = %self.state, "unexpected definition file ignored");
            return Ok(());
        }
        let file = DefinitionFile::load(&item.payload)?;
        let mut registry = SymbolRegistry::with_definition_file(file);
        if let Err(err) = self.declarations.register_into(&mut registry) {
            error!("declarations disagree with the definition file: {err}");
            return Err(err);
        }
        self.registry = registry;
        self.definition_loaded = true;
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Boot => {
                self.boot()?;
                self.transition(ConnectionState::NotConnected);
            }
            ConnectionState::NotConnected => {
                self.send_connect()?;
                self.transition(ConnectionState::WaitingForConnectResponse);
            }
            ConnectionState::WaitingForConnectResponse => {
                if self.connect_confirmed {
                    self.transition(ConnectionState::Connected);
                }
            }
            ConnectionState::Connected => {
                if self.config.request_definition_file {
                    self.enqueue(SendItem::new(SEND_DEFINITION_FILE_REQUEST, 0, &[])?)?;
                    self.transition(ConnectionState::WaitingForDefinitionFileResponse);
                } else {
                    self.transition(ConnectionState::Ready);
                }
            }
            ConnectionState::WaitingForDefinitionFileResponse => {
                if self.definition_loaded {
                    self.transition(ConnectionState::Ready);
                }
            }
            ConnectionState::Ready => {}
        }
        Ok(())
    }

    fn transition(&mut self, next: ConnectionState) {
        info!("state {} -> {}", self.state, next);
        self.state = next;
    }

    fn boot(&mut self) -> Result<()> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| LesError::Protocol("engine has no transport".to_string()))?;
        if let Err(err) = transport.connect(&self.config.host, self.config.port) {
            error!("connect to {}:{} failed: {err}", self.config.host, self.config.port);
            return Err(err.into());
        }
        let transport = self
            .transport
            .take()
            .ok_or_else(|| LesError::Protocol("engine has no transport".to_string()))?;
        self.network = Some(NetworkThread::spawn(
            transport,
            Arc::clone(&self.queues),
            self.config.recv_buffer_size,
            self.config.max_payload,
        )?);
        Ok(())
    }

    fn send_connect(&mut self) -> Result<()> {
        let payload: String = (0..CONNECT_PAYLOAD_LEN).map(|_| fastrand::alphanumeric()).collect();
        let hash = hash_case_sensitive(&payload);
        info!("connecting with hash 0x{hash:08X}");
        self.enqueue(SendItem::new(SEND_CONNECT, CONNECT_ID, payload.as_bytes())?)?;
        self.connect_hash = Some(hash);
        Ok(())
    }

    fn enqueue(&self, item: SendItem) -> Result<()> {
        self.queues.add_send_item(item)?;
        Ok(())
    }

    fn require_ready(&self, what: &str) -> Result<()> {
        if self.state != ConnectionState::Ready {
            return Err(LesError::Protocol(format!("{what} needs state Ready, engine is {}", self.state)));
        }
        Ok(())
    }

    /// Starts marshaling a call to `name`. Only available in `Ready`.
    pub fn start_call(&self, name: &str, return_type: &str) -> Result<CallBuilder<'_, SymbolRegistry>> {
        self.require_ready("start_call")?;
        CallBuilder::start(&self.registry, name, return_type)
    }

    /// Frames `call` as a `FUNCTION_CALL` with the caller's `id` and queues it
    /// for the next swap.
    ///
    /// The buffer is checked against the registry first, so a call that does
    /// not match its definition is never put on the wire.
    pub fn send_call(&mut self, id: u16, call: &ParameterBuffer) -> Result<()> {
        self.require_ready("send_call")?;
        let function = self
            .registry
            .function_by_hash(call.function_hash)
            .ok_or_else(|| LesError::SymbolNotFound(format!("function '{}'", call.function_name)))?;
        let defined_name = self.registry.name_of(function.name_id);
        if defined_name != call.function_name {
            return Err(LesError::SymbolNotFound(format!(
                "function '{}' (hash matches '{defined_name}')",
                call.function_name
            )));
        }
        if call.bytes.len() != function.parameter_data_size as usize {
            return Err(LesError::mismatch(
                &call.function_name,
                format!(
                    "buffer holds {} bytes, definition needs {}",
                    call.bytes.len(),
                    function.parameter_data_size
                ),
            ));
        }

        let mut payload = Vec::with_capacity(4 + call.bytes.len());
        payload.extend_from_slice(&call.function_hash.to_be_bytes());
        payload.extend_from_slice(&call.bytes);
        self.enqueue(SendItem::new(SEND_FUNCTION_CALL, id, &payload)?)?;
        debug!(id, "queued call to {}", call.function_name);
        Ok(())
    }

    /// Sends a `TEST` message carrying `text`. Available once connected.
    pub fn send_test(&mut self, id: u16, text: &str) -> Result<()> {
        if self.network.is_none() {
            return Err(LesError::Protocol(format!("send_test needs a connection, engine is {}", self.state)));
        }
        self.enqueue(SendItem::new(SEND_TEST, id, text.as_bytes())?)
    }

    /// Stops the network thread and waits for it. Queued sends that were not
    /// yet written are dropped.
    pub fn shutdown(&mut self) {
        if let Some(mut network) = self.network.take() {
            network.shutdown();
            info!(
                sent = self.queues.messages_sent(),
                received = self.queues.messages_received(),
                "engine shut down"
            );
        }
    }
}

impl Drop for CoreEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
