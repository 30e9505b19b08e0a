use super::engine::CoreEngine;
use super::transport::{TcpTransport, Transport};
use crate::Core::{LesError, Result};
use crate::Registry::Declarations;
use std::time::Duration;

/// Connection and queue settings for a [`CoreEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    /// Slots per ring buffer; must be a power of two.
    pub queue_capacity: usize,
    /// Bounded wait of a single transport read on the network thread.
    pub recv_timeout: Duration,
    /// How long a tick waits for the network thread to drain its send buffer.
    pub send_drain_wait: Duration,
    pub recv_buffer_size: usize,
    /// Frames declaring a larger payload stop the network thread.
    pub max_payload: usize,
    pub request_definition_file: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3141,
            queue_capacity: 64,
            recv_timeout: Duration::from_millis(10),
            send_drain_wait: Duration::from_millis(100),
            recv_buffer_size: 4096,
            max_payload: 16 * 1024 * 1024, // 16MiB
            request_definition_file: true,
        }
    }
}

impl EngineConfig {
    /// Defaults, overlaid with `LES_HOST` and `LES_PORT` when they are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("LES_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("LES_PORT") {
            config.port = port
                .parse()
                .map_err(|_| LesError::Protocol(format!("LES_PORT '{port}' is not a port number")))?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(LesError::Protocol("host is empty".to_string()));
        }
        if self.queue_capacity == 0 || !self.queue_capacity.is_power_of_two() {
            return Err(LesError::Protocol(format!(
                "queue capacity must be a non-zero power of two, got {}",
                self.queue_capacity
            )));
        }
        if self.recv_timeout.is_zero() {
            // a zero read timeout is rejected by the socket layer
            return Err(LesError::Protocol("receive timeout must be non-zero".to_string()));
        }
        if self.recv_buffer_size == 0 {
            return Err(LesError::Protocol("receive buffer size must be non-zero".to_string()));
        }
        Ok(())
    }
}

pub struct EngineBuilder {
    config: EngineConfig,
    declarations: Declarations,
    transport: Option<Box<dyn Transport>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            declarations: Declarations::with_builtin_types(),
            transport: None,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.config.host = host.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.config.recv_timeout = timeout;
        self
    }

    pub fn with_send_drain_wait(mut self, wait: Duration) -> Self {
        self.config.send_drain_wait = wait;
        self
    }

    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    pub fn with_max_payload(mut self, size: usize) -> Self {
        self.config.max_payload = size;
        self
    }

    pub fn with_definition_request(mut self, request: bool) -> Self {
        self.config.request_definition_file = request;
        self
    }

    /// Symbols the application declares. They are registered at build time and
    /// replayed against the definition file once it arrives.
    pub fn with_declarations(mut self, declarations: Declarations) -> Self {
        self.declarations = declarations;
        self
    }

    /// Uses `transport` instead of a [`TcpTransport`]. Its `connect` is still
    /// called from `Boot` with the configured host and port.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// # Returns
    /// An engine in `Boot`; the first [`tick`](CoreEngine::tick) connects.
    pub fn build(self) -> Result<CoreEngine> {
        self.config.validate()?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Box::new(TcpTransport::new(self.config.recv_timeout)),
        };
        CoreEngine::new(self.config, self.declarations, transport)
    }
}
