use super::*;

impl CoreEngine {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The symbols calls are checked against. Replaced by a registry over the
    /// definition file once it has been received.
    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    pub fn queues(&self) -> &NetworkQueues {
        &self.queues
    }

    /// Hash of the connect payload, once one has been sent.
    pub fn connect_hash(&self) -> Option<Hash> {
        self.connect_hash
    }

    pub fn is_network_running(&self) -> bool {
        self.network.as_ref().map_or(false, NetworkThread::is_running)
    }

    pub fn num_handlers(&self) -> usize {
        self.handlers.len()
    }

    pub fn handler_types(&self) -> Vec<u16> {
        self.handlers.iter().map(|entry| entry.message_type).collect()
    }
}
