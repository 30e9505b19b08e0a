use super::double_buffer::NetworkQueues;
use super::message::{FrameDecoder, ReceivedItem, SendItem};
use super::transport::{RecvStatus, SendStatus, Transport};
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Failure recorded by the network thread before it exits.
#[derive(Debug, Clone)]
pub struct NetworkFailure {
    pub kind: io::ErrorKind,
    pub message: String,
}

impl From<NetworkFailure> for io::Error {
    fn from(failure: NetworkFailure) -> io::Error {
        io::Error::new(failure.kind, failure.message)
    }
}

struct Shared {
    queues: Arc<NetworkQueues>,
    keep_alive: CachePadded<AtomicBool>,
    failure: Mutex<Option<NetworkFailure>>,
}

/// Handle to the network I/O thread.
///
/// The thread owns the transport. It writes items from the active send buffer,
/// reads frames into the active receive buffer, and checks its stop flag between
/// each bounded-wait read. Dropping the handle stops and joins the thread.
pub struct NetworkThread {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl NetworkThread {
    pub fn spawn<T: Transport + 'static>(
        transport: T,
        queues: Arc<NetworkQueues>,
        recv_buffer_size: usize,
        max_payload: usize,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            queues,
            keep_alive: CachePadded::new(AtomicBool::new(true)),
            failure: Mutex::new(None),
        });
        let worker = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("les-network".to_string())
            .spawn(move || {
                let mut worker_loop = Worker {
                    transport,
                    shared: &worker,
                    decoder: FrameDecoder::new(max_payload),
                    recv_buffer: vec![0u8; recv_buffer_size.max(1)],
                    in_flight: None,
                    held: None,
                };
                worker_loop.run();
            })?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// The error that stopped the thread, if any. Clears it.
    pub fn take_failure(&self) -> Option<NetworkFailure> {
        self.shared.failure.lock().take()
    }

    pub fn keep_alive(&self) -> &AtomicBool {
        &self.shared.keep_alive
    }

    /// Signals the thread to stop and waits for it.
    pub fn shutdown(&mut self) {
        self.shared.keep_alive.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("network thread panicked");
            }
        }
    }
}

impl Drop for NetworkThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker<'s, T: Transport> {
    transport: T,
    shared: &'s Shared,
    decoder: FrameDecoder,
    recv_buffer: Vec<u8>,
    /// Item being written and how many of its bytes are out.
    in_flight: Option<(SendItem, usize)>,
    /// Received frame waiting for room in the receive buffer.
    held: Option<ReceivedItem>,
}

impl<T: Transport> Worker<'_, T> {
    fn run(&mut self) {
        info!("network thread started");
        while self.shared.keep_alive.load(Ordering::SeqCst) {
            if let Err(err) = self.step() {
                error!("network thread stopping: {err}");
                *self.shared.failure.lock() = Some(NetworkFailure {
                    kind: err.kind(),
                    message: err.to_string(),
                });
                break;
            }
        }
        if self.in_flight.take().is_some() {
            warn!("network thread stopped with a message partially sent");
        }
        self.shared.queues.wake_waiters();
        info!("network thread stopped");
    }

    fn step(&mut self) -> io::Result<()> {
        self.send_pending()?;
        self.deliver_held();
        // frames already buffered go out before anything new is read
        if self.held.is_none() {
            self.drain_decoder()?;
        }
        if self.held.is_none() {
            self.receive()?;
        } else {
            // receive side is backed up; let the application catch up
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        Ok(())
    }

    /// Writes as much of the active send buffer as the transport takes without blocking.
    fn send_pending(&mut self) -> io::Result<()> {
        let queues = &self.shared.queues;
        loop {
            if self.in_flight.is_none() {
                match queues.pop_send_item() {
                    Ok(Some(item)) => self.in_flight = Some((item, 0)),
                    Ok(None) => return Ok(()),
                    Err(err) => return Err(io::Error::new(io::ErrorKind::Other, err.to_string())),
                }
            }
            let Some((item, offset)) = self.in_flight.as_mut() else {
                return Ok(());
            };
            match self.transport.try_send(&item.wire_bytes()[*offset..])? {
                SendStatus::Sent(n) => *offset += n,
                SendStatus::WouldBlock => return Ok(()),
            }
            if *offset >= item.message_size() {
                if let Some((item, _)) = self.in_flight.take() {
                    debug!(message_type = item.header().message_type, id = item.header().id, "sent");
                    item.release();
                }
                queues.send_complete();
            }
        }
    }

    fn receive(&mut self) -> io::Result<()> {
        let read = match self.transport.try_recv(&mut self.recv_buffer)? {
            RecvStatus::Read(n) => n,
            RecvStatus::NoData => return Ok(()),
        };
        self.decoder.push(&self.recv_buffer[..read]);
        self.drain_decoder()
    }

    /// Moves complete frames from the decoder into the receive buffer until
    /// the decoder runs dry or a frame has to be held.
    fn drain_decoder(&mut self) -> io::Result<()> {
        while self.held.is_none() {
            let frame = self
                .decoder
                .next_frame()
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
            let Some(frame) = frame else {
                break;
            };
            debug!(message_type = frame.header.message_type, id = frame.header.id, "received");
            self.held = Some(frame);
            self.deliver_held();
        }
        Ok(())
    }

    fn deliver_held(&mut self) {
        if let Some(item) = self.held.take() {
            if let Err(rejected) = self.shared.queues.add_received(item) {
                self.held = Some(rejected.into_inner());
            }
        }
    }
}
