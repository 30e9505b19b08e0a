use super::message::{ReceivedItem, SendItem};
use super::queue::RingQueue;
use crate::Core::{QueueRejected, Result};
use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct QueueState {
    send: [RingQueue<SendItem>; 2],
    recv: [RingQueue<ReceivedItem>; 2],
    /// Index of the buffers the network thread works on; `1 - active` belongs to the application.
    active: usize,
    /// The network thread holds a popped send item it has not finished writing.
    send_in_flight: bool,
}

impl QueueState {
    fn send_drained(&self) -> bool {
        self.send[self.active].is_empty() && !self.send_in_flight
    }
}

/// The two pairs of ring buffers shared by the application and network threads.
///
/// ### Roles:
/// - The application adds to its *request* send buffer and pops from its
///   *request* receive buffer.
/// - The network thread pops from the *active* send buffer and adds to the
///   *active* receive buffer.
/// - [`swap`](NetworkQueues::swap) exchanges the roles of both pairs at once.
///
/// Every operation takes the one mutex for a single O(1) step, so hold time does
/// not depend on queue depth.
pub struct NetworkQueues {
    state: Mutex<QueueState>,
    send_drained: Condvar,
    capacity: usize,
    sent: CachePadded<AtomicU64>,
    received: CachePadded<AtomicU64>,
}

impl NetworkQueues {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            state: Mutex::new(QueueState {
                send: [RingQueue::new(capacity)?, RingQueue::new(capacity)?],
                recv: [RingQueue::new(capacity)?, RingQueue::new(capacity)?],
                active: 0,
                send_in_flight: false,
            }),
            send_drained: Condvar::new(),
            capacity,
            sent: CachePadded::new(AtomicU64::new(0)),
            received: CachePadded::new(AtomicU64::new(0)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // --- application side ----------------------------------------------------

    /// Queues `item` for the next swap.
    pub fn add_send_item(&self, item: SendItem) -> std::result::Result<(), QueueRejected<SendItem>> {
        let mut state = self.state.lock();
        let request = 1 - state.active;
        state.send[request].add(item)
    }

    pub fn pop_received(&self) -> Result<Option<ReceivedItem>> {
        let mut state = self.state.lock();
        let request = 1 - state.active;
        state.recv[request].pop()
    }

    /// Blocks until the network thread has written everything in its active
    /// send buffer, or `timeout` passes.
    ///
    /// # Returns
    /// `true` if the buffer drained.
    pub fn wait_for_send_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.send_drained() {
            if self.send_drained.wait_until(&mut state, deadline).timed_out() {
                return state.send_drained();
            }
        }
        true
    }

    /// Exchanges the active and request buffers of both directions.
    pub fn swap(&self) {
        let mut state = self.state.lock();
        state.active = 1 - state.active;
    }

    /// Items waiting in the application's request send buffer.
    pub fn pending_sends(&self) -> usize {
        let state = self.state.lock();
        state.send[1 - state.active].len()
    }

    // --- network side --------------------------------------------------------

    /// Takes the next item to write. The item counts as in flight until
    /// [`send_complete`](NetworkQueues::send_complete).
    pub fn pop_send_item(&self) -> Result<Option<SendItem>> {
        let mut state = self.state.lock();
        let active = state.active;
        let item = state.send[active].pop()?;
        state.send_in_flight = item.is_some();
        Ok(item)
    }

    pub fn send_complete(&self) {
        let mut state = self.state.lock();
        state.send_in_flight = false;
        self.sent.fetch_add(1, Ordering::Relaxed);
        if state.send_drained() {
            self.send_drained.notify_all();
        }
    }

    pub fn add_received(&self, item: ReceivedItem) -> std::result::Result<(), QueueRejected<ReceivedItem>> {
        let mut state = self.state.lock();
        let active = state.active;
        state.recv[active].add(item)?;
        self.received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Wakes any waiter; used when the network thread stops with items unsent.
    pub(crate) fn wake_waiters(&self) {
        self.send_drained.notify_all();
    }

    pub fn messages_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}
