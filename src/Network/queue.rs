use crate::Core::error::{QueueErrorKind, QueueRejected};
use crate::Core::{LesError, Result};

/// Fixed-capacity FIFO ring of owned items.
///
/// ### Ownership:
/// - `add` moves the item into its slot; a rejected item is handed back inside
///   the [`QueueRejected`] error.
/// - `pop` moves the item out again; the caller is then responsible for it.
///
/// Not synchronised on its own: [`NetworkQueues`](super::NetworkQueues) wraps
/// every access in its mutex.
pub struct RingQueue<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    num_items: usize,
    /// `capacity - 1`; capacity is a power of two.
    mask: usize,
}

impl<T> RingQueue<T> {
    /// # Arguments
    /// * `capacity` - number of slots, a non-zero power of two
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || (capacity & (capacity - 1)) != 0 {
            return Err(LesError::Protocol(format!(
                "queue capacity must be a non-zero power of two, got {capacity}"
            )));
        }
        Ok(Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            num_items: 0,
            mask: capacity - 1,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    fn rejected(&self, kind: QueueErrorKind, item: T) -> QueueRejected<T> {
        QueueRejected {
            kind,
            item,
            capacity: self.capacity(),
            head: self.head,
            tail: self.tail,
            count: self.num_items,
        }
    }

    /// Appends `item`, leaving the queue untouched on failure.
    pub fn add(&mut self, item: T) -> std::result::Result<(), QueueRejected<T>> {
        if self.num_items >= self.capacity() {
            return Err(self.rejected(QueueErrorKind::Full, item));
        }
        if self.tail == self.head && self.num_items != 0 {
            return Err(self.rejected(QueueErrorKind::WrapAround, item));
        }
        if self.slots[self.tail].is_some() {
            return Err(self.rejected(QueueErrorKind::WrapAround, item));
        }
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) & self.mask;
        self.num_items += 1;
        Ok(())
    }

    /// Oldest item, or `Ok(None)` when empty.
    ///
    /// An empty queue whose head and tail disagree is reported as inconsistent.
    pub fn pop(&mut self) -> Result<Option<T>> {
        if self.num_items == 0 {
            if self.head != self.tail {
                return Err(LesError::QueueInconsistent {
                    head: self.head,
                    tail: self.tail,
                    count: self.num_items,
                });
            }
            return Ok(None);
        }
        let item = self.slots[self.head].take().ok_or(LesError::QueueInconsistent {
            head: self.head,
            tail: self.tail,
            count: self.num_items,
        })?;
        self.head = (self.head + 1) & self.mask;
        self.num_items -= 1;
        Ok(Some(item))
    }
}
