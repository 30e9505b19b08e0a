use thiserror::Error;

/// Problems found while loading or settling a definition file.
///
/// All of these are fatal at load time: a snapshot that reports one of them
/// is dropped and never becomes visible to the registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("truncated {what}: need {needed} bytes at offset {offset}, blob has {len}")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("{what} offset {offset} is outside the blob (len {len})")]
    BadOffset {
        what: &'static str,
        offset: i64,
        len: usize,
    },

    #[error("bad magic {found:?}, expected {expected:?}")]
    BadMagic { found: [u8; 4], expected: [u8; 4] },

    #[error("bad chunk count {found}, expected {expected}")]
    BadChunkCount { found: u32, expected: u32 },

    #[error("{table} table is already settled")]
    AlreadySettled { table: &'static str },

    #[error("alias chain starting at type 0x{hash:X} exceeds {hops} hops")]
    AliasCycle { hash: u32, hops: usize },

    #[error("string {index} is not valid NUL-terminated UTF-8")]
    InvalidText { index: usize },

    #[error("corrupt definition: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum LesError {
    #[error("malformed definition file: {0}")]
    MalformedDefinitionFile(#[from] DefinitionError),

    #[error("symbol conflict for '{name}': {reason}")]
    SymbolConflict { name: String, reason: String },

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("parameter mismatch in '{function}': {reason}")]
    ParameterMismatch { function: String, reason: String },

    #[error("queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("queue inconsistent: head {head} tail {tail} count {count}")]
    QueueInconsistent { head: usize, tail: usize, count: usize },

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl LesError {
    pub(crate) fn conflict(name: &str, reason: impl Into<String>) -> Self {
        LesError::SymbolConflict {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(function: &str, reason: impl Into<String>) -> Self {
        LesError::ParameterMismatch {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LesError>;

/// Why a ring queue refused an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueErrorKind {
    Full,
    WrapAround,
}

/// A rejected `add`: hands the item back so the caller can retry or drop it.
#[derive(Debug)]
pub struct QueueRejected<T> {
    pub kind: QueueErrorKind,
    pub item: T,
    pub(crate) capacity: usize,
    pub(crate) head: usize,
    pub(crate) tail: usize,
    pub(crate) count: usize,
}

impl<T> QueueRejected<T> {
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> From<QueueRejected<T>> for LesError {
    fn from(rejected: QueueRejected<T>) -> Self {
        match rejected.kind {
            QueueErrorKind::Full => LesError::QueueFull {
                capacity: rejected.capacity,
            },
            QueueErrorKind::WrapAround => LesError::QueueInconsistent {
                head: rejected.head,
                tail: rejected.tail,
                count: rejected.count,
            },
        }
    }
}
