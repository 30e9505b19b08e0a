use crate::Core::endian::{read_u16_be, read_u32_be, round_up_4, write_u16_be, write_u32_be};
use crate::Core::{LesError, Result};

/// Size of the big-endian `type, id, payloadSize` header.
pub const HEADER_SIZE: usize = 8;

pub const SEND_CONNECT: u16 = 0x1;
pub const RECV_CONNECT_RESPONSE: u16 = 0x2;
pub const SEND_DEFINITION_FILE_REQUEST: u16 = 0x3;
pub const RECV_DEFINITION_FILE_RESPONSE: u16 = 0x4;
pub const SEND_FUNCTION_CALL: u16 = 0x5;
pub const RECV_TEST: u16 = 0x33;
pub const SEND_TEST: u16 = 0x66;

/// Message id carried by the connect request and its response.
pub const CONNECT_ID: u16 = 234;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: u16,
    pub id: u16,
    pub payload_size: u32,
}

impl MessageHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        write_u16_be(&mut out, 0, self.message_type);
        write_u16_be(&mut out, 2, self.id);
        write_u32_be(&mut out, 4, self.payload_size);
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            message_type: read_u16_be(bytes, 0)?,
            id: read_u16_be(bytes, 2)?,
            payload_size: read_u32_be(bytes, 4)?,
        })
    }
}

/// An outbound framed message.
///
/// Owns its buffer (header plus payload rounded up to four bytes). Ownership
/// moves into the send queue and from there to the network thread, which calls
/// [`release`](SendItem::release) once the bytes are on the transport.
#[derive(Debug)]
pub struct SendItem {
    buffer: Box<[u8]>,
    message_size: usize,
}

impl SendItem {
    pub fn new(message_type: u16, id: u16, payload: &[u8]) -> Result<Self> {
        let payload_size = u32::try_from(payload.len())
            .map_err(|_| LesError::Protocol(format!("payload of {} bytes is too large", payload.len())))?;
        let header = MessageHeader {
            message_type,
            id,
            payload_size,
        };
        let mut buffer = vec![0u8; HEADER_SIZE + round_up_4(payload.len())].into_boxed_slice();
        buffer[..HEADER_SIZE].copy_from_slice(&header.encode());
        buffer[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);
        Ok(Self {
            buffer,
            message_size: HEADER_SIZE + payload.len(),
        })
    }

    /// Bytes that go on the wire: header plus the unpadded payload.
    pub fn wire_bytes(&self) -> &[u8] {
        &self.buffer[..self.message_size]
    }

    pub fn message_size(&self) -> usize {
        self.message_size
    }

    pub fn allocated_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn header(&self) -> MessageHeader {
        // the buffer always starts with an encoded header
        MessageHeader::decode(&self.buffer).unwrap_or(MessageHeader {
            message_type: 0,
            id: 0,
            payload_size: 0,
        })
    }

    /// Frees the buffer. Consumes the item, so it cannot be released twice.
    pub fn release(self) {}
}

/// An inbound message, owned by whoever popped it from the receive queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedItem {
    pub header: MessageHeader,
    pub payload: Vec<u8>,
}

/// Reassembles frames from a byte stream.
pub struct FrameDecoder {
    pending: Vec<u8>,
    max_payload: usize,
}

impl FrameDecoder {
    pub fn new(max_payload: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_payload,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete frame, `Ok(None)` when more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<ReceivedItem>> {
        let Some(header) = MessageHeader::decode(&self.pending) else {
            return Ok(None);
        };
        let payload_size = header.payload_size as usize;
        if payload_size > self.max_payload {
            return Err(LesError::Protocol(format!(
                "frame type 0x{:X} declares {payload_size} bytes, limit is {}",
                header.message_type, self.max_payload
            )));
        }
        if self.pending.len() < HEADER_SIZE + payload_size {
            return Ok(None);
        }
        let payload = self.pending[HEADER_SIZE..HEADER_SIZE + payload_size].to_vec();
        self.pending.drain(..HEADER_SIZE + payload_size);
        Ok(Some(ReceivedItem { header, payload }))
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}
