use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of a non-blocking send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Sent(usize),
    WouldBlock,
}

/// Outcome of a bounded-wait receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus {
    Read(usize),
    NoData,
}

/// Byte transport driven by the network thread.
pub trait Transport: Send {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    fn try_send(&mut self, bytes: &[u8]) -> io::Result<SendStatus>;

    /// Waits a bounded time for data. A closed peer is an error.
    fn try_recv(&mut self, buffer: &mut [u8]) -> io::Result<RecvStatus>;
}

/// TCP transport: reads block up to `recv_timeout`, writes give up after `send_timeout`.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    recv_timeout: Duration,
    send_timeout: Duration,
}

impl TcpTransport {
    pub fn new(recv_timeout: Duration) -> Self {
        Self {
            stream: None,
            recv_timeout,
            send_timeout: Duration::from_millis(1),
        }
    }

    /// Wraps an already connected stream, e.g. one accepted by a listener.
    pub fn from_stream(stream: TcpStream, recv_timeout: Duration) -> io::Result<Self> {
        let mut transport = Self::new(recv_timeout);
        transport.configure(&stream)?;
        transport.stream = Some(stream);
        Ok(transport)
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.recv_timeout))?;
        stream.set_write_timeout(Some(self.send_timeout))?;
        Ok(())
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "transport is not connected"))
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted)
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, format!("no address for {host}:{port}")))?;
        let stream = TcpStream::connect(addr)?;
        self.configure(&stream)?;
        info!("connected to {addr}");
        self.stream = Some(stream);
        Ok(())
    }

    fn try_send(&mut self, bytes: &[u8]) -> io::Result<SendStatus> {
        match self.stream()?.write(bytes) {
            Ok(0) if !bytes.is_empty() => Err(io::Error::new(ErrorKind::WriteZero, "peer stopped accepting data")),
            Ok(n) => Ok(SendStatus::Sent(n)),
            Err(err) if is_timeout(&err) => Ok(SendStatus::WouldBlock),
            Err(err) => Err(err),
        }
    }

    fn try_recv(&mut self, buffer: &mut [u8]) -> io::Result<RecvStatus> {
        match self.stream()?.read(buffer) {
            Ok(0) => {
                debug!("peer closed the connection");
                Err(io::Error::new(ErrorKind::ConnectionAborted, "peer closed the connection"))
            }
            Ok(n) => Ok(RecvStatus::Read(n)),
            Err(err) if is_timeout(&err) => Ok(RecvStatus::NoData),
            Err(err) => Err(err),
        }
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        (**self).connect(host, port)
    }

    fn try_send(&mut self, bytes: &[u8]) -> io::Result<SendStatus> {
        (**self).try_send(bytes)
    }

    fn try_recv(&mut self, buffer: &mut [u8]) -> io::Result<RecvStatus> {
        (**self).try_recv(buffer)
    }
}
