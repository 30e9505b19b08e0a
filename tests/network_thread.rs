use les_rpc::Network::message::SendItem;
use les_rpc::Network::thread::NetworkThread;
use les_rpc::Network::transport::{RecvStatus, SendStatus};
use les_rpc::Network::{NetworkQueues, Transport};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Hands out one canned read, then reports no data forever.
struct ScriptedTransport {
    pending: Option<Vec<u8>>,
    fail_after_read: bool,
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, _host: &str, _port: u16) -> io::Result<()> {
        Ok(())
    }

    fn try_send(&mut self, bytes: &[u8]) -> io::Result<SendStatus> {
        Ok(SendStatus::Sent(bytes.len()))
    }

    fn try_recv(&mut self, buffer: &mut [u8]) -> io::Result<RecvStatus> {
        match self.pending.take() {
            Some(bytes) => {
                buffer[..bytes.len()].copy_from_slice(&bytes);
                Ok(RecvStatus::Read(bytes.len()))
            }
            None if self.fail_after_read => Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away")),
            None => {
                thread::sleep(Duration::from_millis(1));
                Ok(RecvStatus::NoData)
            }
        }
    }
}

fn frames(ids: &[u16]) -> Vec<u8> {
    ids.iter()
        .flat_map(|&id| SendItem::new(0x33, id, b"x").unwrap().wire_bytes().to_vec())
        .collect()
}

#[test]
fn frames_decoded_in_one_read_all_arrive_under_backpressure() {
    let queues = Arc::new(NetworkQueues::new(1).unwrap());
    let transport = ScriptedTransport {
        pending: Some(frames(&[0, 1, 2])),
        fail_after_read: false,
    };
    let mut network = NetworkThread::spawn(transport, Arc::clone(&queues), 4096, 1024).unwrap();

    let mut seen = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while seen.len() < 3 && Instant::now() < deadline {
        while let Some(item) = queues.pop_received().unwrap() {
            seen.push(item.header.id);
        }
        queues.swap();
        thread::sleep(Duration::from_millis(5));
    }
    network.shutdown();

    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn transport_error_is_recorded_and_stops_the_thread() {
    let queues = Arc::new(NetworkQueues::new(4).unwrap());
    let transport = ScriptedTransport {
        pending: Some(frames(&[7])),
        fail_after_read: true,
    };
    let mut network = NetworkThread::spawn(transport, Arc::clone(&queues), 4096, 1024).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while network.is_running() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(!network.is_running());
    let failure = network.take_failure().unwrap();
    assert_eq!(failure.kind, io::ErrorKind::ConnectionReset);

    queues.swap();
    assert_eq!(queues.pop_received().unwrap().map(|item| item.header.id), Some(7));
    network.shutdown();
}
