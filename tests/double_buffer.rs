use les_rpc::Core::error::QueueErrorKind;
use les_rpc::Network::message::{MessageHeader, ReceivedItem, SendItem};
use les_rpc::Network::NetworkQueues;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn received(id: u16) -> ReceivedItem {
    ReceivedItem {
        header: MessageHeader {
            message_type: 0x33,
            id,
            payload_size: 0,
        },
        payload: Vec::new(),
    }
}

#[test]
fn sends_become_visible_to_the_network_after_a_swap() {
    let queues = NetworkQueues::new(8).unwrap();
    queues.add_send_item(SendItem::new(0x66, 1, b"a").unwrap()).unwrap();
    assert_eq!(queues.pending_sends(), 1);
    assert!(queues.pop_send_item().unwrap().is_none());

    queues.swap();
    assert_eq!(queues.pending_sends(), 0);
    let item = queues.pop_send_item().unwrap().unwrap();
    assert_eq!(item.header().id, 1);
    assert!(!queues.wait_for_send_drained(Duration::from_millis(1)));
    queues.send_complete();
    item.release();
    assert!(queues.wait_for_send_drained(Duration::from_millis(1)));
    assert_eq!(queues.messages_sent(), 1);
}

#[test]
fn received_items_reach_the_application_after_a_swap() {
    let queues = NetworkQueues::new(8).unwrap();
    queues.add_received(received(1)).unwrap();
    assert!(queues.pop_received().unwrap().is_none());
    queues.swap();
    assert_eq!(queues.pop_received().unwrap().map(|item| item.header.id), Some(1));
    assert_eq!(queues.messages_received(), 1);
}

#[test]
fn full_request_buffer_hands_the_item_back() {
    let queues = NetworkQueues::new(2).unwrap();
    queues.add_send_item(SendItem::new(0x66, 1, &[]).unwrap()).unwrap();
    queues.add_send_item(SendItem::new(0x66, 2, &[]).unwrap()).unwrap();
    let rejected = queues.add_send_item(SendItem::new(0x66, 3, &[]).unwrap()).unwrap_err();
    assert_eq!(rejected.kind, QueueErrorKind::Full);
    assert_eq!(rejected.into_inner().header().id, 3);
}

#[test]
fn wait_for_drain_wakes_on_completion() {
    let queues = Arc::new(NetworkQueues::new(8).unwrap());
    queues.add_send_item(SendItem::new(0x66, 1, &[]).unwrap()).unwrap();
    queues.swap();

    let network = {
        let queues = Arc::clone(&queues);
        thread::spawn(move || {
            let item = queues.pop_send_item().unwrap().unwrap();
            thread::sleep(Duration::from_millis(20));
            item.release();
            queues.send_complete();
        })
    };
    assert!(queues.wait_for_send_drained(Duration::from_secs(5)));
    network.join().unwrap();
}

#[test]
fn fifo_between_application_and_network_threads() {
    let queues = Arc::new(NetworkQueues::new(16).unwrap());
    let total = 500u16;

    let network = {
        let queues = Arc::clone(&queues);
        thread::spawn(move || {
            let mut next = 0u16;
            while next < total {
                match queues.add_received(received(next)) {
                    Ok(()) => next += 1,
                    Err(_) => thread::yield_now(),
                }
            }
        })
    };

    let mut seen = Vec::with_capacity(total as usize);
    while seen.len() < total as usize {
        while let Some(item) = queues.pop_received().unwrap() {
            seen.push(item.header.id);
        }
        queues.swap();
        while let Some(item) = queues.pop_received().unwrap() {
            seen.push(item.header.id);
        }
    }
    network.join().unwrap();

    let expected: Vec<u16> = (0..total).collect();
    assert_eq!(seen, expected);
}
