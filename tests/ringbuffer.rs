use les_rpc::Core::error::QueueErrorKind;
use les_rpc::Core::LesError;
use les_rpc::Network::RingQueue;
use std::collections::VecDeque;

#[test]
fn simple_add_pop() {
    let mut queue = RingQueue::new(16).unwrap();
    assert!(queue.is_empty());

    queue.add(vec![1u8, 2, 3, 4]).unwrap();
    assert_eq!(queue.len(), 1);

    assert_eq!(queue.pop().unwrap(), Some(vec![1, 2, 3, 4]));
    assert_eq!(queue.pop().unwrap(), None);
}

#[test]
fn capacity_must_be_a_power_of_two() {
    assert!(RingQueue::<u32>::new(0).is_err());
    assert!(RingQueue::<u32>::new(3).is_err());
    assert!(RingQueue::<u32>::new(12).is_err());
    assert_eq!(RingQueue::<u32>::new(8).unwrap().capacity(), 8);
}

#[test]
fn full_buffer() {
    let mut queue = RingQueue::new(4).unwrap();
    for i in 0..4u32 {
        queue.add(i).unwrap();
    }

    let rejected = queue.add(99).unwrap_err();
    assert_eq!(rejected.kind, QueueErrorKind::Full);
    assert_eq!(rejected.into_inner(), 99);
    assert_eq!(queue.len(), 4);

    // the queue is unchanged by the rejected add
    for i in 0..4u32 {
        assert_eq!(queue.pop().unwrap(), Some(i));
    }
    assert_eq!(queue.pop().unwrap(), None);
}

#[test]
fn rejected_add_converts_to_queue_full() {
    let mut queue = RingQueue::new(1).unwrap();
    queue.add("first").unwrap();
    let err: LesError = queue.add("second").unwrap_err().into();
    assert!(matches!(err, LesError::QueueFull { capacity: 1 }));
}

#[test]
fn fifo_across_wrap_around() {
    let mut queue = RingQueue::new(4).unwrap();
    let mut next = 0u32;
    let mut expected = 0u32;
    for _ in 0..10 {
        for _ in 0..3 {
            queue.add(next).unwrap();
            next += 1;
        }
        for _ in 0..3 {
            assert_eq!(queue.pop().unwrap(), Some(expected));
            expected += 1;
        }
    }
    assert!(queue.is_empty());
}

#[test]
fn randomized_sequences_match_a_reference_queue() {
    let mut rng = fastrand::Rng::with_seed(0x1E5);
    for _ in 0..50 {
        let capacity = 1usize << rng.usize(0..6);
        let mut queue = RingQueue::new(capacity).unwrap();
        let mut reference = VecDeque::new();

        for step in 0..500u32 {
            if rng.bool() {
                match queue.add(step) {
                    Ok(()) => reference.push_back(step),
                    Err(rejected) => {
                        assert_eq!(rejected.kind, QueueErrorKind::Full);
                        assert_eq!(reference.len(), capacity);
                    }
                }
            } else {
                assert_eq!(queue.pop().unwrap(), reference.pop_front());
            }
            assert_eq!(queue.len(), reference.len());
        }
    }
}
