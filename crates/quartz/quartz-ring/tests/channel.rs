//! Multi-producer / multi-consumer use of the bounded channel.

use quartz_ring::{Channel, ChannelRead, ChannelWrite, TryRecvError};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn owned_values_move_through_exactly_once() {
    const PRODUCERS: usize = 3;
    const CONSUMERS: usize = 3;
    const PER_PRODUCER: usize = 3_000;

    let channel = Channel::new(32, ChannelWrite::Sync, ChannelRead::Sync).unwrap();
    let received: Vec<String> = thread::scope(|s| {
        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                s.spawn(|| {
                    let mut got = Vec::new();
                    while let Some(v) = channel.recv() {
                        got.push(v);
                    }
                    got
                })
            })
            .collect();
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let channel = &channel;
                s.spawn(move || {
                    for i in 0..PER_PRODUCER {
                        channel.send(format!("{p}:{i}")).unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        channel.close();
        consumers.into_iter().flat_map(|c| c.join().unwrap()).collect()
    });

    assert_eq!(received.len(), PRODUCERS * PER_PRODUCER);
    let unique: HashSet<_> = received.into_iter().collect();
    assert_eq!(unique.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(channel.try_recv(), Err(TryRecvError::Closed));
}

#[test]
fn close_wakes_blocked_sender_and_receiver() {
    let full = Arc::new(Channel::new(1, ChannelWrite::Sync, ChannelRead::Sync).unwrap());
    full.send(1u8).unwrap();
    let sender = {
        let full = Arc::clone(&full);
        thread::spawn(move || full.send(2).map_err(|e| e.into_inner()))
    };

    let empty = Arc::new(Channel::<u8>::new(1, ChannelWrite::Sync, ChannelRead::Sync).unwrap());
    let receiver = {
        let empty = Arc::clone(&empty);
        thread::spawn(move || empty.recv())
    };

    thread::sleep(Duration::from_millis(20));
    full.close();
    empty.close();

    assert_eq!(sender.join().unwrap(), Err(2));
    assert_eq!(receiver.join().unwrap(), None);
    assert_eq!(full.recv(), Some(1));
}

#[test]
fn recv_timeout_returns_a_value_sent_in_time() {
    let channel = Arc::new(Channel::new(4, ChannelWrite::Mutex, ChannelRead::Sync).unwrap());
    let sender = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            channel.send(7u32).unwrap();
        })
    };
    assert_eq!(channel.recv_timeout(Duration::from_secs(5)), Ok(Some(7)));
    sender.join().unwrap();
}
