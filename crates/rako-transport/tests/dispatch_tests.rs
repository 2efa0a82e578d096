//! Dispatcher fallback behaviour

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rako_core::Command;
use rako_transport::{CommandDispatcher, CommandLink, DispatchPolicy, TransportError};

/// Link that fails a scripted number of deliveries before succeeding
struct ScriptedLink {
    delivered: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
    failures: usize,
}

impl ScriptedLink {
    fn new(failures: usize) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let delivered = Arc::new(AtomicUsize::new(0));
        let resets = Arc::new(AtomicUsize::new(0));
        let link = Self {
            delivered: delivered.clone(),
            resets: resets.clone(),
            failures,
        };
        (link, delivered, resets)
    }
}

#[async_trait]
impl CommandLink for ScriptedLink {
    async fn deliver(&self, _command: &Command) -> rako_transport::Result<()> {
        let n = self.delivered.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(TransportError::AckTimeout)
        } else {
            Ok(())
        }
    }

    async fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_policy() -> DispatchPolicy {
    DispatchPolicy {
        attempts: 3,
        backoff: Duration::from_millis(0),
    }
}

#[tokio::test]
async fn test_datagram_success_short_circuits() {
    let (datagram, datagram_count, _) = ScriptedLink::new(0);
    let (stream, stream_count, _) = ScriptedLink::new(0);
    let dispatcher =
        CommandDispatcher::with_policy(Box::new(datagram), Box::new(stream), fast_policy());

    dispatcher
        .dispatch(&Command::set_level(1, 1, 128))
        .await
        .unwrap();

    assert_eq!(datagram_count.load(Ordering::SeqCst), 1);
    assert_eq!(stream_count.load(Ordering::SeqCst), 0);
    assert!(!dispatcher.uses_stream());
}

#[tokio::test]
async fn test_datagram_failure_switches_to_stream() {
    let (datagram, datagram_count, _) = ScriptedLink::new(usize::MAX);
    let (stream, stream_count, _) = ScriptedLink::new(0);
    let dispatcher =
        CommandDispatcher::with_policy(Box::new(datagram), Box::new(stream), fast_policy());

    dispatcher
        .dispatch(&Command::set_scene(4, 0, 2))
        .await
        .unwrap();

    assert_eq!(datagram_count.load(Ordering::SeqCst), 1);
    assert_eq!(stream_count.load(Ordering::SeqCst), 1);
    assert!(dispatcher.uses_stream());

    // The preference sticks: the next command goes straight to the stream
    dispatcher
        .dispatch(&Command::set_scene(4, 0, 1))
        .await
        .unwrap();

    assert_eq!(datagram_count.load(Ordering::SeqCst), 1);
    assert_eq!(stream_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_both_links_exhaust() {
    let (datagram, datagram_count, _) = ScriptedLink::new(usize::MAX);
    let (stream, stream_count, stream_resets) = ScriptedLink::new(usize::MAX);
    let dispatcher =
        CommandDispatcher::with_policy(Box::new(datagram), Box::new(stream), fast_policy());

    let result = dispatcher.dispatch(&Command::set_level(1, 1, 255)).await;

    assert!(matches!(
        result,
        Err(TransportError::Exhausted { attempts: 3 })
    ));
    assert_eq!(datagram_count.load(Ordering::SeqCst), 3);
    assert_eq!(stream_count.load(Ordering::SeqCst), 3);
    assert_eq!(stream_resets.load(Ordering::SeqCst), 3);
    // The last stream failure handed preference back to datagrams
    assert!(!dispatcher.uses_stream());
}

#[tokio::test]
async fn test_stream_failure_returns_to_datagram() {
    let (datagram, datagram_count, _) = ScriptedLink::new(1);
    let (stream, stream_count, stream_resets) = ScriptedLink::new(usize::MAX);
    let dispatcher =
        CommandDispatcher::with_policy(Box::new(datagram), Box::new(stream), fast_policy());

    dispatcher
        .dispatch(&Command::set_level(2, 3, 64))
        .await
        .unwrap();

    // Round one fails on both links, round two succeeds on the datagram
    assert_eq!(datagram_count.load(Ordering::SeqCst), 2);
    assert_eq!(stream_count.load(Ordering::SeqCst), 1);
    assert_eq!(stream_resets.load(Ordering::SeqCst), 1);
    assert!(!dispatcher.uses_stream());
}
