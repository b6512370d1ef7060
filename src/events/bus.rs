// SPDX-License-Identifier: GPL-3.0-only

//! Per-listener event delivery
//!
//! Every listener owns an unbounded channel drained by its own task, so
//! emitting never waits on a handler and a handler that panics only loses
//! its own event.

use super::{EventKind, ScannerEvent};
use futures::Stream;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Handle returned by [`EventBus::on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    kind: EventKind,
    tx: mpsc::UnboundedSender<ScannerEvent>,
}

/// Router from the scanner to host listeners
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, kind: EventKind) -> (ListenerId, mpsc::UnboundedReceiver<ScannerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().unwrap().push(Listener { id, kind, tx });
        (id, rx)
    }

    /// Register a callback for one event kind
    ///
    /// Must be called from within a Tokio runtime; the callback runs on a
    /// task of its own.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ScannerEvent) + Send + Sync + 'static,
    {
        let (id, mut rx) = self.register(kind);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if panic::catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                    warn!(event = %kind, "Event handler panicked");
                }
            }
        });
        debug!(event = %kind, "Listener added");
        id
    }

    /// Receive one event kind as a stream
    pub fn subscribe(&self, kind: EventKind) -> impl Stream<Item = ScannerEvent> + Send + 'static {
        let (_, mut rx) = self.register(kind);
        async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        }
    }

    /// Remove a listener; events already queued for it are still delivered
    pub fn off(&self, id: ListenerId) {
        self.listeners.lock().unwrap().retain(|l| l.id != id);
    }

    /// Queue an event for every listener of its kind
    pub fn emit(&self, event: ScannerEvent) {
        let kind = event.kind();
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|listener| {
            if listener.kind != kind {
                return true;
            }
            listener.tx.send(event.clone()).is_ok()
        });
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_panicking_handler_does_not_block_others() {
        let bus = EventBus::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::Disconnected, |_| panic!("listener bug"));
        let counter = Arc::clone(&delivered);
        bus.on(EventKind::Disconnected, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(ScannerEvent::Disconnected);
        bus.emit(ScannerEvent::Disconnected);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_only_matching_kind_is_delivered() {
        let bus = EventBus::new();
        let mut stream = Box::pin(bus.subscribe(EventKind::Disconnected));

        bus.emit(ScannerEvent::Connected(crate::events::ConnectedEvent {
            kind: "webcam".into(),
            device_id: None,
        }));
        bus.emit(ScannerEvent::Disconnected);

        assert_eq!(stream.next().await, Some(ScannerEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let bus = EventBus::new();
        let stream = bus.subscribe(EventKind::Disconnected);
        let id = bus.on(EventKind::Disconnected, |_| {});
        assert_eq!(bus.listener_count(), 2);

        drop(stream);
        bus.emit(ScannerEvent::Disconnected);
        assert_eq!(bus.listener_count(), 1);

        bus.off(id);
        assert_eq!(bus.listener_count(), 0);
    }
}
