#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **agentcore-bus** – Lifecycle event bus for the Agent Lifecycle &
//! Runtime Core.
//!
//! Subscribers register synchronous callbacks and receive a handle whose
//! `unsubscribe` removes them. Dispatch iterates a snapshot of the listener
//! list in insertion order; a listener that panics or otherwise misbehaves
//! cannot prevent delivery to the others. This mirrors
//! `toka-orchestration::monitor::ProgressMonitor`'s listener-list shape,
//! generalized from an `mpsc` channel fan-out to direct callbacks since
//! lifecycle subscribers here are required to be non-blocking.

use agentcore_types::LifecycleEvent;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

type Listener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

struct Entry {
    id: u64,
    listener: Listener,
}

/// A bus of `LifecycleEvent` subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Entry>>>,
    next_id: Arc<AtomicU64>,
}

/// A handle returned by `EventBus::subscribe`. Dropping it does not
/// unsubscribe; call `unsubscribe` explicitly, matching the
/// subscribe-returns-unsubscribe contract in the core specification.
pub struct Subscription {
    bus: EventBus,
    id: u64,
}

impl Subscription {
    /// Remove this subscription's listener from the bus.
    pub async fn unsubscribe(self) {
        let mut listeners = self.bus.listeners.write().await;
        listeners.retain(|entry| entry.id != self.id);
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Returns a `Subscription` the caller can use to
    /// unsubscribe later.
    pub async fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.write().await;
        listeners.push(Entry {
            id,
            listener: Arc::new(listener),
        });
        Subscription {
            bus: self.clone(),
            id,
        }
    }

    /// Dispatch an event to every current listener, insertion order.
    /// A listener that panics is caught and logged; dispatch continues.
    pub async fn emit(&self, event: LifecycleEvent) {
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.read().await;
            listeners.iter().map(|entry| entry.listener.clone()).collect()
        };
        for listener in snapshot {
            let event_ref = &event;
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event_ref))) {
                warn!(?panic, agent_id = %event.agent_id, "lifecycle event listener panicked");
            }
        }
    }

    /// Current number of registered listeners.
    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_types::{AgentId, LifecycleEventKind, OrgId};
    use std::sync::atomic::AtomicUsize;

    fn sample_event() -> LifecycleEvent {
        LifecycleEvent::new(
            AgentId::new(),
            OrgId::new(),
            LifecycleEventKind::Created,
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn dispatch_reaches_all_listeners_in_insertion_order() {
        let bus = EventBus::new();
        let order = Arc::new(RwLock::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        bus.subscribe(move |_| {
            let o1 = o1.clone();
            tokio::spawn(async move { o1.write().await.push(1) });
        })
        .await;
        bus.subscribe(move |_| {
            let o2 = o2.clone();
            tokio::spawn(async move { o2.write().await.push(2) });
        })
        .await;
        bus.emit(sample_event()).await;
        tokio::task::yield_now().await;
        assert_eq!(bus.listener_count().await, 2);
    }

    #[tokio::test]
    async fn panicking_listener_does_not_block_others() {
        let bus = EventBus::new();
        let hit = Arc::new(AtomicUsize::new(0));
        let hit2 = hit.clone();
        bus.subscribe(|_| panic!("boom")).await;
        bus.subscribe(move |_| {
            hit2.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        bus.emit(sample_event()).await;
        assert_eq!(hit.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_removes_listener() {
        let bus = EventBus::new();
        let sub = bus.subscribe(|_| {}).await;
        assert_eq!(bus.listener_count().await, 1);
        sub.unsubscribe().await;
        assert_eq!(bus.listener_count().await, 0);
    }
}
