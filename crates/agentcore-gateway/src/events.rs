//! Per-session event fan-out. Generalizes
//! `toka-orchestration::monitor::ProgressMonitor`'s listener-list shape to a
//! broadcast channel per session, keyed and torn down lazily: a session key
//! is created on first subscribe and dropped once its last subscriber goes
//! away.

use agentcore_types::SessionId;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of each session's broadcast channel. A slow subscriber that
/// falls this far behind starts missing events rather than backing up the
/// publisher.
const CHANNEL_CAPACITY: usize = 256;

/// A structured notification pushed to a session's SSE stream. Always
/// carries a `type` field in its serialized form per the gateway's wire
/// contract.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionEvent {
    /// Event discriminator (`message`, `session_end`, `error`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Arbitrary structured payload.
    #[serde(flatten)]
    pub data: Value,
}

impl SessionEvent {
    /// Construct an event of the given kind with a JSON payload merged in.
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self { kind: kind.into(), data }
    }
}

/// Owns one broadcast channel per session with at least one live
/// subscriber.
pub struct SessionHub {
    channels: DashMap<SessionId, broadcast::Sender<SessionEvent>>,
}

impl SessionHub {
    /// Construct an empty hub.
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to `session_id`'s events, creating its channel if this is
    /// the first subscriber.
    pub fn subscribe(&self, session_id: SessionId) -> broadcast::Receiver<SessionEvent> {
        self.channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Dispatch `event` to every current listener of `session_id`. A
    /// session with no subscribers, or whose last subscriber has since
    /// dropped, is silently skipped and its channel entry removed.
    pub fn emit(&self, session_id: SessionId, event: SessionEvent) {
        let should_remove = match self.channels.get(&session_id) {
            Some(sender) => {
                let _ = sender.send(event);
                sender.receiver_count() == 0
            }
            None => return,
        };
        if should_remove {
            self.channels.remove(&session_id);
        }
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}
