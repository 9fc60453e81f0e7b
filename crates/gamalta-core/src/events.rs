//! Session event system.
//!
//! The notification pump and the state machine publish what they observe
//! here: state transitions, decoded replies, device state reports, and frames
//! that could not be used. Events are informational; dropping a receiver
//! never affects the session.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use gamalta_types::{DeviceState, Response, SessionState};

/// Events that can be emitted by a session.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// The session moved between lifecycle states.
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// A notification was decoded.
    Response { response: Response },
    /// The device reported its full state.
    Snapshot { state: DeviceState },
    /// A notification could not be decoded.
    MalformedFrame { raw: Vec<u8>, reason: String },
    /// A notification carried an opcode that answers no known request.
    UnknownResponse { opcode: u8, raw: Vec<u8> },
    /// The link went down.
    Disconnected { reason: DisconnectReason },
}

/// Reason for disconnection.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// Normal disconnection requested by user.
    UserRequested,
    /// The transport reported the link as lost.
    LinkLost,
    /// The handshake failed and the link was released.
    HandshakeFailed(String),
}

/// Sender for session events.
pub type EventSender = broadcast::Sender<SessionEvent>;

/// Receiver for session events.
pub type EventReceiver = broadcast::Receiver<SessionEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SessionEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_without_receivers() {
        let dispatcher = EventDispatcher::default();
        assert_eq!(dispatcher.receiver_count(), 0);
        dispatcher.send(SessionEvent::Disconnected {
            reason: DisconnectReason::UserRequested,
        });
    }

    #[tokio::test]
    async fn test_dispatch_to_subscribers() {
        let dispatcher = EventDispatcher::new(8);
        let mut first = dispatcher.subscribe();
        let mut second = dispatcher.subscribe();

        let event = SessionEvent::StateChanged {
            from: SessionState::Stabilizing,
            to: SessionState::Ready,
        };
        dispatcher.send(event.clone());

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::UnknownResponse {
            opcode: 0x99,
            raw: vec![0xA5, 0x01, 0x99, 0x00],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"unknown_response\""));
        assert!(json.contains("\"opcode\":153"));

        let event = SessionEvent::StateChanged {
            from: SessionState::Ready,
            to: SessionState::Disconnected,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"state_changed","from":"ready","to":"disconnected"}"#
        );
    }
}
