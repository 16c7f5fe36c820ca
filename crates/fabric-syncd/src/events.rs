//! Deletion notifications and the queue they wait in between passes.

use std::fmt::Debug;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Registry network deleted.
pub const EVENT_NETWORK_DELETE: &str = "delete_network";
/// Registry subnet deleted.
pub const EVENT_SUBNET_DELETE: &str = "delete_subnet";

/// A deletion notification.
///
/// `payload` carries the serialized form of the fabric operation the
/// deletion implies, e.g. `{"project_name": "P1.dc1", "segment_name": "net1"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event_type: String,
    pub payload: Value,
}

impl Notification {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Returns true for the event types this daemon understands.
    pub fn is_known(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            EVENT_NETWORK_DELETE | EVENT_SUBNET_DELETE
        )
    }
}

/// Thread-safe buffer of notifications received since the last drain.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<Vec<Notification>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, notification: Notification) {
        debug!(event_type = %notification.event_type, "Queued notification");
        self.events.lock().push(notification);
    }

    /// Takes every queued notification, leaving the queue empty.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// Keeps the candidates some notification payload matches field for field.
///
/// Unmatched candidates are dropped with a warning; they must be removed
/// from the fabric by hand.
pub fn filter_by_events<T>(events: &[Notification], candidates: Vec<T>) -> Vec<T>
where
    T: Serialize + Debug,
{
    candidates
        .into_iter()
        .filter(|candidate| {
            let matched = match serde_json::to_value(candidate) {
                Ok(value) => events.iter().any(|e| e.payload == value),
                Err(e) => {
                    warn!(error = %e, ?candidate, "Cannot serialize deletion candidate");
                    false
                }
            };
            if !matched {
                warn!(?candidate, "No deletion notification received, needs manual deletion");
            }
            matched
        })
        .collect()
}
