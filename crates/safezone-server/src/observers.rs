//! Connected observers and registered caregivers.
//!
//! Every WebSocket connection is an observer and receives all status updates
//! through a broadcast channel. Connections that identify themselves as a
//! caregiver are also reachable individually, for relayed care requests.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use safezone_core::{Broadcaster, StatusUpdate};
use tokio::sync::{broadcast, mpsc};
use tracing::trace;
use uuid::Uuid;

/// Fan-out of status updates to all connected observers.
#[derive(Debug, Clone)]
pub struct ObserverHub {
    tx: broadcast::Sender<StatusUpdate>,
}

impl ObserverHub {
    /// Create a hub buffering up to `capacity` updates per observer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every update published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }

    /// Number of currently connected observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Broadcaster for ObserverHub {
    fn publish(&self, update: StatusUpdate) {
        match self.tx.send(update) {
            Ok(observers) => trace!(observers, "Status update published"),
            Err(_) => trace!("No observers connected, status update dropped"),
        }
    }
}

/// Outbound channel of one connection.
pub type ConnectionSender = mpsc::UnboundedSender<String>;

#[derive(Debug)]
struct Registration {
    connection_id: Uuid,
    sender: ConnectionSender,
}

/// Caregivers currently connected, keyed by caregiver id.
#[derive(Debug, Clone, Default)]
pub struct CaregiverRegistry {
    inner: Arc<RwLock<HashMap<String, Registration>>>,
}

impl CaregiverRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `caregiver_id` on a connection, replacing any previous one.
    pub fn register(&self, caregiver_id: &str, connection_id: Uuid, sender: ConnectionSender) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                caregiver_id.to_string(),
                Registration {
                    connection_id,
                    sender,
                },
            );
    }

    /// Drop the caregiver registered on `connection_id`, returning its id.
    pub fn unregister_connection(&self, connection_id: Uuid) -> Option<String> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let caregiver_id = inner
            .iter()
            .find(|(_, registration)| registration.connection_id == connection_id)
            .map(|(id, _)| id.clone())?;
        inner.remove(&caregiver_id);
        Some(caregiver_id)
    }

    /// Send `text` to a caregiver. Returns `false` if it is not connected.
    pub fn send(&self, caregiver_id: &str, text: String) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(caregiver_id)
            .is_some_and(|registration| registration.sender.send(text).is_ok())
    }

    /// Number of registered caregivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no caregiver is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safezone_core::{Position, SubjectId};

    #[tokio::test]
    async fn test_publish_reaches_all_observers() {
        let hub = ObserverHub::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.observer_count(), 2);

        hub.publish(StatusUpdate::unconfigured(
            SubjectId::new("1"),
            Position::new(1.0, 2.0),
        ));

        assert_eq!(a.recv().await.unwrap().subject_id, SubjectId::new("1"));
        assert_eq!(b.recv().await.unwrap().latitude, 1.0);
    }

    #[test]
    fn test_publish_without_observers_is_silent() {
        let hub = ObserverHub::new(8);
        hub.publish(StatusUpdate::unconfigured(
            SubjectId::new("1"),
            Position::new(1.0, 2.0),
        ));
        assert_eq!(hub.observer_count(), 0);
    }

    #[test]
    fn test_caregiver_lifecycle() {
        let registry = CaregiverRegistry::new();
        let connection = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.register("c-1", connection, tx);
        assert!(registry.send("c-1", "hello".into()));
        assert_eq!(rx.try_recv().unwrap(), "hello");

        assert!(!registry.send("c-2", "nobody".into()));
        assert_eq!(registry.unregister_connection(Uuid::new_v4()), None);
        assert_eq!(registry.unregister_connection(connection).as_deref(), Some("c-1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_to_closed_connection_fails() {
        let registry = CaregiverRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register("c-1", Uuid::new_v4(), tx);
        drop(rx);
        assert!(!registry.send("c-1", "late".into()));
    }
}
