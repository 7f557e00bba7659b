use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use huddle_types::events::GatewayEvent;

/// An event on its way to connected clients.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub event: GatewayEvent,
    /// When set, only these users receive the event (direct-message
    /// traffic). Otherwise every subscriber of the event's workspace does.
    pub recipients: Option<Arc<[Uuid]>>,
}

impl Dispatched {
    /// Whether a connection for `user_id` subscribed to `workspaces` should
    /// see this event.
    pub fn is_visible_to(&self, user_id: Uuid, workspaces: &[Uuid]) -> bool {
        if let Some(recipients) = &self.recipients {
            if !recipients.contains(&user_id) {
                return false;
            }
        }
        match self.event.workspace_id() {
            Some(workspace_id) => workspaces.contains(&workspace_id),
            None => true,
        }
    }
}

/// Fans change notifications out to every connected client.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<Dispatched>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Dispatched> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish to every subscriber of the event's workspace.
    pub fn publish(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(Dispatched {
            event,
            recipients: None,
        });
    }

    /// Publish to the listed users only, provided they are subscribed to
    /// the event's workspace.
    pub fn publish_to_users(&self, event: GatewayEvent, user_ids: &[Uuid]) {
        let _ = self.inner.broadcast_tx.send(Dispatched {
            event,
            recipients: Some(user_ids.into()),
        });
    }
}
