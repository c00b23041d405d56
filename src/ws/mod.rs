pub mod actor;
pub mod handler;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Handle to one live WebSocket client.
///
/// This is the only view of a connection the signaling core ever sees: an
/// opaque id, an open/closed flag, and a non-blocking send. The actual socket
/// is owned by the connection actor's writer task; sends go through its
/// unbounded mpsc channel, so a slow or dead peer can never stall the caller.
///
/// `is_open` flips to false exactly once, when the writer task exits and
/// drops the receiving half of the channel.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
}

impl ClientConnection {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    /// Unique identifier for this connection, stable for its lifetime.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a text frame for delivery. Returns false if the connection has
    /// already closed; the frame is silently dropped in that case.
    pub fn send_text(&self, text: String) -> bool {
        self.tx.send(Message::Text(text.into())).is_ok()
    }
}
