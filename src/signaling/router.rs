//! Signaling message router.
//!
//! Decodes inbound frames, validates the sender against the registry, and
//! writes response/forward frames. Every failure is answered in-band with an
//! ERROR or USER_NOT_FOUND frame to the offending connection; nothing in here
//! can take down the process or another connection.

use crate::registry::ConnectionRegistry;
use crate::signaling::protocol::{MessageType, SignalingMessage};
use crate::ws::ClientConnection;

/// Handle one inbound text frame from `conn`.
///
/// Sends are non-blocking handoffs to the target connection's writer task, so
/// this runs to completion without awaiting anything.
pub fn handle_message(registry: &ConnectionRegistry, conn: &ClientConnection, raw: &str) {
    let msg: SignalingMessage = match serde_json::from_str(raw) {
        Ok(msg) => msg,
        Err(err) => {
            tracing::warn!(connection_id = %conn.id(), error = %err, "undecodable signaling frame");
            send(conn, &SignalingMessage::error("invalid message format"));
            return;
        }
    };

    log_received(conn, &msg);

    match msg.message_type {
        MessageType::Register => handle_register(registry, conn, &msg),
        MessageType::Signal => handle_signal(registry, conn, msg),
        MessageType::Ping => send(conn, &SignalingMessage::pong()),
        // Response types are server-to-client only.
        unsupported => {
            tracing::warn!(
                connection_id = %conn.id(),
                message_type = %unsupported,
                "unsupported message type from client"
            );
            send(
                conn,
                &SignalingMessage::error(format!("unsupported message type: {unsupported}")),
            );
        }
    }
}

/// Transport-level closure: drop any registry binding for `conn`.
/// Peers are not notified; they observe the loss through their own transport.
pub fn handle_close(registry: &ConnectionRegistry, conn: &ClientConnection) {
    registry.unregister(conn);
}

fn handle_register(registry: &ConnectionRegistry, conn: &ClientConnection, msg: &SignalingMessage) {
    let user_id = msg.user_id.as_deref().unwrap_or("").trim();
    if user_id.is_empty() {
        send(conn, &SignalingMessage::error("user id must not be empty"));
        return;
    }

    if registry.register(user_id, conn) {
        send(
            conn,
            &SignalingMessage::success(user_id, "registration successful"),
        );
    } else {
        send(
            conn,
            &SignalingMessage::error(format!(
                "user id '{user_id}' is already in use by another session"
            )),
        );
    }
}

fn handle_signal(registry: &ConnectionRegistry, conn: &ClientConnection, msg: SignalingMessage) {
    // The sender's identity comes from the registry, never from the frame, so
    // a client cannot spoof `fromUserId` on forwarded traffic.
    let Some(from_user_id) = registry.lookup_user_id(conn) else {
        send(
            conn,
            &SignalingMessage::error("not registered, send REGISTER first"),
        );
        return;
    };

    let target_user_id = msg.target_user_id.as_deref().unwrap_or("").trim();
    if target_user_id.is_empty() {
        send(conn, &SignalingMessage::error("target user id must not be empty"));
        return;
    }

    let Some(target) = registry.lookup_connection(target_user_id) else {
        tracing::warn!(
            from_user_id = %from_user_id,
            target_user_id = %target_user_id,
            "signal not forwarded, target not online"
        );
        send(conn, &SignalingMessage::user_not_found(target_user_id));
        return;
    };

    // Fire-and-forget relay: no acknowledgment goes back to the sender.
    send(
        &target,
        &SignalingMessage::forwarded_signal(&from_user_id, msg.payload),
    );
    tracing::info!(
        from_user_id = %from_user_id,
        target_user_id = %target_user_id,
        "signal forwarded"
    );
}

fn send(conn: &ClientConnection, msg: &SignalingMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            if !conn.send_text(json) {
                tracing::warn!(
                    connection_id = %conn.id(),
                    message_type = %msg.message_type,
                    "dropped frame for closed connection"
                );
            }
        }
        Err(err) => {
            tracing::error!(connection_id = %conn.id(), error = %err, "failed to serialize frame");
        }
    }
}

/// Per-type receive logging. Payload contents never reach the log, only
/// whether one was present.
fn log_received(conn: &ClientConnection, msg: &SignalingMessage) {
    match msg.message_type {
        MessageType::Register => tracing::info!(
            connection_id = %conn.id(),
            user_id = msg.user_id.as_deref().unwrap_or(""),
            "received REGISTER"
        ),
        MessageType::Signal => tracing::debug!(
            connection_id = %conn.id(),
            target_user_id = msg.target_user_id.as_deref().unwrap_or(""),
            has_payload = msg.payload.is_some(),
            "received SIGNAL"
        ),
        MessageType::Ping => tracing::debug!(connection_id = %conn.id(), "received PING"),
        other => tracing::debug!(connection_id = %conn.id(), message_type = %other, "received frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::Message;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn fake_conn() -> (ClientConnection, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClientConnection::new(tx), rx)
    }

    fn recv_frame(rx: &mut mpsc::UnboundedReceiver<Message>) -> SignalingMessage {
        match rx.try_recv().expect("expected a frame") {
            Message::Text(text) => serde_json::from_str(&text).expect("valid frame"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    fn assert_no_frame(rx: &mut mpsc::UnboundedReceiver<Message>) {
        assert!(rx.try_recv().is_err(), "expected no further frames");
    }

    fn register(registry: &ConnectionRegistry, conn: &ClientConnection, user_id: &str) {
        assert!(registry.register(user_id, conn));
    }

    #[test]
    fn register_round_trip() {
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = fake_conn();

        handle_message(&registry, &conn, r#"{"type":"REGISTER","userId":"alice"}"#);

        let reply = recv_frame(&mut rx);
        assert_eq!(reply.message_type, MessageType::Success);
        assert_eq!(reply.user_id.as_deref(), Some("alice"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn register_blank_id_is_an_error() {
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = fake_conn();

        handle_message(&registry, &conn, r#"{"type":"REGISTER","userId":"  "}"#);

        let reply = recv_frame(&mut rx);
        assert_eq!(reply.message_type, MessageType::Error);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn register_conflict_names_the_id() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = fake_conn();
        let (c2, mut rx2) = fake_conn();
        register(&registry, &c1, "alice");

        handle_message(&registry, &c2, r#"{"type":"REGISTER","userId":"alice"}"#);

        let reply = recv_frame(&mut rx2);
        assert_eq!(reply.message_type, MessageType::Error);
        assert!(reply.message.unwrap().contains("alice"));
    }

    #[test]
    fn undecodable_frame_yields_one_error() {
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = fake_conn();

        handle_message(&registry, &conn, "{not json");

        let reply = recv_frame(&mut rx);
        assert_eq!(reply.message_type, MessageType::Error);
        assert_eq!(reply.message.as_deref(), Some("invalid message format"));
        assert_no_frame(&mut rx);
    }

    #[test]
    fn ping_yields_pong_regardless_of_registration() {
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = fake_conn();

        handle_message(&registry, &conn, r#"{"type":"PING"}"#);
        assert_eq!(recv_frame(&mut rx).message_type, MessageType::Pong);

        register(&registry, &conn, "alice");
        handle_message(&registry, &conn, r#"{"type":"PING"}"#);
        assert_eq!(recv_frame(&mut rx).message_type, MessageType::Pong);
    }

    #[test]
    fn signal_from_unregistered_connection_is_rejected() {
        let registry = ConnectionRegistry::new();
        let (sender, mut sender_rx) = fake_conn();
        let (bob, mut bob_rx) = fake_conn();
        register(&registry, &bob, "bob");

        handle_message(
            &registry,
            &sender,
            r#"{"type":"SIGNAL","targetUserId":"bob","payload":{"sdp":"x"}}"#,
        );

        let reply = recv_frame(&mut sender_rx);
        assert_eq!(reply.message_type, MessageType::Error);
        assert_no_frame(&mut sender_rx);
        assert_no_frame(&mut bob_rx);
    }

    #[test]
    fn signal_with_blank_target_is_rejected() {
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = fake_conn();
        register(&registry, &conn, "alice");

        handle_message(&registry, &conn, r#"{"type":"SIGNAL","payload":{}}"#);

        assert_eq!(recv_frame(&mut rx).message_type, MessageType::Error);
    }

    #[test]
    fn signal_to_offline_target_reports_user_not_found() {
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = fake_conn();
        register(&registry, &conn, "alice");

        handle_message(
            &registry,
            &conn,
            r#"{"type":"SIGNAL","targetUserId":"bob","payload":{"sdp":"x"}}"#,
        );

        let reply = recv_frame(&mut rx);
        assert_eq!(reply.message_type, MessageType::UserNotFound);
        assert_eq!(reply.target_user_id.as_deref(), Some("bob"));
        assert_no_frame(&mut rx);
    }

    #[test]
    fn signal_to_stale_target_reports_user_not_found() {
        let registry = ConnectionRegistry::new();
        let (alice, mut alice_rx) = fake_conn();
        let (bob, bob_rx) = fake_conn();
        register(&registry, &alice, "alice");
        register(&registry, &bob, "bob");
        drop(bob_rx); // bob's transport dies without a clean unregister

        handle_message(
            &registry,
            &alice,
            r#"{"type":"SIGNAL","targetUserId":"bob","payload":{"sdp":"x"}}"#,
        );

        let reply = recv_frame(&mut alice_rx);
        assert_eq!(reply.message_type, MessageType::UserNotFound);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn signal_is_forwarded_with_registry_resolved_sender() {
        let registry = ConnectionRegistry::new();
        let (alice, mut alice_rx) = fake_conn();
        let (bob, mut bob_rx) = fake_conn();
        register(&registry, &alice, "alice");
        register(&registry, &bob, "bob");

        // The spoofed fromUserId must be overwritten.
        handle_message(
            &registry,
            &alice,
            r#"{"type":"SIGNAL","targetUserId":"bob","fromUserId":"mallory","payload":{"sdp":"v=0"}}"#,
        );

        let delivered = recv_frame(&mut bob_rx);
        assert_eq!(delivered.message_type, MessageType::Signal);
        assert_eq!(delivered.from_user_id.as_deref(), Some("alice"));
        assert_eq!(delivered.payload, Some(json!({"sdp": "v=0"})));

        // Fire and forget: no acknowledgment to the sender.
        assert_no_frame(&mut alice_rx);
        assert_no_frame(&mut bob_rx);
    }

    #[test]
    fn response_types_from_clients_are_unsupported() {
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = fake_conn();

        handle_message(&registry, &conn, r#"{"type":"PONG"}"#);

        let reply = recv_frame(&mut rx);
        assert_eq!(reply.message_type, MessageType::Error);
        assert!(reply.message.unwrap().contains("PONG"));
    }

    #[test]
    fn close_unregisters_the_connection() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = fake_conn();
        register(&registry, &conn, "alice");

        handle_close(&registry, &conn);
        assert_eq!(registry.count(), 0);

        // A second close is harmless.
        handle_close(&registry, &conn);
    }
}
