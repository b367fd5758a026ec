//! Typed events for hibernatable connections.
//!
//! The network listener turns every physical socket event into exactly one
//! [`SocketEvent`]. The runner accepts this four-way variant and nothing else;
//! each variant maps to one handler entry point.

use std::fmt;

use bytes::Bytes;

/// Identifier of a hibernatable connection, unique within one actor.
pub type ConnectionId = u64;

/// Type id the surrounding request pipeline uses for this event category.
pub const HIBERNATABLE_SOCKET_EVENT_TYPE: u16 = 0x0004;

/// Discriminant of a [`SocketEvent`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Inbound text message
    Text,
    /// Inbound binary message
    Binary,
    /// Peer closed the socket
    Close,
    /// Transport error on the socket
    Error,
}

impl EventKind {
    /// Name of the handler method this kind is delivered to.
    pub fn handler_name(self) -> &'static str {
        match self {
            Self::Text | Self::Binary => "webSocketMessage",
            Self::Close => "webSocketClose",
            Self::Error => "webSocketError",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Binary => write!(f, "binary"),
            Self::Close => write!(f, "close"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Error observed by the transport for a hibernated socket.
///
/// Captured by the listener and handed to the handler through the event
/// facade; the error entry point itself receives no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketError {
    description: String,
}

impl SocketError {
    /// Create a socket error with the given description.
    pub fn new(description: impl Into<String>) -> Self {
        Self { description: description.into() }
    }

    /// Human readable description.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl std::error::Error for SocketError {}

/// One physical event on a hibernatable socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Text message
    Text(String),

    /// Binary message
    Binary(Bytes),

    /// Close frame received from the peer
    Close {
        /// WebSocket close code
        code: u16,
        /// Close reason as sent by the peer
        reason: String,
    },

    /// Transport error. The captured error lands in the dispatch context.
    Error(SocketError),
}

impl SocketEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Text(_) => EventKind::Text,
            Self::Binary(_) => EventKind::Binary,
            Self::Close { .. } => EventKind::Close,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// Parameters of one dispatch, as constructed by the network listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HibernatableSocketParams {
    /// Connection the event belongs to
    pub connection_id: ConnectionId,
    /// The event itself
    pub event: SocketEvent,
}

impl HibernatableSocketParams {
    /// Text message for a connection.
    pub fn text(connection_id: ConnectionId, message: impl Into<String>) -> Self {
        Self { connection_id, event: SocketEvent::Text(message.into()) }
    }

    /// Binary message for a connection.
    pub fn binary(connection_id: ConnectionId, data: impl Into<Bytes>) -> Self {
        Self { connection_id, event: SocketEvent::Binary(data.into()) }
    }

    /// Close event for a connection.
    pub fn close(connection_id: ConnectionId, code: u16, reason: impl Into<String>) -> Self {
        Self { connection_id, event: SocketEvent::Close { code, reason: reason.into() } }
    }

    /// Transport error for a connection.
    pub fn error(connection_id: ConnectionId, error: SocketError) -> Self {
        Self { connection_id, event: SocketEvent::Error(error) }
    }

    /// Kind of the carried event.
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(HibernatableSocketParams::text(1, "hi").kind(), EventKind::Text);
        assert_eq!(HibernatableSocketParams::binary(1, vec![1u8, 2]).kind(), EventKind::Binary);
        assert_eq!(HibernatableSocketParams::close(1, 1000, "bye").kind(), EventKind::Close);
        assert_eq!(
            HibernatableSocketParams::error(1, SocketError::new("reset")).kind(),
            EventKind::Error
        );
    }

    #[test]
    fn text_and_binary_share_message_handler() {
        assert_eq!(EventKind::Text.handler_name(), EventKind::Binary.handler_name());
        assert_ne!(EventKind::Close.handler_name(), EventKind::Error.handler_name());
    }

    #[test]
    fn close_keeps_code_and_reason() {
        let params = HibernatableSocketParams::close(7, 1001, "going away");
        assert_eq!(
            params.event,
            SocketEvent::Close { code: 1001, reason: "going away".to_string() }
        );
    }
}
