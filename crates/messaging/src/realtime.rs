//! Push side of the sync cache.

use async_trait::async_trait;
use school_client::{ClientError, EventReceiver, OutboundEvent, RealtimeConnection, SchoolClient};

/// Connection state of a session's real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// An open real-time channel.
pub trait RealtimeHandle: Send + Sync {
    /// Queue an outbound event.
    fn emit(&self, event: OutboundEvent) -> Result<(), ClientError>;

    /// Whether the transport is still up.
    fn is_connected(&self) -> bool;

    /// Tear the channel down. Must be idempotent.
    fn disconnect(&self);
}

impl RealtimeHandle for RealtimeConnection {
    fn emit(&self, event: OutboundEvent) -> Result<(), ClientError> {
        RealtimeConnection::emit(self, event)
    }

    fn is_connected(&self) -> bool {
        RealtimeConnection::is_connected(self)
    }

    fn disconnect(&self) {
        RealtimeConnection::disconnect(self)
    }
}

/// Opens real-time channels for a session.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    /// Open a channel and return its handle and inbound event stream.
    ///
    /// The stream ends when the transport closes.
    async fn connect(&self) -> Result<(Box<dyn RealtimeHandle>, EventReceiver), ClientError>;
}

/// Connects to the backend's Socket.IO endpoint using the client's
/// configuration and current bearer token.
#[derive(Debug, Clone)]
pub struct SocketConnector {
    client: SchoolClient,
}

impl SocketConnector {
    pub fn new(client: SchoolClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RealtimeConnector for SocketConnector {
    async fn connect(&self) -> Result<(Box<dyn RealtimeHandle>, EventReceiver), ClientError> {
        let token = self.client.auth_token().await;
        let (connection, events) =
            RealtimeConnection::connect(self.client.config(), token.as_ref()).await?;
        Ok((Box::new(connection), events))
    }
}
