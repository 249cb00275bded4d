//! Socket.IO real-time channel over a WebSocket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::socketio::{Handshake, Packet};
use crate::types::{OutboundEvent, RealtimeEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// Receiving half of the channel: decoded events in arrival order.
///
/// Yields `None` once the connection is gone.
pub type EventReceiver = mpsc::UnboundedReceiver<RealtimeEvent>;

/// Frames queued for the writer task.
#[derive(Debug)]
enum Outgoing {
    Packet(Packet),
    Close,
}

/// An established Socket.IO connection.
///
/// Dropping the connection disconnects it.
pub struct RealtimeConnection {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    connected: Arc<AtomicBool>,
    handshake: Handshake,
    reader: JoinHandle<()>,
}

impl RealtimeConnection {
    /// Connect to the backend's Socket.IO endpoint.
    ///
    /// Completes once the default namespace has acknowledged the connection.
    /// The whole handshake is bounded by the configured request timeout.
    pub async fn connect(
        config: &ClientConfig,
        token: Option<&SecretString>,
    ) -> Result<(Self, EventReceiver), ClientError> {
        let url = config.socket_url();
        info!("Connecting to real-time channel at {}", url);

        let mut request = url.as_str().into_client_request()?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| ClientError::Config(format!("invalid auth token: {}", e)))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (stream, handshake) = timeout(config.request_timeout, async {
            let (stream, _) = connect_async(request).await.map_err(ClientError::WebSocket)?;
            Self::open_session(stream).await
        })
        .await
        .map_err(|_| ClientError::Timeout)??;

        let (sink, source) = stream.split();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::write_loop(sink, outgoing_rx, connected.clone()));
        let reader = tokio::spawn(Self::read_loop(
            source,
            event_tx,
            outgoing_tx.clone(),
            connected.clone(),
        ));

        info!("Real-time channel connected (sid={})", handshake.sid);
        Ok((
            Self {
                outgoing: outgoing_tx,
                connected,
                handshake,
                reader,
            },
            event_rx,
        ))
    }

    /// Engine.IO open, then Socket.IO namespace connect.
    async fn open_session(mut stream: WsStream) -> Result<(WsStream, Handshake), ClientError> {
        let handshake = loop {
            match Self::next_packet(&mut stream).await? {
                Packet::Open(handshake) => break handshake,
                other => debug!("Ignoring {:?} before open", other),
            }
        };
        debug!(
            "Engine.IO open: sid={}, ping_interval={}ms",
            handshake.sid, handshake.ping_interval
        );

        stream
            .send(WsMessage::Text(Packet::Connect(None).encode()))
            .await?;

        loop {
            match Self::next_packet(&mut stream).await? {
                Packet::Connect(_) => break,
                Packet::ConnectError(message) => return Err(ClientError::Auth(message)),
                Packet::Ping => {
                    stream.send(WsMessage::Text(Packet::Pong.encode())).await?;
                }
                Packet::Close | Packet::Disconnect => {
                    return Err(ClientError::Protocol(
                        "server closed during handshake".to_string(),
                    ))
                }
                other => debug!("Ignoring {:?} before namespace ack", other),
            }
        }

        Ok((stream, handshake))
    }

    async fn next_packet(stream: &mut WsStream) -> Result<Packet, ClientError> {
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return Packet::decode(&text),
                Some(Ok(WsMessage::Close(_))) | None => {
                    return Err(ClientError::Protocol(
                        "connection closed during handshake".to_string(),
                    ))
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ClientError::WebSocket(e)),
            }
        }
    }

    async fn read_loop(
        mut source: WsSource,
        events: mpsc::UnboundedSender<RealtimeEvent>,
        outgoing: mpsc::UnboundedSender<Outgoing>,
        connected: Arc<AtomicBool>,
    ) {
        while let Some(frame) = source.next().await {
            let text = match frame {
                Ok(WsMessage::Text(text)) => text,
                Ok(WsMessage::Close(_)) => {
                    info!("Real-time channel closed by server");
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("Real-time channel error: {}", e);
                    break;
                }
            };

            let packet = match Packet::decode(&text) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Failed to decode frame: {}", e);
                    debug!("Raw frame: {}", text);
                    continue;
                }
            };

            match packet {
                Packet::Ping => {
                    let _ = outgoing.send(Outgoing::Packet(Packet::Pong));
                }
                Packet::Event { name, data } => match RealtimeEvent::from_parts(&name, data) {
                    Ok(event) => {
                        debug!("Received event: {}", event.name());
                        if events.send(event).is_err() {
                            debug!("Event receiver dropped");
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to parse {} event: {}", name, e),
                },
                Packet::Disconnect | Packet::Close => {
                    info!("Server ended the real-time session");
                    break;
                }
                Packet::ConnectError(message) => {
                    warn!("Real-time connect error: {}", message);
                    break;
                }
                other => debug!("Ignoring {:?}", other),
            }
        }

        connected.store(false, Ordering::SeqCst);
        let _ = outgoing.send(Outgoing::Close);
    }

    async fn write_loop(
        mut sink: WsSink,
        mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
        connected: Arc<AtomicBool>,
    ) {
        while let Some(item) = outgoing.recv().await {
            match item {
                Outgoing::Packet(packet) => {
                    let frame = packet.encode();
                    debug!("Sending frame: {}", frame);
                    if let Err(e) = sink.send(WsMessage::Text(frame)).await {
                        error!("Failed to send frame: {}", e);
                        break;
                    }
                }
                Outgoing::Close => {
                    let _ = sink.send(WsMessage::Text(Packet::Disconnect.encode())).await;
                    let _ = sink.close().await;
                    break;
                }
            }
        }
        connected.store(false, Ordering::SeqCst);
    }

    /// Queue an event for sending. Fails only if the connection is gone.
    pub fn emit(&self, event: OutboundEvent) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.outgoing
            .send(Outgoing::Packet(Packet::event(event.name(), event.payload())))
            .map_err(|_| ClientError::NotConnected)
    }

    /// Whether the connection is still up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Engine.IO session parameters.
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Tear the connection down. Safe to call more than once.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Disconnecting real-time channel");
            let _ = self.outgoing.send(Outgoing::Close);
        }
        self.reader.abort();
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for RealtimeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConnection")
            .field("sid", &self.handshake.sid)
            .field("connected", &self.is_connected())
            .finish()
    }
}
