//! Socket.IO v4 / Engine.IO v4 text packet codec.
//!
//! Only the subset the backend speaks over a WebSocket transport is
//! supported: text frames, the default namespace, no binary attachments.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ClientError;

/// Engine.IO open handshake sent by the server as the first frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,

    #[serde(default)]
    pub upgrades: Vec<String>,

    /// Milliseconds between server pings.
    #[serde(default)]
    pub ping_interval: u64,

    /// Milliseconds the server waits for a pong.
    #[serde(default)]
    pub ping_timeout: u64,

    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// A decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// `0{...}`
    Open(Handshake),
    /// `1`
    Close,
    /// `2`
    Ping,
    /// `3`
    Pong,
    /// `40` or `40{...}`: namespace connect request / acknowledgement.
    Connect(Option<Value>),
    /// `41`
    Disconnect,
    /// `42["name", data]`
    Event { name: String, data: Value },
    /// `44{"message": ...}`
    ConnectError(String),
    /// `6`
    Noop,
}

impl Packet {
    /// Build an event packet.
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Packet::Event {
            name: name.into(),
            data,
        }
    }

    /// Decode a WebSocket text frame.
    pub fn decode(frame: &str) -> Result<Self, ClientError> {
        let mut chars = frame.chars();
        let engine = chars
            .next()
            .ok_or_else(|| ClientError::Protocol("empty frame".to_string()))?;
        let rest = chars.as_str();

        match engine {
            '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '4' => decode_socket(rest),
            '6' => Ok(Packet::Noop),
            other => Err(ClientError::Protocol(format!(
                "unsupported engine packet type {:?}",
                other
            ))),
        }
    }

    /// Encode as a WebSocket text frame.
    pub fn encode(&self) -> String {
        match self {
            Packet::Open(handshake) => format!(
                "0{}",
                serde_json::json!({
                    "sid": handshake.sid,
                    "upgrades": handshake.upgrades,
                    "pingInterval": handshake.ping_interval,
                    "pingTimeout": handshake.ping_timeout,
                })
            ),
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Connect(None) => "40".to_string(),
            Packet::Connect(Some(data)) => format!("40{}", data),
            Packet::Disconnect => "41".to_string(),
            Packet::Event { name, data } => {
                format!("42{}", Value::Array(vec![Value::String(name.clone()), data.clone()]))
            }
            Packet::ConnectError(message) => {
                format!("44{}", serde_json::json!({ "message": message }))
            }
            Packet::Noop => "6".to_string(),
        }
    }
}

fn decode_socket(body: &str) -> Result<Packet, ClientError> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ClientError::Protocol("missing socket packet type".to_string()))?;
    let payload = strip_namespace(chars.as_str());

    match kind {
        '0' => {
            if payload.is_empty() {
                Ok(Packet::Connect(None))
            } else {
                Ok(Packet::Connect(Some(serde_json::from_str(payload)?)))
            }
        }
        '1' => Ok(Packet::Disconnect),
        '2' => {
            // Optional ack id precedes the array.
            let payload = payload.trim_start_matches(|c: char| c.is_ascii_digit());
            let mut args: Vec<Value> = serde_json::from_str(payload)?;
            if args.is_empty() {
                return Err(ClientError::Protocol("event without a name".to_string()));
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(ClientError::Protocol(format!(
                        "event name is not a string: {}",
                        other
                    )))
                }
            };
            let data = if args.is_empty() {
                Value::Null
            } else {
                args.remove(0)
            };
            Ok(Packet::Event { name, data })
        }
        '4' => {
            let message = serde_json::from_str::<Value>(payload)
                .ok()
                .and_then(|v| match v {
                    Value::String(s) => Some(s),
                    other => other.get("message").and_then(Value::as_str).map(str::to_string),
                })
                .unwrap_or_else(|| payload.to_string());
            Ok(Packet::ConnectError(message))
        }
        other => Err(ClientError::Protocol(format!(
            "unsupported socket packet type {:?}",
            other
        ))),
    }
}

/// Drop a `/namespace,` prefix.
fn strip_namespace(payload: &str) -> &str {
    if payload.starts_with('/') {
        match payload.find(',') {
            Some(idx) => &payload[idx + 1..],
            None => "",
        }
    } else {
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let frame = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        let Packet::Open(handshake) = Packet::decode(frame).unwrap() else {
            panic!("expected open");
        };
        assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(handshake.ping_interval, 25000);
        assert_eq!(handshake.max_payload, Some(1_000_000));
    }

    #[test]
    fn test_decode_control_packets() {
        assert_eq!(Packet::decode("2").unwrap(), Packet::Ping);
        assert_eq!(Packet::decode("3").unwrap(), Packet::Pong);
        assert_eq!(Packet::decode("1").unwrap(), Packet::Close);
        assert_eq!(Packet::decode("6").unwrap(), Packet::Noop);
        assert_eq!(Packet::decode("41").unwrap(), Packet::Disconnect);
        assert_eq!(Packet::decode("40").unwrap(), Packet::Connect(None));
        assert_eq!(
            Packet::decode(r#"40{"sid":"abc"}"#).unwrap(),
            Packet::Connect(Some(json!({"sid": "abc"})))
        );
    }

    #[test]
    fn test_decode_event() {
        let packet = Packet::decode(r#"42["new_message",{"id":1,"conversationId":3}]"#).unwrap();
        assert_eq!(
            packet,
            Packet::event("new_message", json!({"id": 1, "conversationId": 3}))
        );
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack() {
        let packet = Packet::decode(r#"42/chat,17["joined",{"room":"school_1"}]"#).unwrap();
        assert_eq!(packet, Packet::event("joined", json!({"room": "school_1"})));

        let bare = Packet::decode(r#"42["ping_me"]"#).unwrap();
        assert_eq!(bare, Packet::event("ping_me", Value::Null));
    }

    #[test]
    fn test_decode_connect_error() {
        let packet = Packet::decode(r#"44{"message":"Not authorized"}"#).unwrap();
        assert_eq!(packet, Packet::ConnectError("Not authorized".to_string()));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Packet::decode("").is_err());
        assert!(Packet::decode("9").is_err());
        assert!(Packet::decode("42[]").is_err());
        assert!(Packet::decode("42[5]").is_err());
        assert!(Packet::decode("45-[\"bin\"]").is_err());
    }

    #[test]
    fn test_encode() {
        assert_eq!(Packet::Connect(None).encode(), "40");
        assert_eq!(Packet::Pong.encode(), "3");
        assert_eq!(Packet::Disconnect.encode(), "41");
        assert_eq!(
            Packet::event("join_school", json!({"schoolId": 4})).encode(),
            r#"42["join_school",{"schoolId":4}]"#
        );
    }
}
