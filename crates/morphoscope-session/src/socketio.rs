//! Socket.IO (protocol v5) over Engine.IO (v4) text frames, sans-IO.
//!
//! Only the subset the client needs over the WebSocket transport:
//!
//! | Frame        | Meaning                                    |
//! |--------------|--------------------------------------------|
//! | `0{...}`     | Engine.IO open (handshake)                 |
//! | `1`          | Engine.IO close                            |
//! | `2` / `3`    | ping / pong (server pings, client pongs)   |
//! | `6`          | noop                                       |
//! | `40[/ns,]{}` | Socket.IO connect to namespace             |
//! | `41`         | Socket.IO disconnect                       |
//! | `42[id][..]` | Socket.IO event `["name", payload, ...]`   |
//! | `44{...}`    | Socket.IO connect error                    |
//!
//! Binary packets and acknowledgements are decoded as
//! [`Packet::Unsupported`] and ignored by the channel.

use serde::Deserialize;
use serde_json::Value;

use crate::error::FrameError;

/// Frame the client sends to join the default namespace.
pub const CONNECT_DEFAULT_NAMESPACE: &str = "40";

/// Frame the client sends to leave the default namespace.
pub const DISCONNECT_DEFAULT_NAMESPACE: &str = "41";

/// Engine.IO pong, the answer to a server ping.
pub const PONG: &str = "3";

/// Engine.IO handshake sent by the server on open.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

/// A decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    /// Joined `namespace` (`"/"` for the default one).
    Connect { namespace: String },
    Disconnect { namespace: String },
    /// A named event with its first argument (`Null` if none).
    Event {
        namespace: String,
        name: String,
        payload: Value,
    },
    ConnectError { namespace: String, message: String },
    /// Valid frame the client does not act on (upgrade, ack, binary).
    Unsupported(char),
}

/// Decode one WebSocket text frame.
///
/// # Errors
///
/// - [`FrameError::Empty`] for an empty frame.
/// - [`FrameError::UnknownPacket`] for an unknown Engine.IO or Socket.IO
///   packet type.
/// - [`FrameError::InvalidPayload`] for malformed JSON or an event whose
///   first element is not a string.
pub fn decode(frame: &str) -> Result<Packet, FrameError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => serde_json::from_str(rest)
            .map(Packet::Open)
            .map_err(|e| FrameError::InvalidPayload(format!("handshake: {e}"))),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_message(rest),
        '5' => Ok(Packet::Unsupported('5')),
        '6' => Ok(Packet::Noop),
        other => Err(FrameError::UnknownPacket(other)),
    }
}

/// Decode the Socket.IO packet carried by an Engine.IO message.
fn decode_message(body: &str) -> Result<Packet, FrameError> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let (namespace, rest) = split_namespace(chars.as_str());
    match kind {
        '0' => Ok(Packet::Connect { namespace }),
        '1' => Ok(Packet::Disconnect { namespace }),
        '2' => decode_event(namespace, skip_ack_id(rest)),
        '3' | '5' | '6' => Ok(Packet::Unsupported(kind)),
        '4' => {
            let message = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
                .unwrap_or_else(|| rest.to_owned());
            Ok(Packet::ConnectError { namespace, message })
        }
        other => Err(FrameError::UnknownPacket(other)),
    }
}

/// Split an optional `/namespace,` prefix.
fn split_namespace(body: &str) -> (String, &str) {
    if body.starts_with('/') {
        match body.split_once(',') {
            Some((ns, rest)) => (ns.to_owned(), rest),
            None => (body.to_owned(), ""),
        }
    } else {
        (String::from("/"), body)
    }
}

fn skip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(namespace: String, body: &str) -> Result<Packet, FrameError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FrameError::InvalidPayload(format!("event: {e}")))?;
    let Value::Array(mut items) = value else {
        return Err(FrameError::InvalidPayload("event is not an array".into()));
    };
    if items.is_empty() {
        return Err(FrameError::InvalidPayload("event has no name".into()));
    }
    let payload = if items.len() > 1 {
        items.swap_remove(1)
    } else {
        Value::Null
    };
    let Value::String(name) = items.swap_remove(0) else {
        return Err(FrameError::InvalidPayload("event name is not a string".into()));
    };
    Ok(Packet::Event {
        namespace,
        name,
        payload,
    })
}

/// Encode an event for the default namespace.
///
/// # Errors
///
/// Returns [`FrameError::InvalidPayload`] if the payload cannot be
/// serialized (non-string map keys and the like).
pub fn encode_event(name: &str, payload: &Value) -> Result<String, FrameError> {
    let body = serde_json::to_string(&(name, payload))
        .map_err(|e| FrameError::InvalidPayload(e.to_string()))?;
    Ok(format!("42{body}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_handshake() {
        let packet =
            decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#)
                .unwrap();
        assert_eq!(
            packet,
            Packet::Open(Handshake {
                sid: "abc".into(),
                ping_interval: 25_000,
                ping_timeout: 20_000,
            })
        );
    }

    #[test]
    fn decodes_control_frames() {
        assert_eq!(decode("1").unwrap(), Packet::Close);
        assert_eq!(decode("2").unwrap(), Packet::Ping);
        assert_eq!(decode("3").unwrap(), Packet::Pong);
        assert_eq!(decode("6").unwrap(), Packet::Noop);
    }

    #[test]
    fn decodes_namespace_connect() {
        assert_eq!(
            decode(r#"40{"sid":"xyz"}"#).unwrap(),
            Packet::Connect {
                namespace: "/".into()
            }
        );
        assert_eq!(
            decode("40/admin,").unwrap(),
            Packet::Connect {
                namespace: "/admin".into()
            }
        );
    }

    #[test]
    fn decodes_event_with_payload() {
        let packet = decode(r#"42["nueva_data",{"frame":3,"regiones":[[],[]]}]"#).unwrap();
        assert_eq!(
            packet,
            Packet::Event {
                namespace: "/".into(),
                name: "nueva_data".into(),
                payload: json!({"frame": 3, "regiones": [[], []]}),
            }
        );
    }

    #[test]
    fn decodes_event_without_payload_and_with_ack_id() {
        assert_eq!(
            decode(r#"4217["stop_procesamiento"]"#).unwrap(),
            Packet::Event {
                namespace: "/".into(),
                name: "stop_procesamiento".into(),
                payload: Value::Null,
            }
        );
    }

    #[test]
    fn decodes_connect_error_message() {
        assert_eq!(
            decode(r#"44{"message":"Not authorized"}"#).unwrap(),
            Packet::ConnectError {
                namespace: "/".into(),
                message: "Not authorized".into()
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(decode(""), Err(FrameError::Empty));
        assert_eq!(decode("9"), Err(FrameError::UnknownPacket('9')));
        assert!(matches!(decode("42{}"), Err(FrameError::InvalidPayload(_))));
        assert!(matches!(decode("42[1]"), Err(FrameError::InvalidPayload(_))));
        assert!(matches!(decode("42[]"), Err(FrameError::InvalidPayload(_))));
    }

    #[test]
    fn binary_and_ack_packets_are_unsupported() {
        assert_eq!(decode("43[]").unwrap(), Packet::Unsupported('3'));
        assert_eq!(decode("451-[]").unwrap(), Packet::Unsupported('5'));
    }

    #[test]
    fn encodes_start_event() {
        let frame = encode_event(
            "procesar_y_graficar",
            &json!({"file_path": "uploads/a.png", "con_traslape": false}),
        )
        .unwrap();
        assert_eq!(
            frame,
            r#"42["procesar_y_graficar",{"con_traslape":false,"file_path":"uploads/a.png"}]"#
        );
    }
}
