// illustrator-relay/src/connection/socketio.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Minimal Socket.IO v5 client framing over the Engine.IO v4 websocket transport.
//!
//! Only the default namespace and text packets are supported. Each websocket
//! text frame carries one Engine.IO packet: a single type digit followed by
//! its payload. Engine.IO `message` packets (`4`) in turn carry one Socket.IO
//! packet, again prefixed by a type digit.

use serde_json::Value;
use url::Url;

use crate::error::{RelayError, Result as RelayResult};

/// Socket.IO CONNECT for the default namespace, wrapped in an Engine.IO message.
pub const CONNECT: &str = "40";

/// Socket.IO DISCONNECT for the default namespace.
pub const DISCONNECT: &str = "41";

/// Engine.IO pong, the answer to a server ping.
pub const PONG: &str = "3";

/// Engine.IO packets the client cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// Handshake with `sid`, `pingInterval`, `pingTimeout`.
    Open(Value),
    Close,
    Ping,
    Pong,
    Message(String),
    Upgrade,
    Noop,
}

/// Socket.IO packets on the default namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Namespace connected; carries the socket id when the server sends one.
    Connect(Option<String>),
    Disconnect,
    Event {
        name: String,
        data: Value,
        ack_id: Option<u64>,
    },
    Ack,
    ConnectError(Value),
    /// Binary packets and other namespaces.
    Unsupported(String),
}

/// Websocket URL for a proxy endpoint such as `http://localhost:3001`.
pub fn websocket_url(endpoint: &str) -> RelayResult<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| RelayError::Config(format!("invalid proxy url {}: {}", endpoint, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RelayError::Config(format!(
                "unsupported proxy url scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RelayError::Config(format!("cannot use {} for {}", scheme, endpoint)))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/socket.io/");
    }
    url.query_pairs_mut()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");

    Ok(url)
}

pub fn parse_engine(frame: &str) -> RelayResult<EnginePacket> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| RelayError::Transport("empty Engine.IO packet".to_string()))?;
    let payload = chars.as_str();

    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(payload)?)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => Ok(EnginePacket::Message(payload.to_string())),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(RelayError::Transport(format!(
            "unknown Engine.IO packet type: {}",
            other
        ))),
    }
}

pub fn parse_socket(payload: &str) -> RelayResult<SocketPacket> {
    let mut chars = payload.chars();
    let kind = chars
        .next()
        .ok_or_else(|| RelayError::Transport("empty Socket.IO packet".to_string()))?;
    let rest = chars.as_str();

    if rest.starts_with('/') {
        return Ok(SocketPacket::Unsupported(payload.to_string()));
    }

    match kind {
        '0' => {
            let sid = if rest.is_empty() {
                None
            } else {
                let data: Value = serde_json::from_str(rest)?;
                data.get("sid").and_then(Value::as_str).map(str::to_string)
            };
            Ok(SocketPacket::Connect(sid))
        }
        '1' => Ok(SocketPacket::Disconnect),
        '2' => parse_event(rest),
        '3' => Ok(SocketPacket::Ack),
        '4' => {
            let data = if rest.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(rest)?
            };
            Ok(SocketPacket::ConnectError(data))
        }
        '5' | '6' => Ok(SocketPacket::Unsupported(payload.to_string())),
        other => Err(RelayError::Transport(format!(
            "unknown Socket.IO packet type: {}",
            other
        ))),
    }
}

fn parse_event(rest: &str) -> RelayResult<SocketPacket> {
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    let ack_id = if digits > 0 {
        rest[..digits].parse::<u64>().ok()
    } else {
        None
    };

    let args: Vec<Value> = serde_json::from_str(&rest[digits..])?;
    let mut args = args.into_iter();
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return Err(RelayError::Transport("event without a name".to_string())),
    };

    Ok(SocketPacket::Event {
        name,
        data: args.next().unwrap_or(Value::Null),
        ack_id,
    })
}

/// Text frame emitting `name` with a single argument.
pub fn encode_event(name: &str, data: &Value) -> RelayResult<String> {
    let args = serde_json::to_string(&(name, data))?;
    Ok(format!("42{}", args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_websocket_url_from_http() {
        let url = websocket_url("http://localhost:3001").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:3001/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_websocket_url_keeps_custom_path() {
        let url = websocket_url("https://proxy.local/relay/").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://proxy.local/relay/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_websocket_url_rejects_other_schemes() {
        assert!(matches!(websocket_url("ftp://localhost"), Err(RelayError::Config(_))));
        assert!(websocket_url("not a url").is_err());
    }

    #[test]
    fn test_parse_engine_packets() {
        match parse_engine("0{\"sid\":\"abc\",\"pingInterval\":25000}").unwrap() {
            EnginePacket::Open(data) => assert_eq!(data["sid"], "abc"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(parse_engine("2").unwrap(), EnginePacket::Ping);
        assert_eq!(parse_engine("1").unwrap(), EnginePacket::Close);
        assert_eq!(parse_engine("40").unwrap(), EnginePacket::Message("0".to_string()));
        assert!(parse_engine("").is_err());
        assert!(parse_engine("9").is_err());
    }

    #[test]
    fn test_parse_connect_with_sid() {
        assert_eq!(
            parse_socket("0{\"sid\":\"xyz\"}").unwrap(),
            SocketPacket::Connect(Some("xyz".to_string()))
        );
        assert_eq!(parse_socket("0").unwrap(), SocketPacket::Connect(None));
    }

    #[test]
    fn test_parse_event_with_payload() {
        let packet = parse_socket("2[\"command_packet\",{\"senderId\":\"abc\"}]").unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "command_packet".to_string(),
                data: json!({"senderId": "abc"}),
                ack_id: None,
            }
        );
    }

    #[test]
    fn test_parse_event_with_ack_id_and_no_args() {
        let packet = parse_socket("212[\"registration_response\"]").unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "registration_response".to_string(),
                data: Value::Null,
                ack_id: Some(12),
            }
        );
    }

    #[test]
    fn test_parse_connect_error() {
        assert_eq!(
            parse_socket("4{\"message\":\"Not authorized\"}").unwrap(),
            SocketPacket::ConnectError(json!({"message": "Not authorized"}))
        );
    }

    #[test]
    fn test_other_namespace_is_unsupported() {
        assert!(matches!(
            parse_socket("2/admin,[\"x\"]").unwrap(),
            SocketPacket::Unsupported(_)
        ));
    }

    #[test]
    fn test_encode_event() {
        let frame = encode_event("register", &json!({"application": "illustrator"})).unwrap();
        assert_eq!(frame, "42[\"register\",{\"application\":\"illustrator\"}]");
    }
}
