// illustrator-relay/src/protocol/mod.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Wire types exchanged with the proxy.
//!
//! Every event payload is a JSON object. Field names follow the proxy's
//! camelCase convention (`senderId`, `colorSpace`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const EVENT_REGISTER: &str = "register";
pub const EVENT_REGISTRATION_RESPONSE: &str = "registration_response";
pub const EVENT_COMMAND_PACKET: &str = "command_packet";
pub const EVENT_COMMAND_PACKET_RESPONSE: &str = "command_packet_response";

/// A single action request. `params` is handler-specific.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Command {
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl Command {
    pub fn new(action: &str, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => Some(map),
            _ => None,
        };
        Self {
            action: action.to_string(),
            params,
        }
    }

    /// Parameters, or an empty mapping when the sender omitted them.
    pub fn params_or_empty(&self) -> Map<String, Value> {
        self.params.clone().unwrap_or_default()
    }
}

/// Inbound `command_packet` payload.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommandPacket {
    pub sender_id: String,
    pub command: Command,
}

/// Outbound `register` payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegisterPayload {
    pub application: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Failure,
}

/// Read-only projection of the active document attached to every envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentSummary {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub artboards: usize,
    pub layers: usize,
}

/// Result of `getDocumentInfo`: the summary plus color space and selection count.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    pub color_space: String,
    pub selection: usize,
}

/// Reply to one command packet.
///
/// Built only through [`ResponseEnvelope::success`] and [`ResponseEnvelope::failure`],
/// so exactly one of `response` / `message` is ever set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub sender_id: String,
    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentSummary>,
}

impl ResponseEnvelope {
    pub fn success(sender_id: &str, response: Value, document: Option<DocumentSummary>) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            status: Status::Success,
            response: Some(response),
            message: None,
            document,
        }
    }

    pub fn failure(sender_id: &str, message: String, document: Option<DocumentSummary>) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            status: Status::Failure,
            response: None,
            message: Some(message),
            document,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Outbound `command_packet_response` payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResponsePacket {
    pub packet: ResponseEnvelope,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_packet_from_wire() {
        let packet: CommandPacket = serde_json::from_value(json!({
            "senderId": "abc",
            "command": {"action": "createShape", "params": {"type": "rectangle"}}
        }))
        .unwrap();

        assert_eq!(packet.sender_id, "abc");
        assert_eq!(packet.command.action, "createShape");
        assert_eq!(packet.command.params_or_empty()["type"], "rectangle");
    }

    #[test]
    fn test_missing_params_is_empty_mapping() {
        let command: Command = serde_json::from_value(json!({"action": "getDocumentInfo"})).unwrap();
        assert!(command.params.is_none());
        assert!(command.params_or_empty().is_empty());
    }

    #[test]
    fn test_success_envelope_has_no_message() {
        let env = ResponseEnvelope::success("abc", json!({"shapeId": "1"}), None);
        let wire = serde_json::to_value(ResponsePacket { packet: env }).unwrap();

        assert_eq!(
            wire,
            json!({"packet": {"senderId": "abc", "status": "SUCCESS", "response": {"shapeId": "1"}}})
        );
    }

    #[test]
    fn test_failure_envelope_has_no_response() {
        let doc = DocumentSummary {
            name: "Untitled".to_string(),
            width: 800.0,
            height: 600.0,
            artboards: 1,
            layers: 1,
        };
        let env = ResponseEnvelope::failure("abc", "Error calling x : boom".to_string(), Some(doc));
        let wire = serde_json::to_value(&env).unwrap();

        assert_eq!(wire["status"], "FAILURE");
        assert_eq!(wire["message"], "Error calling x : boom");
        assert!(wire.get("response").is_none());
        assert_eq!(wire["document"]["artboards"], 1);
    }

    #[test]
    fn test_document_info_is_flat() {
        let info = DocumentInfo {
            summary: DocumentSummary {
                name: "Poster".to_string(),
                width: 100.0,
                height: 200.0,
                artboards: 1,
                layers: 2,
            },
            color_space: "RGB".to_string(),
            selection: 0,
        };
        let wire = serde_json::to_value(&info).unwrap();
        assert_eq!(wire["name"], "Poster");
        assert_eq!(wire["colorSpace"], "RGB");
        assert_eq!(wire["layers"], 2);
    }
}
