//! Wire protocol for the per-turn event stream.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::api::sse::SseEvent;
use crate::session::error::ProtocolViolation;
use crate::session::stats::CollaborationStats;
use crate::session::types::{ParticipantId, SessionId};

pub const CONNECTED_EVENT: &str = "connected";
pub const RESPONSE_EVENT: &str = "response";
pub const MODEL_COMPLETE_EVENT: &str = "model_complete";
pub const ALL_COMPLETE_EVENT: &str = "all_complete";
pub const ERROR_EVENT: &str = "error";

const DEFAULT_SYNAPSE_KIND: &str = "building";
const DEFAULT_SERVER_ERROR: &str = "Stream error";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Response,
    Synthesis,
    Analysis,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseSignal {
    #[serde(default)]
    pub detected: bool,
    #[serde(default)]
    pub building_on: Option<ParticipantId>,
    #[serde(rename = "type", default = "default_synapse_kind")]
    pub kind: String,
    #[serde(default)]
    pub strength: Option<f64>,
}

fn default_synapse_kind() -> String {
    DEFAULT_SYNAPSE_KIND.to_string()
}

impl SynapseSignal {
    /// The participant this output built on, if the signal qualifies as an edge.
    pub fn source(&self) -> Option<&ParticipantId> {
        if !self.detected {
            return None;
        }
        self.building_on.as_ref().filter(|id| !id.0.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    pub session_id: SessionId,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub model: ParticipantId,
    /// A delta appended to what was already received, never a replacement.
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synapse: Option<SynapseSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCompletePayload {
    pub model: ParticipantId,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllCompletePayload {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub stats: CollaborationStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

impl ErrorPayload {
    pub fn message(&self) -> &str {
        self.error
            .as_deref()
            .filter(|msg| !msg.is_empty())
            .unwrap_or(DEFAULT_SERVER_ERROR)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected(ConnectedPayload),
    Response(ResponsePayload),
    ModelComplete(ModelCompletePayload),
    AllComplete(AllCompletePayload),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn decode(event: &SseEvent) -> Result<Self, ProtocolViolation> {
        let name = event.event_type.as_deref().unwrap_or("message");
        match name {
            CONNECTED_EVENT => parse(name, &event.data).map(ServerEvent::Connected),
            RESPONSE_EVENT => parse(name, &event.data).map(ServerEvent::Response),
            MODEL_COMPLETE_EVENT => parse(name, &event.data).map(ServerEvent::ModelComplete),
            ALL_COMPLETE_EVENT => parse(name, &event.data).map(ServerEvent::AllComplete),
            ERROR_EVENT => parse(name, &event.data).map(ServerEvent::Error),
            other => Err(ProtocolViolation::UnknownEvent {
                name: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => CONNECTED_EVENT,
            ServerEvent::Response(_) => RESPONSE_EVENT,
            ServerEvent::ModelComplete(_) => MODEL_COMPLETE_EVENT,
            ServerEvent::AllComplete(_) => ALL_COMPLETE_EVENT,
            ServerEvent::Error(_) => ERROR_EVENT,
        }
    }

    pub fn participant(&self) -> Option<&ParticipantId> {
        match self {
            ServerEvent::Response(payload) => Some(&payload.model),
            ServerEvent::ModelComplete(payload) => Some(&payload.model),
            _ => None,
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(event: &str, data: &str) -> Result<T, ProtocolViolation> {
    serde_json::from_str(data).map_err(|e| ProtocolViolation::MalformedPayload {
        event: event.to_string(),
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_response_with_synapse() {
        let event = SseEvent::named(
            RESPONSE_EVENT,
            r#"{"model":"m2","content":"Agreed","type":"synthesis","complete":false,
                "synapse":{"detected":true,"building_on":"m1"}}"#,
        );

        let ServerEvent::Response(payload) = ServerEvent::decode(&event).unwrap() else {
            panic!("expected response event");
        };
        assert_eq!(payload.model, ParticipantId::new("m2"));
        assert_eq!(payload.kind, MessageKind::Synthesis);
        let synapse = payload.synapse.unwrap();
        assert_eq!(synapse.kind, "building");
        assert_eq!(synapse.source(), Some(&ParticipantId::new("m1")));
    }

    #[test]
    fn undetected_or_empty_synapse_has_no_source() {
        let undetected = SynapseSignal {
            detected: false,
            building_on: Some(ParticipantId::new("m1")),
            kind: default_synapse_kind(),
            strength: None,
        };
        assert!(undetected.source().is_none());

        let empty = SynapseSignal {
            detected: true,
            building_on: Some(ParticipantId::new("")),
            ..undetected
        };
        assert!(empty.source().is_none());
    }

    #[test]
    fn unknown_kind_is_a_violation() {
        let event = SseEvent::named(
            RESPONSE_EVENT,
            r#"{"model":"m1","content":"x","type":"poetry","complete":false}"#,
        );
        assert!(matches!(
            ServerEvent::decode(&event),
            Err(ProtocolViolation::MalformedPayload { .. })
        ));
    }

    #[test]
    fn unnamed_and_unknown_events_are_rejected() {
        let unnamed = SseEvent {
            event_type: None,
            data: "{}".into(),
            id: None,
        };
        assert_eq!(
            ServerEvent::decode(&unnamed),
            Err(ProtocolViolation::UnknownEvent {
                name: "message".into()
            })
        );
        assert!(matches!(
            ServerEvent::decode(&SseEvent::named("heartbeat", "{}")),
            Err(ProtocolViolation::UnknownEvent { .. })
        ));
    }

    #[test]
    fn decoded_events_report_their_wire_name_and_participant() {
        let complete = ServerEvent::decode(&SseEvent::named(
            MODEL_COMPLETE_EVENT,
            r#"{"model":"m1","timestamp":"2024-01-01T00:00:00"}"#,
        ))
        .unwrap();
        assert_eq!(complete.name(), MODEL_COMPLETE_EVENT);
        assert_eq!(complete.participant(), Some(&ParticipantId::new("m1")));

        let connected =
            ServerEvent::decode(&SseEvent::named(CONNECTED_EVENT, r#"{"session_id":"s1"}"#))
                .unwrap();
        assert_eq!(connected.name(), CONNECTED_EVENT);
        assert_eq!(connected.participant(), None);
    }

    #[test]
    fn all_complete_tolerates_empty_stats() {
        let event = SseEvent::named(ALL_COMPLETE_EVENT, r#"{"session_id":"s1","stats":{}}"#);
        let ServerEvent::AllComplete(payload) = ServerEvent::decode(&event).unwrap() else {
            panic!("expected all_complete event");
        };
        assert_eq!(payload.stats, CollaborationStats::default());
    }

    #[test]
    fn error_without_message_falls_back() {
        let event = SseEvent::named(ERROR_EVENT, r#"{"session_id":"s1"}"#);
        let ServerEvent::Error(payload) = ServerEvent::decode(&event).unwrap() else {
            panic!("expected error event");
        };
        assert_eq!(payload.message(), "Stream error");
    }
}
