use thiserror::Error;

use crate::session::types::{Generation, ParticipantId};

/// Inbound payload problems. Recovered locally: the event is skipped and
/// counted, the session keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("unrecognized event name: {name}")]
    UnknownEvent { name: String },

    #[error("malformed {event} payload: {details}")]
    MalformedPayload { event: String, details: String },

    #[error("delta for {participant} received after completion")]
    DeltaAfterCompletion { participant: ParticipantId },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(String),

    /// Message carried by an explicit `error` event, shown verbatim.
    #[error("{0}")]
    ServerReported(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    #[error("stale event from {event} dropped (active {active})")]
    StaleEventDropped {
        event: Generation,
        active: Generation,
    },
}

impl SessionError {
    /// Errors that occupy the last-error slot and move the session to Errored.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(_) | SessionError::ServerReported(_)
        )
    }
}
