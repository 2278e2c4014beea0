use serde::Serialize;
use std::collections::HashMap;
use strum::Display;

use crate::session::assembler::{MessageAssembler, ParticipantStream};
use crate::session::error::SessionError;
use crate::session::reconciler::ConversationEntry;
use crate::session::stats::{CollaborationStats, LocalTally};
use crate::session::synapse::SynapseEdge;
use crate::session::types::{Generation, ParticipantId, SessionId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Errored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Completed,
    Errored,
}

impl TurnPhase {
    pub fn is_active(self) -> bool {
        matches!(self, TurnPhase::Sending | TurnPhase::Streaming)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantActivity {
    #[default]
    Standby,
    Thinking,
    Responding,
    Complete,
    Error,
}

/// Everything scoped to one turn. Replaced wholesale on `send()`.
#[derive(Debug, Clone, Default)]
pub struct TurnArena {
    pub generation: Generation,
    pub assembler: MessageAssembler,
    pub activity: HashMap<ParticipantId, ParticipantActivity>,
}

impl TurnArena {
    pub fn new(generation: Generation, roster: &[ParticipantId]) -> Self {
        Self {
            generation,
            assembler: MessageAssembler::new(),
            activity: roster
                .iter()
                .map(|id| (id.clone(), ParticipantActivity::Thinking))
                .collect(),
        }
    }

    pub fn set_activity(&mut self, participant: &ParticipantId, activity: ParticipantActivity) {
        self.activity.insert(participant.clone(), activity);
    }

    /// Marks every participant that has not finished as errored.
    pub fn fail_unfinished(&mut self) {
        for activity in self.activity.values_mut() {
            if *activity != ParticipantActivity::Complete {
                *activity = ParticipantActivity::Error;
            }
        }
        for stream in self.assembler.streams() {
            if !stream.complete {
                self.activity
                    .insert(stream.participant.clone(), ParticipantActivity::Error);
            }
        }
    }
}

/// Internal counters. Stale drops are never surfaced as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub protocol_violations: u64,
    pub stale_events_dropped: u64,
}

/// Read-only copy of everything the controller exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub generation: Generation,
    pub phase: TurnPhase,
    pub connection: ConnectionState,
    pub participant_streams: Vec<ParticipantStream>,
    pub activity: Vec<(ParticipantId, ParticipantActivity)>,
    pub conversation: Vec<ConversationEntry>,
    pub synapses: Vec<SynapseEdge>,
    pub last_error: Option<SessionError>,
    pub stats: Option<CollaborationStats>,
    pub local_tally: LocalTally,
    pub protocol_violations: u64,
}

impl SessionSnapshot {
    pub fn participant(&self, id: &ParticipantId) -> Option<&ParticipantStream> {
        self.participant_streams
            .iter()
            .find(|stream| &stream.participant == id)
    }

    pub fn activity_of(&self, id: &ParticipantId) -> ParticipantActivity {
        self.activity
            .iter()
            .find(|(participant, _)| participant == id)
            .map(|(_, activity)| *activity)
            .unwrap_or_default()
    }

    pub fn last_error_message(&self) -> Option<String> {
        self.last_error.as_ref().map(ToString::to_string)
    }
}
