use serde::Serialize;
use std::collections::HashSet;
use strum::Display;
use tracing::debug;

use crate::session::assembler::ParticipantStream;
use crate::session::event::MessageKind;
use crate::session::types::{EntryId, Generation, ParticipantId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Participant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationEntry {
    pub id: EntryId,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<ParticipantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    pub timestamp: Timestamp,
}

/// Session-long, append-only conversation log.
#[derive(Debug, Clone, Default)]
pub struct ConversationReconciler {
    entries: Vec<ConversationEntry>,
    seen: HashSet<EntryId>,
}

impl ConversationReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_prompt(
        &mut self,
        prompt: &str,
        generation: Generation,
        started_at: Timestamp,
    ) -> &ConversationEntry {
        let entry = ConversationEntry {
            id: EntryId::user(generation, started_at),
            role: Role::User,
            content: prompt.to_string(),
            participant: None,
            kind: None,
            timestamp: started_at,
        };
        self.push(entry)
    }

    /// Appends the final output of a stream unless an entry with the same
    /// derived id already exists. Blank output is never logged.
    pub fn record_completion(
        &mut self,
        stream: &ParticipantStream,
        generation: Generation,
    ) -> Option<&ConversationEntry> {
        if !stream.complete || stream.content.trim().is_empty() {
            return None;
        }

        let id = EntryId::participant(&stream.participant, generation, stream.origin);
        if self.seen.contains(&id) {
            debug!(
                target: "chorus::session",
                entry_id = %id,
                "completion already reconciled"
            );
            return None;
        }

        let entry = ConversationEntry {
            id,
            role: Role::Participant,
            content: stream.content.clone(),
            participant: Some(stream.participant.clone()),
            kind: Some(stream.kind),
            timestamp: stream.origin,
        };
        Some(self.push(entry))
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: ConversationEntry) -> &ConversationEntry {
        self.seen.insert(entry.id.clone());
        self.entries.push(entry);
        let last = self.entries.len() - 1;
        &self.entries[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn finished(participant: &str, content: &str) -> ParticipantStream {
        ParticipantStream {
            participant: ParticipantId::new(participant),
            content: content.to_string(),
            complete: true,
            kind: MessageKind::Response,
            origin: Utc.timestamp_opt(1_700_000_000, 5).unwrap(),
            delta_count: 1,
            building_on: None,
            metadata: None,
        }
    }

    #[test]
    fn duplicate_completion_collapses_to_one_entry() {
        let mut log = ConversationReconciler::new();
        let stream = finished("m1", "Hi there");

        assert!(log.record_completion(&stream, Generation(1)).is_some());
        assert!(log.record_completion(&stream, Generation(1)).is_none());
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].role, Role::Participant);
    }

    #[test]
    fn same_stream_shape_in_a_later_turn_is_a_new_entry() {
        let mut log = ConversationReconciler::new();
        let stream = finished("m1", "Hi there");

        assert!(log.record_completion(&stream, Generation(1)).is_some());
        assert!(log.record_completion(&stream, Generation(2)).is_some());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn blank_or_unfinished_streams_are_skipped() {
        let mut log = ConversationReconciler::new();
        assert!(log.record_completion(&finished("m1", "   \n"), Generation(1)).is_none());

        let mut partial = finished("m2", "half");
        partial.complete = false;
        assert!(log.record_completion(&partial, Generation(1)).is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn prompts_are_appended_in_order() {
        let mut log = ConversationReconciler::new();
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        log.record_prompt("first", Generation(1), t);
        log.record_prompt("second", Generation(2), t);

        let contents: Vec<_> = log.entries().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }
}
