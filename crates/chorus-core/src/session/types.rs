use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Timestamp = DateTime<Utc>;

/// Identifier the server assigns to a participant. Never parsed: display
/// lookups belong to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turn counter. Bumped on every `send()`; events carry the generation of the
/// channel that produced them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Conversation entry identifier.
///
/// Participant entries derive their id from `(participant, origin timestamp,
/// generation)` so that every completion signal for the same stream maps to
/// the same id, while the same participant answering in a later turn does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn user(generation: Generation, started_at: Timestamp) -> Self {
        Self(format!(
            "user-{}-{}",
            timestamp_key(started_at),
            generation.0
        ))
    }

    pub fn participant(
        participant: &ParticipantId,
        generation: Generation,
        origin: Timestamp,
    ) -> Self {
        Self(format!(
            "{}-{}-{}",
            participant.0,
            timestamp_key(origin),
            generation.0
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn timestamp_key(ts: Timestamp) -> String {
    ts.timestamp_nanos_opt()
        .map_or_else(|| ts.timestamp_micros().to_string(), |n| n.to_string())
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn participant_entry_id_is_deterministic() {
        let origin = Utc.timestamp_opt(1_700_000_000, 42).unwrap();
        let participant = ParticipantId::new("5f0c9a8e-claude");

        assert_eq!(
            EntryId::participant(&participant, Generation(1), origin),
            EntryId::participant(&participant.clone(), Generation(1), origin)
        );
        assert_ne!(
            EntryId::participant(&participant, Generation(1), origin),
            EntryId::participant(&ParticipantId::new("gpt-4o"), Generation(1), origin)
        );
    }

    #[test]
    fn participant_entry_ids_differ_per_generation_even_at_same_instant() {
        let origin = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let participant = ParticipantId::new("gpt-4o");
        assert_ne!(
            EntryId::participant(&participant, Generation(1), origin),
            EntryId::participant(&participant, Generation(2), origin)
        );
    }

    #[test]
    fn user_entry_ids_differ_per_generation_even_at_same_instant() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_ne!(
            EntryId::user(Generation(1), now),
            EntryId::user(Generation(2), now)
        );
    }
}
