//! Per-participant reconstruction of streamed output for the current turn.
//!
//! Content is the concatenation of deltas in arrival order. The transport is
//! trusted to preserve per-participant ordering; reordered deltas are not
//! detected or corrected.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{trace, warn};

use crate::session::error::ProtocolViolation;
use crate::session::event::MessageKind;
use crate::session::types::{ParticipantId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantStream {
    pub participant: ParticipantId,
    pub content: String,
    pub complete: bool,
    pub kind: MessageKind,
    /// Set at the first event of the turn and never updated.
    pub origin: Timestamp,
    pub delta_count: usize,
    /// Most recent participant this stream was reported to build on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building_on: Option<ParticipantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ParticipantStream {
    fn new(participant: ParticipantId, kind: MessageKind, origin: Timestamp) -> Self {
        Self {
            participant,
            content: String::new(),
            complete: false,
            kind,
            origin,
            delta_count: 0,
            building_on: None,
            metadata: None,
        }
    }
}

/// What an applied event did to its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assembly {
    Appended,
    /// The completion flag flipped false -> true on this event.
    Completed,
    /// A completion signal for a stream that was already final.
    AlreadyComplete,
}

#[derive(Debug, Clone, Default)]
pub struct MessageAssembler {
    streams: Vec<ParticipantStream>,
    index: HashMap<ParticipantId, usize>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a content delta. Deltas for a finished stream are rejected
    /// without touching the stored content.
    pub fn apply(
        &mut self,
        participant: &ParticipantId,
        delta: &str,
        complete: bool,
        kind: MessageKind,
        now: Timestamp,
    ) -> Result<Assembly, ProtocolViolation> {
        let stream = self.entry(participant, kind, now);

        if stream.complete {
            warn!(
                target: "chorus::session",
                participant = %participant,
                delta_len = delta.len(),
                "rejecting delta for completed participant"
            );
            return Err(ProtocolViolation::DeltaAfterCompletion {
                participant: participant.clone(),
            });
        }

        stream.content.push_str(delta);
        stream.kind = kind;
        stream.delta_count += 1;

        trace!(
            target: "chorus::session",
            participant = %participant,
            content_len = stream.content.len(),
            complete,
            "applied delta"
        );

        if complete {
            stream.complete = true;
            Ok(Assembly::Completed)
        } else {
            Ok(Assembly::Appended)
        }
    }

    /// Marks a stream final without new content. Idempotent.
    pub fn complete(&mut self, participant: &ParticipantId, now: Timestamp) -> Assembly {
        let stream = self.entry(participant, MessageKind::default(), now);
        if stream.complete {
            Assembly::AlreadyComplete
        } else {
            stream.complete = true;
            Assembly::Completed
        }
    }

    pub(crate) fn annotate(
        &mut self,
        participant: &ParticipantId,
        building_on: Option<ParticipantId>,
        metadata: Option<serde_json::Value>,
    ) {
        let Some(&idx) = self.index.get(participant) else {
            return;
        };
        let Some(stream) = self.streams.get_mut(idx) else {
            return;
        };
        if building_on.is_some() {
            stream.building_on = building_on;
        }
        if metadata.is_some() {
            stream.metadata = metadata;
        }
    }

    pub fn get(&self, participant: &ParticipantId) -> Option<&ParticipantStream> {
        self.index
            .get(participant)
            .and_then(|&idx| self.streams.get(idx))
    }

    /// Streams in order of first appearance.
    pub fn streams(&self) -> &[ParticipantStream] {
        &self.streams
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    fn entry(
        &mut self,
        participant: &ParticipantId,
        kind: MessageKind,
        now: Timestamp,
    ) -> &mut ParticipantStream {
        let idx = match self.index.get(participant) {
            Some(&idx) => idx,
            None => {
                self.streams
                    .push(ParticipantStream::new(participant.clone(), kind, now));
                let idx = self.streams.len() - 1;
                self.index.insert(participant.clone(), idx);
                idx
            }
        };
        &mut self.streams[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn first_delta_fixes_origin() {
        let mut assembler = MessageAssembler::new();
        let m1 = ParticipantId::new("m1");

        assembler
            .apply(&m1, "Hi", false, MessageKind::Response, t0())
            .unwrap();
        assembler
            .apply(
                &m1,
                " there",
                false,
                MessageKind::Response,
                t0() + Duration::seconds(3),
            )
            .unwrap();

        let stream = assembler.get(&m1).unwrap();
        assert_eq!(stream.origin, t0());
        assert_eq!(stream.content, "Hi there");
        assert_eq!(stream.delta_count, 2);
        assert!(!stream.complete);
    }

    #[test]
    fn completion_flips_once_and_freezes_content() {
        let mut assembler = MessageAssembler::new();
        let m1 = ParticipantId::new("m1");

        assert_eq!(
            assembler
                .apply(&m1, "done", true, MessageKind::Analysis, t0())
                .unwrap(),
            Assembly::Completed
        );
        assert_eq!(
            assembler.apply(&m1, " more", false, MessageKind::Analysis, t0()),
            Err(ProtocolViolation::DeltaAfterCompletion {
                participant: m1.clone()
            })
        );
        assert_eq!(assembler.complete(&m1, t0()), Assembly::AlreadyComplete);
        assert_eq!(assembler.get(&m1).unwrap().content, "done");
    }

    #[test]
    fn completion_signal_without_prior_delta_creates_empty_final_stream() {
        let mut assembler = MessageAssembler::new();
        let m3 = ParticipantId::new("m3");

        assert_eq!(assembler.complete(&m3, t0()), Assembly::Completed);
        let stream = assembler.get(&m3).unwrap();
        assert!(stream.complete);
        assert!(stream.content.is_empty());
    }

    #[test]
    fn streams_keep_first_appearance_order() {
        let mut assembler = MessageAssembler::new();
        for id in ["b", "a", "b", "c"] {
            assembler
                .apply(&ParticipantId::new(id), "x", false, MessageKind::Response, t0())
                .unwrap();
        }
        let order: Vec<_> = assembler
            .streams()
            .iter()
            .map(|s| s.participant.as_str())
            .collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }
}
