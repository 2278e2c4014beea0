use chrono::Duration;
use serde::Serialize;
use tracing::debug;

use crate::session::event::SynapseSignal;
use crate::session::types::{ParticipantId, Timestamp};

/// One detected "built on" signal. Repeats between the same pair are kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynapseEdge {
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    pub timestamp: Timestamp,
}

impl SynapseEdge {
    /// Whether a display layer should still be drawing this edge.
    pub fn is_visible(&self, now: Timestamp, lifetime: Duration) -> bool {
        now >= self.timestamp && now - self.timestamp < lifetime
    }
}

#[derive(Debug, Clone, Default)]
pub struct SynapseTracker {
    edges: Vec<SynapseEdge>,
}

impl SynapseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an edge when the signal is a detection with a source. Returns
    /// whether an edge was recorded.
    pub fn observe(
        &mut self,
        signal: &SynapseSignal,
        participant: &ParticipantId,
        now: Timestamp,
    ) -> bool {
        let Some(source) = signal.source() else {
            return false;
        };

        debug!(
            target: "chorus::session",
            from = %source,
            to = %participant,
            kind = %signal.kind,
            "synapse detected"
        );

        self.edges.push(SynapseEdge {
            from: source.clone(),
            to: participant.clone(),
            kind: signal.kind.clone(),
            strength: signal.strength,
            timestamp: now,
        });
        true
    }

    pub fn edges(&self) -> &[SynapseEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn visible(&self, now: Timestamp, lifetime: Duration) -> impl Iterator<Item = &SynapseEdge> {
        self.edges
            .iter()
            .filter(move |edge| edge.is_visible(now, lifetime))
    }
}
