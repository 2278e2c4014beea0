use serde::{Deserialize, Serialize};
use tracing::debug;

/// Server-authoritative tally for a completed turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollaborationStats {
    #[serde(default)]
    pub total_messages: u64,
    #[serde(default)]
    pub total_synapses: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaboration_score: Option<f64>,
}

/// Counts derived from the client's own logs, for cross-checking the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocalTally {
    pub conversation_entries: usize,
    pub synapse_edges: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    reported: Option<CollaborationStats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the server's tally verbatim, replacing the previous turn's.
    pub fn record(&mut self, stats: CollaborationStats) {
        debug!(
            target: "chorus::session",
            total_messages = stats.total_messages,
            total_synapses = stats.total_synapses,
            "recorded server stats"
        );
        self.reported = Some(stats);
    }

    pub fn reported(&self) -> Option<&CollaborationStats> {
        self.reported.as_ref()
    }

    pub fn local(conversation_entries: usize, synapse_edges: usize) -> LocalTally {
        LocalTally {
            conversation_entries,
            synapse_edges,
        }
    }
}
