pub mod assembler;
pub mod channel;
pub mod controller;
pub mod error;
pub mod event;
pub mod reconciler;
pub mod state;
pub mod stats;
pub mod synapse;
pub mod types;

#[cfg(test)]
mod tests;

pub use assembler::{Assembly, MessageAssembler, ParticipantStream};
pub use channel::{
    ChannelEvent, ChannelSignal, HttpTransport, SessionChannel, SignalStream, Transport,
};
pub use controller::{EARLY_CLOSE_MESSAGE, SessionController};
pub use error::{ProtocolViolation, SessionError};
pub use event::{MessageKind, ServerEvent, SynapseSignal};
pub use reconciler::{ConversationEntry, ConversationReconciler, Role};
pub use state::{
    ConnectionState, Diagnostics, ParticipantActivity, SessionSnapshot, TurnArena, TurnPhase,
};
pub use stats::{CollaborationStats, LocalTally, StatsAggregator};
pub use synapse::{SynapseEdge, SynapseTracker};
pub use types::{Clock, EntryId, Generation, ParticipantId, SessionId, SystemClock, Timestamp};
