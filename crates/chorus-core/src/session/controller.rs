//! Turn orchestration for one collaborative session.
//!
//! The controller is the single owner of the open channel. Every inbound
//! signal is checked against the active generation before it may touch
//! state, so events still draining from a superseded turn are dropped even
//! when closing the old channel races with delivery.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::session::assembler::Assembly;
use crate::session::channel::{ChannelEvent, ChannelSignal, SessionChannel, Transport};
use crate::session::error::{ProtocolViolation, SessionError};
use crate::session::event::{
    AllCompletePayload, ConnectedPayload, ErrorPayload, ModelCompletePayload, ResponsePayload,
    ServerEvent,
};
use crate::session::reconciler::{ConversationEntry, ConversationReconciler};
use crate::session::state::{
    ConnectionState, Diagnostics, ParticipantActivity, SessionSnapshot, TurnArena, TurnPhase,
};
use crate::session::stats::{CollaborationStats, LocalTally, StatsAggregator};
use crate::session::synapse::{SynapseEdge, SynapseTracker};
use crate::session::types::{Clock, Generation, ParticipantId, SessionId};

pub const EARLY_CLOSE_MESSAGE: &str = "stream closed before all participants completed";

pub struct SessionController {
    session_id: SessionId,
    roster: Vec<ParticipantId>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    channel: Option<SessionChannel>,
    generation: Generation,
    phase: TurnPhase,
    connection: ConnectionState,
    last_error: Option<SessionError>,
    turn: Option<TurnArena>,
    synapses: SynapseTracker,
    conversation: ConversationReconciler,
    stats: StatsAggregator,
    diagnostics: Diagnostics,
}

impl SessionController {
    pub fn new(
        session_id: SessionId,
        roster: Vec<ParticipantId>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session_id,
            roster,
            transport,
            clock,
            channel: None,
            generation: Generation::default(),
            phase: TurnPhase::Idle,
            connection: ConnectionState::Disconnected,
            last_error: None,
            turn: None,
            synapses: SynapseTracker::new(),
            conversation: ConversationReconciler::new(),
            stats: StatsAggregator::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Starts a new turn. Callable from any state, including while the
    /// previous turn is still streaming.
    pub fn send(&mut self, prompt: &str) -> Generation {
        if let Some(mut previous) = self.channel.take() {
            previous.close();
        }

        self.generation = self.generation.next();
        let started_at = self.clock.now();
        self.turn = Some(TurnArena::new(self.generation, &self.roster));
        self.last_error = None;
        self.conversation
            .record_prompt(prompt, self.generation, started_at);

        self.channel = Some(SessionChannel::open(
            self.transport.as_ref(),
            &self.session_id,
            prompt,
            self.generation,
        ));
        self.phase = TurnPhase::Sending;
        self.connection = ConnectionState::Connecting;

        info!(
            target: "chorus::session",
            session_id = %self.session_id,
            generation = %self.generation,
            prompt_len = prompt.len(),
            "turn started"
        );
        self.generation
    }

    /// Forces Idle. Never fails; the conversation log, synapse log and last
    /// reported stats survive.
    pub fn disconnect(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        if self.phase != TurnPhase::Idle {
            debug!(target: "chorus::session", session_id = %self.session_id, "disconnected");
        }
        self.turn = None;
        self.phase = TurnPhase::Idle;
        self.connection = ConnectionState::Disconnected;
    }

    /// Next tagged signal from the open channel. Cancel-safe.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        let channel = self.channel.as_mut()?;
        let next = channel.next().await;
        if next.is_none() {
            self.channel = None;
        }
        next
    }

    /// `recv` followed by `handle`. Returns `None` once the channel is
    /// exhausted; an exhausted channel during an active turn counts as an
    /// early close.
    pub async fn next_event(&mut self) -> Option<Result<(), SessionError>> {
        if let Some(event) = self.recv().await {
            Some(self.handle(event))
        } else {
            if self.phase.is_active() {
                self.fail_turn(SessionError::Transport(EARLY_CLOSE_MESSAGE.to_string()));
            }
            None
        }
    }

    /// Drives the current turn until it leaves Sending/Streaming.
    pub async fn run_turn(&mut self) -> TurnPhase {
        while self.phase.is_active() {
            if self.next_event().await.is_none() {
                break;
            }
        }
        self.phase
    }

    /// Routes one signal. Synchronous and I/O free.
    ///
    /// An `Err` describes what happened to this signal; the snapshot already
    /// reflects it. Stale drops and protocol violations never enter the
    /// last-error slot.
    pub fn handle(&mut self, event: ChannelEvent) -> Result<(), SessionError> {
        if self.turn.is_none() || event.generation != self.generation {
            self.diagnostics.stale_events_dropped += 1;
            debug!(
                target: "chorus::session",
                event_generation = %event.generation,
                active_generation = %self.generation,
                "dropping stale event"
            );
            return Err(SessionError::StaleEventDropped {
                event: event.generation,
                active: self.generation,
            });
        }

        match event.signal {
            ChannelSignal::Opened => {
                debug!(target: "chorus::session", generation = %self.generation, "transport opened");
                Ok(())
            }
            ChannelSignal::Event(sse) => match ServerEvent::decode(&sse) {
                Ok(server_event) => self.apply(server_event),
                Err(violation) => Err(self.violation(violation)),
            },
            ChannelSignal::TransportError(message) => {
                self.channel = None;
                let err = SessionError::Transport(message);
                self.fail_turn(err.clone());
                Err(err)
            }
            ChannelSignal::Closed => {
                self.channel = None;
                if self.phase.is_active() {
                    let err = SessionError::Transport(EARLY_CLOSE_MESSAGE.to_string());
                    self.fail_turn(err.clone());
                    return Err(err);
                }
                if self.connection == ConnectionState::Open {
                    self.connection = ConnectionState::Disconnected;
                }
                Ok(())
            }
        }
    }

    fn apply(&mut self, event: ServerEvent) -> Result<(), SessionError> {
        debug!(
            target: "chorus::session",
            generation = %self.generation,
            event = event.name(),
            participant = ?event.participant(),
            "applying server event"
        );
        match event {
            ServerEvent::Connected(payload) => {
                self.handle_connected(&payload);
                Ok(())
            }
            ServerEvent::Response(payload) => self.handle_response(payload),
            ServerEvent::ModelComplete(payload) => {
                self.handle_model_complete(&payload);
                Ok(())
            }
            ServerEvent::AllComplete(payload) => {
                self.handle_all_complete(payload);
                Ok(())
            }
            ServerEvent::Error(payload) => Err(self.handle_server_error(&payload)),
        }
    }

    fn handle_connected(&mut self, payload: &ConnectedPayload) {
        if payload.session_id != self.session_id {
            warn!(
                target: "chorus::session",
                expected = %self.session_id,
                received = %payload.session_id,
                "connected acknowledgment for a different session"
            );
        }
        if self.phase == TurnPhase::Sending {
            self.phase = TurnPhase::Streaming;
        }
        self.connection = ConnectionState::Open;
        debug!(target: "chorus::session", generation = %self.generation, "stream connected");
    }

    fn handle_response(&mut self, payload: ResponsePayload) -> Result<(), SessionError> {
        let now = self.clock.now();
        let Some(turn) = self.turn.as_mut() else {
            return Ok(());
        };

        let assembly = match turn.assembler.apply(
            &payload.model,
            &payload.content,
            payload.complete,
            payload.kind,
            now,
        ) {
            Ok(assembly) => assembly,
            Err(violation) => return Err(self.violation(violation)),
        };

        if self.phase == TurnPhase::Sending {
            self.phase = TurnPhase::Streaming;
        }

        let building_on = payload
            .synapse
            .as_ref()
            .and_then(|signal| signal.source().cloned());
        turn.assembler
            .annotate(&payload.model, building_on, payload.metadata);

        if self.phase.is_active() {
            let activity = if assembly == Assembly::Completed {
                ParticipantActivity::Complete
            } else {
                ParticipantActivity::Responding
            };
            turn.set_activity(&payload.model, activity);
        }

        if let Some(signal) = payload.synapse.as_ref() {
            self.synapses.observe(signal, &payload.model, now);
        }

        if assembly == Assembly::Completed {
            self.reconcile(&payload.model);
        }
        Ok(())
    }

    fn handle_model_complete(&mut self, payload: &ModelCompletePayload) {
        let now = self.clock.now();
        let Some(turn) = self.turn.as_mut() else {
            return;
        };

        let assembly = turn.assembler.complete(&payload.model, now);
        turn.set_activity(&payload.model, ParticipantActivity::Complete);

        match assembly {
            Assembly::Completed => self.reconcile(&payload.model),
            Assembly::AlreadyComplete => {
                debug!(
                    target: "chorus::session",
                    participant = %payload.model,
                    "duplicate completion signal"
                );
            }
            Assembly::Appended => {}
        }
    }

    fn handle_all_complete(&mut self, payload: AllCompletePayload) {
        self.stats.record(payload.stats);

        if self.phase.is_active() {
            self.phase = TurnPhase::Completed;
            if let Some(mut channel) = self.channel.take() {
                channel.close();
            }
            self.connection = ConnectionState::Disconnected;
            info!(
                target: "chorus::session",
                session_id = %self.session_id,
                generation = %self.generation,
                entries = self.conversation.len(),
                synapses = self.synapses.len(),
                "turn completed"
            );
        }
    }

    fn handle_server_error(&mut self, payload: &ErrorPayload) -> SessionError {
        let err = SessionError::ServerReported(payload.message().to_string());
        self.fail_turn(err.clone());
        err
    }

    fn reconcile(&mut self, participant: &ParticipantId) {
        let Some((generation, stream)) = self.turn.as_ref().and_then(|turn| {
            turn.assembler
                .get(participant)
                .map(|stream| (turn.generation, stream))
        }) else {
            return;
        };
        if let Some(entry) = self.conversation.record_completion(stream, generation) {
            debug!(
                target: "chorus::session",
                entry_id = %entry.id,
                participant = %participant,
                "conversation entry appended"
            );
        }
    }

    fn fail_turn(&mut self, err: SessionError) {
        error!(
            target: "chorus::session",
            session_id = %self.session_id,
            generation = %self.generation,
            error = %err,
            "turn errored"
        );
        self.phase = TurnPhase::Errored;
        self.connection = ConnectionState::Errored;
        if let Some(turn) = self.turn.as_mut() {
            turn.fail_unfinished();
        }
        self.last_error = Some(err);
    }

    fn violation(&mut self, violation: ProtocolViolation) -> SessionError {
        self.diagnostics.protocol_violations += 1;
        warn!(
            target: "chorus::session",
            generation = %self.generation,
            violation = %violation,
            "skipping event"
        );
        SessionError::Protocol(violation)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn roster(&self) -> &[ParticipantId] {
        &self.roster
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn is_turn_active(&self) -> bool {
        self.phase.is_active()
    }

    pub fn conversation(&self) -> &[ConversationEntry] {
        self.conversation.entries()
    }

    pub fn synapses(&self) -> &[SynapseEdge] {
        self.synapses.edges()
    }

    /// Edges a display layer should still be drawing.
    pub fn visible_synapses(&self, lifetime: Duration) -> Vec<SynapseEdge> {
        self.synapses
            .visible(self.clock.now(), lifetime)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> Option<&CollaborationStats> {
        self.stats.reported()
    }

    pub fn local_tally(&self) -> LocalTally {
        StatsAggregator::local(self.conversation.len(), self.synapses.len())
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn activity(&self, participant: &ParticipantId) -> ParticipantActivity {
        self.turn
            .as_ref()
            .and_then(|turn| turn.activity.get(participant).copied())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let participant_streams = self
            .turn
            .as_ref()
            .map(|turn| turn.assembler.streams().to_vec())
            .unwrap_or_default();

        let mut activity: Vec<(ParticipantId, ParticipantActivity)> = self
            .roster
            .iter()
            .map(|id| (id.clone(), self.activity(id)))
            .collect();
        for stream in &participant_streams {
            if !self.roster.contains(&stream.participant) {
                activity.push((stream.participant.clone(), self.activity(&stream.participant)));
            }
        }

        SessionSnapshot {
            session_id: self.session_id.clone(),
            generation: self.generation,
            phase: self.phase,
            connection: self.connection,
            participant_streams,
            activity,
            conversation: self.conversation.entries().to_vec(),
            synapses: self.synapses.edges().to_vec(),
            last_error: self.last_error.clone(),
            stats: self.stats.reported().cloned(),
            local_tally: self.local_tally(),
            protocol_violations: self.diagnostics.protocol_violations,
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.session_id)
            .field("generation", &self.generation)
            .field("phase", &self.phase)
            .field("connection", &self.connection)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
