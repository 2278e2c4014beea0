//! Test utilities for chorus-core
//!
//! Scripted transports, a manual clock and wire-event builders, shared by
//! unit tests and the integration tests under `tests/`.

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::api::sse::SseEvent;
use crate::session::channel::{ChannelSignal, SignalStream, Transport};
use crate::session::event::{
    ALL_COMPLETE_EVENT, CONNECTED_EVENT, ERROR_EVENT, MODEL_COMPLETE_EVENT, RESPONSE_EVENT,
};
use crate::session::types::{Clock, SessionId, Timestamp};

struct TurnScript {
    signals: Vec<ChannelSignal>,
    hold_open: bool,
}

/// Replays one pre-recorded signal script per `open` call, in push order.
/// Opening with no script left yields an empty stream.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<TurnScript>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script that ends after its last signal.
    pub fn push_turn(&self, signals: Vec<ChannelSignal>) {
        self.push(TurnScript {
            signals,
            hold_open: false,
        });
    }

    /// Script that stays pending after its last signal until cancelled.
    pub fn push_open_turn(&self, signals: Vec<ChannelSignal>) {
        self.push(TurnScript {
            signals,
            hold_open: true,
        });
    }

    /// Prompts passed to `open`, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, script: TurnScript) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(script);
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, _session_id: &SessionId, prompt: &str, token: CancellationToken) -> SignalStream {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(TurnScript {
                signals: Vec::new(),
                hold_open: false,
            });

        Box::pin(async_stream::stream! {
            for signal in script.signals {
                if token.is_cancelled() {
                    return;
                }
                tokio::task::yield_now().await;
                yield signal;
            }
            if script.hold_open {
                token.cancelled().await;
            }
        })
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Fixed, arbitrary start instant.
    pub fn at_epoch() -> Self {
        Self::new(Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn connected(session_id: &str) -> ChannelSignal {
    event(
        CONNECTED_EVENT,
        &json!({ "session_id": session_id, "message": "Connected to collaboration stream" }),
    )
}

pub fn response(model: &str, content: &str, complete: bool) -> ChannelSignal {
    event(
        RESPONSE_EVENT,
        &json!({ "model": model, "content": content, "type": "response", "complete": complete }),
    )
}

pub fn response_building_on(
    model: &str,
    content: &str,
    complete: bool,
    building_on: &str,
) -> ChannelSignal {
    event(
        RESPONSE_EVENT,
        &json!({
            "model": model,
            "content": content,
            "type": "response",
            "complete": complete,
            "synapse": { "detected": true, "building_on": building_on, "type": "building", "strength": 0.8 }
        }),
    )
}

pub fn model_complete(model: &str) -> ChannelSignal {
    event(
        MODEL_COMPLETE_EVENT,
        &json!({ "model": model, "timestamp": "2024-01-01T00:00:00" }),
    )
}

pub fn all_complete(session_id: &str, total_messages: u64, total_synapses: u64) -> ChannelSignal {
    event(
        ALL_COMPLETE_EVENT,
        &json!({
            "session_id": session_id,
            "stats": { "total_messages": total_messages, "total_synapses": total_synapses }
        }),
    )
}

pub fn server_error(message: &str) -> ChannelSignal {
    event(ERROR_EVENT, &json!({ "error": message, "session_id": "s" }))
}

pub fn event(name: &str, data: &serde_json::Value) -> ChannelSignal {
    ChannelSignal::Event(SseEvent::named(name, data.to_string()))
}
