//! One event-stream connection per turn.
//!
//! A channel only moves signals; it never interprets payloads. Transport-level
//! signals (opened, error, closed) are kept apart from the protocol events
//! carried in `ChannelSignal::Event`.

use futures_core::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::api::ApiClient;
use crate::api::sse::{SseEvent, parse_sse_stream};
use crate::session::types::{Generation, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    Opened,
    Event(SseEvent),
    /// Terminal for the channel; nothing follows it.
    TransportError(String),
    /// The server ended the stream.
    Closed,
}

/// A signal tagged with the generation its channel was opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub generation: Generation,
    pub signal: ChannelSignal,
}

pub type SignalStream = Pin<Box<dyn Stream<Item = ChannelSignal> + Send>>;

pub trait Transport: Send + Sync {
    /// Builds the signal stream for one turn. No I/O may happen before the
    /// stream is first polled, and the stream must end once `token` fires.
    fn open(&self, session_id: &SessionId, prompt: &str, token: CancellationToken) -> SignalStream;
}

/// Event streams over HTTP server-sent events. No reconnection: the first
/// transport failure ends the stream.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ApiClient,
}

impl HttpTransport {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn open(&self, session_id: &SessionId, prompt: &str, token: CancellationToken) -> SignalStream {
        let client = self.client.clone();
        let session_id = session_id.clone();
        let prompt = prompt.to_string();

        Box::pin(async_stream::stream! {
            let opened = tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!(target: "chorus::channel", "cancelled before the stream opened");
                    return;
                }
                res = client.open_stream(&session_id, &prompt) => res,
            };

            let response = match opened {
                Ok(response) => response,
                Err(e) => {
                    error!(target: "chorus::channel", error = %e, "failed to open event stream");
                    yield ChannelSignal::TransportError(e.to_string());
                    return;
                }
            };

            yield ChannelSignal::Opened;

            let mut sse_stream = parse_sse_stream(response.bytes_stream());
            loop {
                let next = tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        debug!(target: "chorus::channel", "channel closed by client");
                        return;
                    }
                    next = sse_stream.next() => next,
                };

                match next {
                    Some(Ok(event)) => yield ChannelSignal::Event(event),
                    Some(Err(e)) => {
                        error!(target: "chorus::channel", error = %e, "event stream failed");
                        yield ChannelSignal::TransportError(e.to_string());
                        return;
                    }
                    None => {
                        yield ChannelSignal::Closed;
                        return;
                    }
                }
            }
        })
    }
}

pub struct SessionChannel {
    generation: Generation,
    token: CancellationToken,
    stream: Option<SignalStream>,
}

impl SessionChannel {
    pub fn open(
        transport: &dyn Transport,
        session_id: &SessionId,
        prompt: &str,
        generation: Generation,
    ) -> Self {
        let token = CancellationToken::new();
        let stream = transport.open(session_id, prompt, token.clone());
        debug!(target: "chorus::channel", %generation, "channel opened");
        Self {
            generation,
            token,
            stream: Some(stream),
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Next signal, tagged. Cancel-safe.
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        let stream = self.stream.as_mut()?;
        if let Some(signal) = stream.next().await {
            Some(ChannelEvent {
                generation: self.generation,
                signal,
            })
        } else {
            self.stream = None;
            None
        }
    }

    /// Drops undelivered signals. Idempotent.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(target: "chorus::channel", generation = %self.generation, "channel closed");
        }
        self.token.cancel();
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for SessionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionChannel")
            .field("generation", &self.generation)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedTransport;

    #[tokio::test]
    async fn tags_signals_with_generation_and_ends_after_script() {
        let transport = ScriptedTransport::new();
        transport.push_turn(vec![
            ChannelSignal::Opened,
            ChannelSignal::Event(SseEvent::named("connected", "{\"session_id\":\"s\"}")),
            ChannelSignal::Closed,
        ]);

        let mut channel =
            SessionChannel::open(&transport, &SessionId::new("s"), "hi", Generation(7));

        let first = channel.next().await.unwrap();
        assert_eq!(first.generation, Generation(7));
        assert_eq!(first.signal, ChannelSignal::Opened);
        assert!(channel.next().await.is_some());
        assert_eq!(channel.next().await.unwrap().signal, ChannelSignal::Closed);
        assert!(channel.next().await.is_none());
        assert!(!channel.is_open());
    }

    #[tokio::test]
    async fn close_discards_pending_signals() {
        let transport = ScriptedTransport::new();
        transport.push_turn(vec![ChannelSignal::Opened, ChannelSignal::Closed]);

        let mut channel = SessionChannel::open(&transport, &SessionId::new("s"), "hi", Generation(1));
        channel.close();
        channel.close();

        assert!(channel.next().await.is_none());
        assert_eq!(transport.prompts(), vec!["hi".to_string()]);
    }
}
