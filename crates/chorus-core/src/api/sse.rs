use eventsource_stream::Eventsource;
use futures_core::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use tokio_util::bytes::Bytes;

use crate::api::error::SseParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn named(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            data: data.into(),
            id: None,
        }
    }
}

pub type SseStream = Pin<Box<dyn Stream<Item = Result<SseEvent, SseParseError>> + Send>>;

pub fn parse_sse_stream<S, E>(byte_stream: S) -> SseStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + 'static,
{
    let event_stream = byte_stream
        .map(|result| result.map_err(|e| std::io::Error::other(e.to_string())))
        .eventsource()
        .map(|result| {
            result
                .map(|event| SseEvent {
                    event_type: if event.event.is_empty() {
                        None
                    } else {
                        Some(event.event)
                    },
                    data: event.data,
                    id: if event.id.is_empty() {
                        None
                    } else {
                        Some(event.id)
                    },
                })
                .map_err(SseParseError::from)
        });

    Box::pin(event_stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn test_parse_named_event() {
        let sse_data = "event: connected\ndata: {\"session_id\": \"s1\"}\n\n";
        let byte_stream =
            stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(sse_data)) });

        let mut sse_stream = parse_sse_stream(byte_stream);

        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(event.event_type, Some("connected".to_string()));
        assert_eq!(event.data, "{\"session_id\": \"s1\"}");
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let chunks = vec![
            Ok::<_, std::io::Error>(Bytes::from("event: resp")),
            Ok(Bytes::from("onse\ndata: {\"model\":")),
            Ok(Bytes::from("\"m1\"}\n\nevent: all_complete\ndata: {}\n\n")),
        ];
        let mut sse_stream = parse_sse_stream(stream::iter(chunks));

        let first = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(first.event_type.as_deref(), Some("response"));
        assert_eq!(first.data, "{\"model\":\"m1\"}");

        let second = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(second.event_type.as_deref(), Some("all_complete"));
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_multiline_data_is_joined() {
        let byte_stream = stream::once(async move {
            Ok::<_, std::io::Error>(Bytes::from("event: error\ndata: line one\ndata: line two\n\n"))
        });
        let mut sse_stream = parse_sse_stream(byte_stream);

        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(event.data, "line one\nline two");
    }
}
