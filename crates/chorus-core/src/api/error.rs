use eventsource_stream::EventStreamError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SseParseError {
    #[error("UTF-8 error: {details}")]
    Utf8 { details: String },
    #[error("Parse error: {details}")]
    Parser { details: String },
    #[error("Transport error: {details}")]
    Transport { details: String },
}

impl<E> From<EventStreamError<E>> for SseParseError
where
    E: std::error::Error,
{
    fn from(err: EventStreamError<E>) -> Self {
        match err {
            EventStreamError::Utf8(err) => Self::Utf8 {
                details: err.to_string(),
            },
            EventStreamError::Parser(err) => Self::Parser {
                details: err.to_string(),
            },
            EventStreamError::Transport(err) => Self::Transport {
                details: err.to_string(),
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Not found: {details}")]
    NotFound { details: String },

    #[error("Invalid request to {endpoint}: {details}")]
    InvalidRequest { endpoint: String, details: String },

    #[error("{endpoint} server error (Status: {status_code}): {details}")]
    ServerError {
        endpoint: String,
        status_code: u16,
        details: String,
    },

    #[error("Failed to parse response from {endpoint}: {details}")]
    ResponseParsingError { endpoint: String, details: String },

    #[error("Unknown API error from {endpoint} (Status: {status_code}): {details}")]
    Unknown {
        endpoint: String,
        status_code: u16,
        details: String,
    },

    #[error("Stream error: {0}")]
    Stream(#[from] SseParseError),
}

impl ApiError {
    /// Maps a non-success HTTP status onto the matching variant.
    pub fn from_status(endpoint: &str, status_code: u16, details: String) -> Self {
        let endpoint = endpoint.to_string();
        match status_code {
            404 => ApiError::NotFound { details },
            400..=499 => ApiError::InvalidRequest { endpoint, details },
            500..=599 => ApiError::ServerError {
                endpoint,
                status_code,
                details,
            },
            _ => ApiError::Unknown {
                endpoint,
                status_code,
                details,
            },
        }
    }
}
