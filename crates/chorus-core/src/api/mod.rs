pub mod client;
pub mod error;
pub mod sse;
pub mod types;

pub use client::ApiClient;
pub use error::{ApiError, SseParseError};
pub use sse::{SseEvent, SseStream, parse_sse_stream};
pub use types::{
    AvailableModel, CreateSessionRequest, CreateSessionResponse, HealthReport,
    Panelist, PanelistSelection, SessionStatus, SynapseEventsReport,
};
