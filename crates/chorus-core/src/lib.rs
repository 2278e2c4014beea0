//! Client core for Chorus collaborative sessions: HTTP collaborators, the
//! per-turn event stream and the session state machine.

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod test_utils;
pub mod utils;

pub use error::{Error, Result};
