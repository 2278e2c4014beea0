pub mod cli;
pub mod commands;

pub use chorus_core::{api, config, session, utils};
