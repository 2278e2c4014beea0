use clap::Parser;
use eyre::Result;

use chorus::cli::{Cli, Commands};
use chorus::commands::{
    Command, chat::ChatCommand, health::HealthCommand, models::ModelsCommand,
    status::StatusCommand,
};
use chorus_core::api::ApiClient;
use chorus_core::session::SessionId;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre for better error reports
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load .env file if it exists
    chorus::cli::config::load_env()?;

    // Level configured via RUST_LOG, destination via CHORUS_LOG_DIR
    chorus_core::utils::tracing::init_tracing()?;

    let config = chorus::cli::config::resolve_config(&cli)?;
    debug!(target: "chorus::cli", base_url = %config.base_url, "resolved config");
    let client = ApiClient::from_config(&config)?;

    match cli.command {
        Commands::Health => HealthCommand { client }.execute().await,
        Commands::Models => ModelsCommand { client }.execute().await,
        Commands::Chat {
            mission,
            models,
            panelists,
            prompt,
        } => {
            ChatCommand {
                client,
                mission,
                models,
                panelists,
                prompt,
                synapse_display: config.synapse_display(),
            }
            .execute()
            .await
        }
        Commands::Status { session_id } => {
            StatusCommand {
                client,
                session_id: SessionId::new(session_id),
            }
            .execute()
            .await
        }
    }
}
