use dotenvy::dotenv;
use eyre::Result;
use std::path::Path;

use chorus_core::config::ClientConfig;

use super::Cli;

pub fn load_env() -> Result<()> {
    dotenv().ok();
    Ok(())
}

/// Config file (explicit path or the user default), then environment, then
/// command-line flags.
pub fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let config = match cli.config.as_deref() {
        Some(path) => load_explicit(path)?,
        None => ClientConfig::load()?,
    };
    Ok(apply_flags(config, cli))
}

fn load_explicit(path: &Path) -> Result<ClientConfig> {
    Ok(ClientConfig::load_from(path)?.with_env_overrides())
}

fn apply_flags(mut config: ClientConfig, cli: &Cli) -> ClientConfig {
    if let Some(base_url) = cli.base_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        config.base_url = base_url.to_string();
    }
    config
}
