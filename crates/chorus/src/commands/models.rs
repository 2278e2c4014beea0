use async_trait::async_trait;
use colored::Colorize;
use eyre::Result;
use std::io::Write;

use super::Command;
use chorus_core::api::ApiClient;

pub struct ModelsCommand {
    pub client: ApiClient,
}

#[async_trait]
impl Command for ModelsCommand {
    async fn execute(&self) -> Result<()> {
        let models = self.client.available_models().await?;
        let mut stdout = std::io::stdout().lock();

        if models.is_empty() {
            writeln!(stdout, "No models available.")?;
            return Ok(());
        }

        writeln!(stdout, "{:<28} {:<12} {:<24}", "ID", "Provider", "Role")?;
        writeln!(stdout, "{}", "-".repeat(64))?;
        for model in models {
            writeln!(
                stdout,
                "{:<28} {:<12} {:<24}",
                model.id.as_str().bold(),
                model.provider.as_deref().unwrap_or("-"),
                model.role.as_deref().unwrap_or("-"),
            )?;
        }
        Ok(())
    }
}
