use async_trait::async_trait;
use colored::Colorize;
use eyre::{Result, bail};
use std::io::Write;

use super::Command;
use chorus_core::api::ApiClient;

pub struct HealthCommand {
    pub client: ApiClient,
}

#[async_trait]
impl Command for HealthCommand {
    async fn execute(&self) -> Result<()> {
        let report = self.client.health().await?;
        let mut stdout = std::io::stdout().lock();

        let status = if report.is_healthy() {
            report.status.green()
        } else {
            report.status.red()
        };
        writeln!(stdout, "{}: {}", self.client.base_url(), status)?;

        if let Some(services) = &report.services {
            if let Some(manager) = &services.session_manager {
                writeln!(stdout, "  session manager: {manager}")?;
            }
            let mut providers: Vec<_> = services.providers.iter().collect();
            providers.sort();
            for (provider, available) in providers {
                let mark = if *available { "up".green() } else { "down".red() };
                writeln!(stdout, "  {provider:<12} {mark}")?;
            }
        }

        if !report.is_healthy() {
            bail!("server reported status '{}'", report.status);
        }
        Ok(())
    }
}
