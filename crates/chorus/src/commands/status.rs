use async_trait::async_trait;
use eyre::{Result, bail};
use std::io::Write;

use super::Command;
use chorus_core::api::ApiClient;
use chorus_core::session::SessionId;

pub struct StatusCommand {
    pub client: ApiClient,
    pub session_id: SessionId,
}

#[async_trait]
impl Command for StatusCommand {
    async fn execute(&self) -> Result<()> {
        let status = self.client.session_status(&self.session_id).await?;
        if let Some(error) = status.error {
            bail!("session {}: {}", self.session_id, error);
        }

        let report = self.client.synapse_events(&self.session_id).await?;
        let mut stdout = std::io::stdout().lock();

        writeln!(stdout, "Session {}", self.session_id)?;
        writeln!(stdout, "  active models: {}", status.active_models.join(", "))?;

        let mut states: Vec<_> = status.model_states.iter().collect();
        states.sort_by(|a, b| a.0.cmp(b.0));
        for (model, state) in states {
            let state = state
                .as_str()
                .map_or_else(|| state.to_string(), str::to_string);
            writeln!(stdout, "  {model}: {state}")?;
        }

        if let Some(stats) = status.stats {
            writeln!(
                stdout,
                "  messages: {}  synapses: {}",
                stats.total_messages, stats.total_synapses
            )?;
        }

        writeln!(stdout, "  recorded synapses: {}", report.synapses.len())?;
        for event in &report.events {
            writeln!(
                stdout,
                "  - {} [{}] {}",
                event.kind.as_deref().unwrap_or("event"),
                event.models.join(" -> "),
                event.description.as_deref().unwrap_or_default(),
            )?;
        }
        Ok(())
    }
}
