use async_trait::async_trait;
use colored::Colorize;
use eyre::{Result, bail};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use super::Command;
use chorus_core::api::{ApiClient, CreateSessionRequest, PanelistSelection};
use chorus_core::session::{
    ConversationEntry, HttpTransport, MessageKind, SessionController, SystemClock, TurnPhase,
};

pub struct ChatCommand {
    pub client: ApiClient,
    pub mission: String,
    pub models: Vec<String>,
    pub panelists: Vec<PanelistSelection>,
    pub prompt: Option<String>,
    /// How long a "built on" link counts as active after it fires.
    pub synapse_display: chrono::Duration,
}

impl ChatCommand {
    fn session_request(&self) -> CreateSessionRequest {
        if self.panelists.is_empty() {
            CreateSessionRequest::with_models(&self.mission, self.models.clone())
        } else {
            CreateSessionRequest::with_panelists(&self.mission, self.panelists.clone())
        }
    }
}

#[async_trait]
impl Command for ChatCommand {
    async fn execute(&self) -> Result<()> {
        let request = self.session_request();
        let created = self.client.create_session(&request).await?;
        info!(
            target: "chorus::cli",
            session_id = %created.session_id,
            panelists = created.panelists.len(),
            "session created"
        );

        {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "Session {}", created.session_id.to_string().bold())?;
            for panelist in &created.panelists {
                writeln!(stdout, "  {} {} ({})", panelist.icon, panelist.role, panelist.id)?;
            }
        }

        let mut controller = SessionController::new(
            created.session_id.clone(),
            created.roster(),
            Arc::new(HttpTransport::new(self.client.clone())),
            Arc::new(SystemClock),
        );

        let mut last_phase = TurnPhase::Idle;
        if let Some(prompt) = &self.prompt {
            last_phase = run_turn(&mut controller, prompt, self.synapse_display).await?;
        } else {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let prompt = line.trim();
                if prompt.is_empty() {
                    continue;
                }
                last_phase = run_turn(&mut controller, prompt, self.synapse_display).await?;
                if last_phase == TurnPhase::Idle {
                    break;
                }
            }
        }

        controller.disconnect();

        if last_phase == TurnPhase::Errored {
            let reason = controller
                .last_error()
                .map_or_else(|| "unknown error".to_string(), ToString::to_string);
            bail!("last turn failed: {reason}");
        }
        Ok(())
    }
}

/// Runs one turn, printing conversation entries as they are finalized.
/// Returns `Idle` when interrupted.
async fn run_turn(
    controller: &mut SessionController,
    prompt: &str,
    synapse_display: chrono::Duration,
) -> Result<TurnPhase> {
    let generation = controller.send(prompt);
    debug!(target: "chorus::cli", %generation, "sending prompt");

    let mut printed = controller.conversation().len();
    let mut edges = controller.synapses().len();

    while controller.is_turn_active() {
        tokio::select! {
            next = controller.next_event() => match next {
                None => break,
                Some(Err(e)) if !e.is_terminal() => {
                    debug!(target: "chorus::cli", error = %e, "event skipped");
                }
                Some(_) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                controller.disconnect();
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{}", "interrupted".yellow())?;
                return Ok(TurnPhase::Idle);
            }
        }

        let mut stdout = std::io::stdout().lock();
        for entry in &controller.conversation()[printed..] {
            print_entry(&mut stdout, entry)?;
        }
        printed = controller.conversation().len();

        edges = print_new_synapses(&mut stdout, controller, edges, synapse_display)?;
    }

    let snapshot = controller.snapshot();
    let mut stdout = std::io::stdout().lock();
    match snapshot.phase {
        TurnPhase::Errored => {
            let reason = snapshot.last_error_message().unwrap_or_default();
            writeln!(stdout, "{} {}", "error:".red().bold(), reason)?;
        }
        _ => {
            let local = snapshot.local_tally;
            match &snapshot.stats {
                Some(stats) => writeln!(
                    stdout,
                    "{}",
                    format!(
                        "server: {} messages, {} synapses | local: {} entries, {} edges",
                        stats.total_messages,
                        stats.total_synapses,
                        local.conversation_entries,
                        local.synapse_edges
                    )
                    .dimmed()
                )?,
                None => writeln!(
                    stdout,
                    "{}",
                    format!(
                        "local: {} entries, {} edges",
                        local.conversation_entries, local.synapse_edges
                    )
                    .dimmed()
                )?,
            }
        }
    }

    Ok(snapshot.phase)
}

/// Prints edges recorded since `seen`, each with the number of links still
/// inside the display window. Returns the new high-water mark.
fn print_new_synapses(
    out: &mut impl Write,
    controller: &SessionController,
    seen: usize,
    lifetime: chrono::Duration,
) -> std::io::Result<usize> {
    let all = controller.synapses();
    if all.len() > seen {
        let active = controller.visible_synapses(lifetime).len();
        for edge in &all[seen..] {
            writeln!(
                out,
                "{}",
                format!("  ~ {} built on {} ({active} active)", edge.to, edge.from).dimmed()
            )?;
        }
    }
    Ok(all.len())
}

fn print_entry(out: &mut impl Write, entry: &ConversationEntry) -> std::io::Result<()> {
    let Some(participant) = &entry.participant else {
        return Ok(());
    };
    let label = match entry.kind {
        Some(kind @ (MessageKind::Synthesis | MessageKind::Analysis | MessageKind::System)) => {
            format!("[{participant}] ({kind})")
        }
        _ => format!("[{participant}]"),
    };
    writeln!(out, "\n{}", label.cyan().bold())?;
    writeln!(out, "{}", entry.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::session::{ChannelEvent, ParticipantId, SessionId};
    use chorus_core::test_utils::{ManualClock, ScriptedTransport, connected, response_building_on};
    use std::time::Duration;

    fn command(models: &[&str], panelists: &[&str]) -> ChatCommand {
        ChatCommand {
            client: ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap(),
            mission: "Plan a launch".into(),
            models: models.iter().map(ToString::to_string).collect(),
            panelists: panelists.iter().map(|p| p.parse().unwrap()).collect(),
            prompt: None,
            synapse_display: chrono::Duration::seconds(3),
        }
    }

    #[test]
    fn panelists_take_over_the_session_request() {
        let request = command(&[], &["gpt-4o:strategist"]).session_request();
        assert!(request.selected_models.is_none());
        assert_eq!(request.panelists.unwrap()[0].model_id, "gpt-4o");

        let request = command(&["gpt-4o"], &[]).session_request();
        assert_eq!(request.selected_models, Some(vec!["gpt-4o".to_string()]));
        assert!(request.panelists.is_none());
    }

    #[test]
    fn synapse_lines_count_only_links_inside_the_display_window() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_open_turn(vec![]);
        let clock = Arc::new(ManualClock::at_epoch());
        let mut controller = SessionController::new(
            SessionId::new("s"),
            vec![ParticipantId::new("m1"), ParticipantId::new("m2")],
            transport,
            clock.clone(),
        );
        let generation = controller.send("prompt");
        let mut feed = |signal| {
            let _ = controller.handle(ChannelEvent { generation, signal });
        };
        feed(connected("s"));
        feed(response_building_on("m2", "yes", false, "m1"));
        clock.advance(chrono::Duration::seconds(5));
        feed(response_building_on("m1", "and", false, "m2"));

        let lifetime = chrono::Duration::seconds(3);
        let mut out = Vec::new();
        let seen = print_new_synapses(&mut out, &controller, 1, lifetime).unwrap();
        assert_eq!(seen, 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("m1 built on m2 (1 active)"));
        assert!(!text.contains("m2 built on m1"));

        let mut out = Vec::new();
        assert_eq!(print_new_synapses(&mut out, &controller, 2, lifetime).unwrap(), 2);
        assert!(out.is_empty());
    }
}
