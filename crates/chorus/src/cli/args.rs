use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chorus_core::api::PanelistSelection;

/// Pose one prompt to a panel of models and watch them build on each other.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// Server base URL (overrides config file and CHORUS_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Path to the client config file (TOML format)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Check server health
    Health,
    /// List models the server can seat on a panel
    Models,
    /// Create a session and run one turn per prompt
    Chat {
        /// What the panel is asked to work on
        #[arg(long)]
        mission: String,
        /// Panel member (repeatable)
        #[arg(long = "model", value_name = "ID", required_unless_present = "panelists")]
        models: Vec<String>,
        /// Panel member with an optional persona (repeatable)
        #[arg(long = "panelist", value_name = "MODEL[:PERSONA]", conflicts_with = "models")]
        panelists: Vec<PanelistSelection>,
        /// Single prompt; without it every stdin line is a prompt
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Show server-side status and recorded synapses for a session
    Status {
        /// Session identifier
        session_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_collects_repeated_models() {
        let cli = Cli::parse_from([
            "chorus",
            "--base-url",
            "http://example.test",
            "chat",
            "--mission",
            "Plan",
            "--model",
            "gpt-4o",
            "--model",
            "claude-3-5-sonnet",
        ]);

        assert_eq!(cli.base_url.as_deref(), Some("http://example.test"));
        match cli.command {
            Commands::Chat {
                mission,
                models,
                panelists,
                prompt,
            } => {
                assert_eq!(mission, "Plan");
                assert_eq!(models, vec!["gpt-4o", "claude-3-5-sonnet"]);
                assert!(panelists.is_empty());
                assert!(prompt.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn chat_requires_a_model() {
        assert!(Cli::try_parse_from(["chorus", "chat", "--mission", "Plan"]).is_err());
    }

    #[test]
    fn chat_accepts_panelists_with_personas() {
        let cli = Cli::parse_from([
            "chorus",
            "chat",
            "--mission",
            "Plan",
            "--panelist",
            "gpt-4o:strategist",
            "--panelist",
            "claude-3-5-sonnet",
        ]);

        let Commands::Chat {
            models, panelists, ..
        } = cli.command
        else {
            panic!("expected chat command");
        };
        assert!(models.is_empty());
        assert_eq!(panelists.len(), 2);
        assert_eq!(panelists[0].model_id, "gpt-4o");
        assert_eq!(panelists[0].persona_id.as_deref(), Some("strategist"));
        assert_eq!(panelists[1].persona_id, None);
    }

    #[test]
    fn chat_rejects_models_mixed_with_panelists_or_bad_panelists() {
        assert!(
            Cli::try_parse_from([
                "chorus", "chat", "--mission", "Plan", "--model", "gpt-4o", "--panelist",
                "claude-3-5-sonnet",
            ])
            .is_err()
        );
        assert!(
            Cli::try_parse_from(["chorus", "chat", "--mission", "Plan", "--panelist", ":analyst"])
                .is_err()
        );
    }
}
