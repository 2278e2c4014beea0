use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::session::stats::CollaborationStats;
use crate::session::types::{ParticipantId, SessionId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub services: Option<ServiceHealth>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "healthy" | "operational")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub session_manager: Option<String>,
    #[serde(default)]
    pub providers: HashMap<String, bool>,
    #[serde(default)]
    pub available_models: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableModel {
    pub id: ParticipantId,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub collaboration_style: Option<String>,
    #[serde(default)]
    pub color_theme: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AvailableModelsResponse {
    #[serde(default)]
    pub models: Vec<AvailableModel>,
}

/// One seat on a panel: a model, optionally wearing a named persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelistSelection {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
}

/// Parses `model` or `model:persona`.
impl FromStr for PanelistSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (model, persona) = match s.split_once(':') {
            Some((model, persona)) => (model.trim(), Some(persona.trim())),
            None => (s.trim(), None),
        };
        if model.is_empty() {
            return Err(format!("panelist '{s}' has no model id"));
        }
        if persona.is_some_and(str::is_empty) {
            return Err(format!("panelist '{s}' has an empty persona"));
        }
        Ok(Self {
            model_id: model.to_string(),
            persona_id: persona.map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub mission: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_models: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panelists: Option<Vec<PanelistSelection>>,
}

impl CreateSessionRequest {
    pub fn with_models(mission: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            mission: mission.into(),
            selected_models: Some(models),
            panelists: None,
        }
    }

    pub fn with_panelists(mission: impl Into<String>, panelists: Vec<PanelistSelection>) -> Self {
        Self {
            mission: mission.into(),
            selected_models: None,
            panelists: Some(panelists),
        }
    }

    /// Rejects requests the server would refuse anyway.
    pub fn validate(&self) -> Result<(), String> {
        if self.mission.trim().is_empty() {
            return Err("mission must not be empty".to_string());
        }
        let has_models = self.selected_models.as_ref().is_some_and(|m| !m.is_empty());
        let has_panelists = self.panelists.as_ref().is_some_and(|p| !p.is_empty());
        if !has_models && !has_panelists {
            return Err("either selected_models or panelists must be provided".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panelist {
    pub id: ParticipantId,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    #[serde(default)]
    pub panelists: Vec<Panelist>,
}

impl CreateSessionResponse {
    pub fn roster(&self) -> Vec<ParticipantId> {
        self.panelists.iter().map(|p| p.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub active_models: Vec<String>,
    #[serde(default)]
    pub model_states: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub stats: Option<CollaborationStats>,
    /// Set when the server has no live orchestrator for the session.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSynapse {
    pub id: String,
    #[serde(default)]
    pub from_message: Option<String>,
    #[serde(default)]
    pub to_message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub strength: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationEvent {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynapseEventsReport {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub synapses: Vec<RecordedSynapse>,
    #[serde(default)]
    pub events: Vec<CollaborationEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validation_requires_mission_and_selection() {
        assert!(CreateSessionRequest::with_models("", vec!["gpt-4o".into()])
            .validate()
            .is_err());
        assert!(CreateSessionRequest::with_models("plan a launch", vec![])
            .validate()
            .is_err());
        assert!(CreateSessionRequest::with_models("plan a launch", vec!["gpt-4o".into()])
            .validate()
            .is_ok());
    }

    #[test]
    fn legacy_request_omits_panelists_field() {
        let body =
            serde_json::to_value(CreateSessionRequest::with_models("m", vec!["a".into()])).unwrap();
        assert!(body.get("panelists").is_none());
        assert_eq!(body["selected_models"][0], "a");
    }

    #[test]
    fn panelist_selection_parses_model_and_optional_persona() {
        let plain: PanelistSelection = "gpt-4o".parse().unwrap();
        assert_eq!(plain.model_id, "gpt-4o");
        assert_eq!(plain.persona_id, None);

        let seated: PanelistSelection = "claude-3-5-sonnet:strategist".parse().unwrap();
        assert_eq!(seated.persona_id.as_deref(), Some("strategist"));

        assert!(":strategist".parse::<PanelistSelection>().is_err());
        assert!("gpt-4o:".parse::<PanelistSelection>().is_err());
    }

    #[test]
    fn panelist_request_omits_selected_models() {
        let request = CreateSessionRequest::with_panelists(
            "plan a launch",
            vec!["gpt-4o:analyst".parse().unwrap()],
        );
        assert!(request.validate().is_ok());

        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("selected_models").is_none());
        assert_eq!(body["panelists"][0]["model_id"], "gpt-4o");
        assert_eq!(body["panelists"][0]["persona_id"], "analyst");
    }

    #[test]
    fn create_response_exposes_roster() {
        let response: CreateSessionResponse = serde_json::from_str(
            r#"{"session_id":"s-1","panelists":[
                {"id":"4b1e","role":"The Strategist","icon":"*","model":"gpt-4o"},
                {"id":"9c2f","role":"The Creative","icon":"~","model":"claude"}]}"#,
        )
        .unwrap();
        assert_eq!(
            response.roster(),
            vec![ParticipantId::new("4b1e"), ParticipantId::new("9c2f")]
        );
    }
}
