//! HTTP route handlers for the API.

use std::sync::Arc;

use asclepius_common::{AgentSelection, TranscriptEntry};
use asclepius_coordinator::{TurnRequest, TurnResult};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub sessions: usize,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        sessions: state.orchestrator.session_count().await,
    })
}

/// Reply to a chat or upload request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub agent: String,
    pub involved_agents: Vec<String>,
    pub session_id: String,
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_subtype: Option<String>,
}

impl From<TurnResult> for ChatResponse {
    fn from(result: TurnResult) -> Self {
        Self {
            reply: result.response,
            agent: result.selected_agent.to_string(),
            involved_agents: result
                .involved_agents
                .iter()
                .map(AgentSelection::to_string)
                .collect(),
            session_id: result.session_id,
            blocked: result.blocked,
            image_subtype: result.image_subtype,
        }
    }
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub code: &'static str,
}

impl ErrorResponse {
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            code: "BAD_REQUEST",
        }
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: error.into(),
            code: "NOT_FOUND",
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Multipart fields shared by `/chat` and `/upload`.
#[derive(Debug, Default)]
struct TurnForm {
    message: Option<String>,
    session_id: Option<String>,
    file: Option<Vec<u8>>,
}

impl TurnForm {
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, ErrorResponse> {
        let mut multipart = multipart.map_err(|e| ErrorResponse::bad_request(e.body_text()))?;
        let mut form = TurnForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ErrorResponse::bad_request(format!("Malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ErrorResponse::bad_request(format!("Failed to read file: {e}")))?;
                    form.file = Some(bytes.to_vec());
                }
                "message" | "session_id" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ErrorResponse::bad_request(format!("Failed to read {name}: {e}")))?;
                    let slot = match name.as_str() {
                        "message" => &mut form.message,
                        _ => &mut form.session_id,
                    };
                    *slot = Some(text);
                }
                other => debug!(field = %other, "Ignoring unknown multipart field"),
            }
        }

        Ok(form)
    }

    fn session_id(&mut self) -> String {
        self.session_id
            .take()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

/// Submit a text message.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ChatResponse>, ErrorResponse> {
    let mut form = TurnForm::read(multipart).await?;
    let message = form
        .message
        .take()
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| ErrorResponse::bad_request("Field 'message' is required"))?;
    let session_id = form.session_id();

    info!(
        session_id = %session_id,
        content_preview = %message.chars().take(50).collect::<String>(),
        "Received chat message"
    );

    let result = state
        .orchestrator
        .submit(&session_id, TurnRequest::text(message))
        .await;
    Ok(Json(result.into()))
}

/// Submit an image, optionally with a message.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ChatResponse>, ErrorResponse> {
    let mut form = TurnForm::read(multipart).await?;
    let session_id = form.session_id();
    // A missing file still runs as an image turn and gets a diagnostic reply
    let image = form.file.take().unwrap_or_default();
    if image.is_empty() {
        warn!(session_id = %session_id, "Upload without image data");
    }

    info!(session_id = %session_id, bytes = image.len(), "Received image upload");

    let request = TurnRequest::image(form.message.take().unwrap_or_default(), image);
    let result = state.orchestrator.submit(&session_id, request).await;
    Ok(Json(result.into()))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<TranscriptEntry>,
}

/// Get a session's transcript.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ErrorResponse> {
    debug!(session_id = %session_id, "Getting session transcript");

    let transcript = state
        .orchestrator
        .transcript(&session_id)
        .await
        .ok_or_else(|| ErrorResponse::not_found(format!("Unknown session '{session_id}'")))?;

    Ok(Json(SessionResponse {
        session_id,
        messages: transcript.entries().to_vec(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub session_id: String,
    pub reset: bool,
}

/// Forget a session's transcript.
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<ResetResponse> {
    let reset = state.orchestrator.reset(&session_id).await;
    info!(session_id = %session_id, reset, "Session reset");
    Json(ResetResponse { session_id, reset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use asclepius_common::{InputType, Specialist};

    #[test]
    fn health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            uptime_seconds: 100,
            sessions: 2,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("\"sessions\":2"));
    }

    #[test]
    fn chat_response_from_fallback_turn() {
        let result = TurnResult {
            session_id: "abc".into(),
            turn_id: Uuid::new_v4(),
            input_type: InputType::Text,
            selected_agent: Specialist::WebSearchProcessorAgent.into(),
            response: "From the web".into(),
            involved_agents: vec![Specialist::RagAgent.into(), Specialist::WebSearchProcessorAgent.into()],
            image_subtype: None,
            blocked: false,
        };

        let response = ChatResponse::from(result);
        assert_eq!(response.agent, "WEB_SEARCH_PROCESSOR_AGENT");
        assert_eq!(response.involved_agents, vec!["RAG_AGENT", "WEB_SEARCH_PROCESSOR_AGENT"]);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("image_subtype").is_none());
    }

    #[test]
    fn error_response_body_omits_status() {
        let error = ErrorResponse::bad_request("Field 'message' is required");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["code"], "BAD_REQUEST");
        assert!(json.get("status").is_none());
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }
}
