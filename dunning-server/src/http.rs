//! Dunning HTTP API
//!
//! Axum-based HTTP server for the calling agent's browser client.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum dispatch
//! machinery.
//!
//! Endpoints:
//! - GET  /token                  — ephemeral realtime session token (upstream body verbatim)
//! - POST /summarize-conversation — normalize a call's event log and summarize it
//! - GET  /health                 — liveness and debtor source mode
//! - GET  /version                — server version and model info

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use dunning_core::{
    normalize, DebtorContextProvider, DunningConfig, DunningError, NormalizerPolicy,
    OpenAiClient, RawSessionEvent, SessionTokenIssuer, SheetsDebtorSource, SummaryRequester,
};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Shared, read-only state for all HTTP handlers
pub struct AppState {
    pub config: DunningConfig,
    pub issuer: SessionTokenIssuer,
    pub debtors: DebtorContextProvider,
    pub summarizer: SummaryRequester,
    pub policy: NormalizerPolicy,
}

impl AppState {
    /// Wire up the pipeline components from configuration and secrets.
    ///
    /// Without a spreadsheet API key (or sheet id) the debtor provider runs in
    /// fallback-only mode.
    pub fn from_config(
        config: DunningConfig,
        openai_api_key: &str,
        sheets_api_key: Option<String>,
    ) -> Result<Self, DunningError> {
        let client = OpenAiClient::with_base_url(
            config.openai.client_config(openai_api_key),
            config.openai.base_url.clone(),
        )?;

        let debtors = match config.debtor_source.sheets_config(sheets_api_key) {
            Some(sheets) => {
                let source =
                    SheetsDebtorSource::with_base_url(sheets, config.debtor_source.base_url.clone())
                        .map_err(|e| DunningError::Other(e.to_string()))?;
                DebtorContextProvider::new(Box::new(source))
            }
            None => {
                tracing::warn!("Debtor source not configured — every call uses the fallback debtor");
                DebtorContextProvider::without_source()
            }
        };

        let policy = NormalizerPolicy::from(&config.normalizer);

        Ok(Self {
            issuer: SessionTokenIssuer::new(client.clone()),
            summarizer: SummaryRequester::new(client),
            debtors,
            policy,
            config,
        })
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/token", get(token_handler))
        .route("/summarize-conversation", post(summarize_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Dunning HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct SummarizeRequest {
    /// Missing and `null` both mean an empty log.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub events: Vec<RawSessionEvent>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<RawSessionEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<RawSessionEvent>>::deserialize(deserializer)?.unwrap_or_default())
}

const INVALID_BODY: &str = "Invalid request body";

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }

    fn to_value(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.error })
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner token — resolve debtor, compose instructions, relay the upstream body.
pub async fn token_inner(state: &AppState) -> (StatusCode, Bytes) {
    match state.issuer.issue_for_next_call(&state.debtors).await {
        Ok(token) => {
            let status = StatusCode::from_u16(token.status).unwrap_or(StatusCode::OK);
            (status, token.body)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to issue realtime session token");
            let body = ErrorResponse::new("Failed to generate token").to_value();
            (StatusCode::INTERNAL_SERVER_ERROR, Bytes::from(body.to_string()))
        }
    }
}

/// Inner summarize — normalize the event log, then request a summary.
pub async fn summarize_inner(
    state: &AppState,
    req: SummarizeRequest,
) -> (StatusCode, serde_json::Value) {
    let transcript = normalize(&req.events, &state.policy);

    match state.summarizer.summarize(&transcript).await {
        Ok(result) => (StatusCode::OK, serde_json::json!(result)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to summarize conversation");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Failed to summarize conversation").to_value(),
            )
        }
    }
}

/// Inner health (pure, no IO).
pub fn health_inner(state: &AppState) -> serde_json::Value {
    serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "debtor_source": state.debtors.source_name(),
    })
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner(config: &DunningConfig) -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "realtime_model": config.openai.realtime_model,
        "summary_model": config.openai.summary_model,
    })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn token_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = token_inner(&state).await;
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

pub async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SummarizeRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected summarize request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(INVALID_BODY).to_value()),
            );
        }
    };
    let (status, body) = summarize_inner(&state, req).await;
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner(&state)))
}

pub async fn version_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner(&state.config)))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
