//! HTTP sidecar exposing the translation core.
//!
//! Routes only translate payloads; nothing here talks to an upstream.

use crate::channel::{ChannelDescriptor, ChannelPreset};
use crate::config::GatewayConfig;
use crate::error::ConvertError;
use crate::logging::{JournalLevel, SharedJournal};
use crate::pipeline;
use crate::translate::chat_types::{ChatCompletionRequest, ChatErrorResponse};
use crate::translate::deepseek::apply_deepseek_quirks;
use crate::translate::diagnostics::RequestDiagnostics;
use crate::translate::request::{chat_to_response_api_with_report, ForwardOptions};
use crate::translate::response::{response_to_chat, response_to_claude, ClaudeOutcome};
use crate::translate::responses_types::{ResponseApiRequest, ResponseApiResponse};
use crate::translate::reverse::{normalize_input_content_types, response_api_to_chat};
use crate::translate::Protocol;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const PROTOCOL_HEADER: &str = "x-gateway-protocol";
const DEFAULT_RECENT_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub journal: SharedJournal,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/translate/chat-request", post(handle_chat_request))
        .route("/v1/translate/responses-request", post(handle_responses_request))
        .route("/v1/translate/response-to-chat", post(handle_response_to_chat))
        .route("/v1/translate/response-to-claude", post(handle_response_to_claude))
        .route("/v1/translate/stream-to-chat", post(handle_stream_to_chat))
        .route("/health", get(handle_health))
        .route("/v1/channels", get(handle_channels))
        .route("/v1/diagnostics/recent", get(handle_recent))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ChannelQuery {
    channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

async fn handle_chat_request(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChannelQuery>,
    body: Bytes,
) -> Response {
    let mut req: ChatCompletionRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(e) => return error_response(&state, "chat-request", e),
    };
    let channel = match resolve_channel(&state.config, query.channel.as_deref(), &req.model) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    req.model = channel.model.clone();

    if channel.accepts_response_api() {
        let opts = ForwardOptions {
            redaction_threshold: state.config.redaction.threshold_bytes,
        };
        let (translated, report) = chat_to_response_api_with_report(&req, &opts);
        let diag = RequestDiagnostics::for_chat(&req).with_forward_report(&report);
        journal_request(&state, &channel, "Chat request translated to Responses API", &diag);
        return protocol_response(Protocol::ResponseApi, &translated);
    }

    let mut diag = RequestDiagnostics::for_chat(&req);
    if channel.is_deepseek() {
        diag = diag.with_quirks(apply_deepseek_quirks(&mut req));
    }
    journal_request(&state, &channel, "Chat request kept as Chat Completions", &diag);
    protocol_response(Protocol::ChatCompletions, &req)
}

async fn handle_responses_request(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChannelQuery>,
    body: Bytes,
) -> Response {
    let mut req: ResponseApiRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(e) => return error_response(&state, "responses-request", e),
    };
    let channel = match resolve_channel(&state.config, query.channel.as_deref(), &req.model) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    req.model = channel.model.clone();
    let diag = RequestDiagnostics::for_response_api(&req);

    if channel.accepts_response_api() {
        let stats = normalize_input_content_types(&mut req.input);
        let diag = diag.with_normalization(stats);
        journal_request(&state, &channel, "Responses request passed through", &diag);
        return protocol_response(Protocol::ResponseApi, &req);
    }

    let mut translated = match response_api_to_chat(&req) {
        Ok(t) => t,
        Err(e) => return error_response(&state, "responses-request", e),
    };
    let diag = if channel.is_deepseek() {
        diag.with_quirks(apply_deepseek_quirks(&mut translated))
    } else {
        diag
    };
    journal_request(&state, &channel, "Responses request translated to Chat Completions", &diag);
    protocol_response(Protocol::ChatCompletions, &translated)
}

async fn handle_response_to_chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match parse_body::<ResponseApiResponse>(&body) {
        Ok(resp) => Json(response_to_chat(&resp)).into_response(),
        Err(e) => error_response(&state, "response-to-chat", e),
    }
}

async fn handle_response_to_claude(Query(query): Query<StatusQuery>, body: Bytes) -> Response {
    match response_to_claude(query.status.unwrap_or(200), &body) {
        ClaudeOutcome::Translated(resp) => Json(resp).into_response(),
        ClaudeOutcome::Passthrough { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, body).into_response()
        }
    }
}

async fn handle_stream_to_chat(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
    body: Body,
) -> Response {
    let model = query.model.unwrap_or_default();
    let frames = pipeline::responses_sse_to_chat_sse(
        body.into_data_stream(),
        model,
        Some(state.journal.clone()),
    )
    .map(Ok::<_, Infallible>);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(frames))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_channels(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let presets: Vec<serde_json::Value> = ChannelPreset::all()
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name,
                "protocol": p.protocol,
                "base_url": p.base_url,
            })
        })
        .collect();

    Json(serde_json::json!({
        "object": "list",
        "data": state.config.descriptors(),
        "presets": presets,
    }))
}

async fn handle_recent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Json<serde_json::Value> {
    let entries = state.journal.recent(query.limit.unwrap_or(DEFAULT_RECENT_LIMIT));
    Json(serde_json::json!({ "object": "list", "data": entries }))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ConvertError> {
    Ok(serde_json::from_slice(body)?)
}

/// Configured channel for `name`, or the `openai` preset when none was named.
#[allow(clippy::result_large_err)]
fn resolve_channel(
    config: &GatewayConfig,
    name: Option<&str>,
    model: &str,
) -> Result<ChannelDescriptor, Response> {
    match name.filter(|n| !n.trim().is_empty()) {
        Some(name) => config.channel_for_model(name, model).ok_or_else(|| {
            let err = ChatErrorResponse::invalid_request(
                format!("Unknown channel '{}'", name),
                "unknown_channel",
            );
            (StatusCode::BAD_REQUEST, Json(err)).into_response()
        }),
        None => ChannelPreset::from_name("openai")
            .map(|preset| ChannelDescriptor::from_preset(preset, model))
            .ok_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
    }
}

fn journal_request(
    state: &AppState,
    channel: &ChannelDescriptor,
    message: &str,
    diag: &RequestDiagnostics,
) {
    tracing::info!(
        channel = %channel.name,
        protocol = %diag.protocol,
        model = %diag.model,
        items = diag.item_count,
        "{}",
        message
    );
    let mut context = diag.to_context();
    if let Some(map) = context.as_object_mut() {
        map.insert("channel".to_string(), serde_json::Value::String(channel.name.clone()));
    }
    state
        .journal
        .record_with_context(JournalLevel::Info, "translate", message, context);
}

fn protocol_response<T: serde::Serialize>(protocol: Protocol, payload: &T) -> Response {
    let mut response = Json(payload).into_response();
    if let Ok(value) = header::HeaderValue::from_str(protocol.as_str()) {
        response.headers_mut().insert(PROTOCOL_HEADER, value);
    }
    response
}

fn error_response(state: &AppState, route: &str, err: ConvertError) -> Response {
    if err.is_client_error() {
        tracing::warn!(route, code = err.code(), error = %err, "Rejected request");
        state.journal.record_with_context(
            JournalLevel::Warn,
            "translate",
            format!("Rejected {} request", route),
            serde_json::json!({ "code": err.code() }),
        );
        let body = ChatErrorResponse::invalid_request(err.to_string(), err.code());
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }
    tracing::error!(route, error = %err, "Translation failed");
    let body = ChatErrorResponse::internal(err.to_string());
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
