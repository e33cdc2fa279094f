//! REST surface of the outreach core.
//!
//! This is what the external collaborators talk to: the discovery service
//! posts new shows, the outreach dispatcher drives sends, the inbound mail
//! webhook posts replies, and the dashboard reads aggregates. Role and tier
//! arrive as headers set by the (external) auth layer; we only run the
//! capability checks.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::access::{self, Role, Tier};
use crate::attribution::AttributionLedger;
use crate::config::AppConfig;
use crate::conversations::model::{NewMessage, Sentiment};
use crate::conversations::store::ConversationStore;
use crate::error::{DatabaseError, Error};
use crate::pipeline::controller::PipelineController;
use crate::shows::model::NewShow;
use crate::shows::registry::ShowRegistry;
use crate::templates::engine::{RenderContext, recognized_tokens_in};
use crate::templates::model::NewTemplate;
use crate::templates::store::TemplateStore;

/// Shared state for all API routes.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<ShowRegistry>,
    pub conversations: Arc<ConversationStore>,
    pub pipeline: Arc<PipelineController>,
    pub templates: Arc<TemplateStore>,
    pub attribution: Arc<AttributionLedger>,
    pub config: Arc<AppConfig>,
}

/// Build the API router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/shows", post(create_show).get(list_shows))
        .route("/api/shows/{id}", get(get_show))
        .route("/api/shows/{id}/qualify", post(qualify_show))
        .route("/api/shows/{id}/outreach", post(send_outreach))
        .route("/api/shows/{id}/followup", post(send_followup))
        .route("/api/shows/{id}/reply", post(receive_reply))
        .route("/api/shows/{id}/booking", post(confirm_booking))
        .route("/api/shows/{id}/conversation", get(get_conversation))
        .route("/api/conversations/{id}/read", post(mark_read))
        .route("/api/pipeline/counts", get(pipeline_counts))
        .route("/api/templates", get(list_templates).post(create_template))
        .route("/api/templates/{id}/render", post(render_template))
        .route("/api/templates/{id}/active", post(set_template_active))
        .route("/api/attribution", post(record_attribution))
        .route("/api/attribution/{user_id}", get(get_attribution))
        .with_state(state)
}

// ── Error mapping ───────────────────────────────────────────────────

/// Wrapper so handlers can use `?` on core errors.
struct ApiError(Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Database(DatabaseError::Constraint(_)) => StatusCode::CONFLICT,
            Error::Pipeline(_) => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Config(_) | Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "Internal error");
        }
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn forbidden(reason: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": reason})),
    )
        .into_response()
}

/// Read the role/tier claims the auth layer injected. Absent or unknown
/// values fall back to least privilege.
fn claims(headers: &HeaderMap) -> (Role, Tier) {
    let role = Role::parse_or_default(headers.get("x-role").and_then(|v| v.to_str().ok()));
    let tier = Tier::parse_or_default(headers.get("x-tier").and_then(|v| v.to_str().ok()));
    (role, tier)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

// ── Shows ───────────────────────────────────────────────────────────

async fn create_show(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(new): Json<NewShow>,
) -> ApiResult<Response> {
    let (_, tier) = claims(&headers);
    if let Some(limit) = tier.show_limit() {
        let total = state.registry.stage_counts().await?.total();
        if total >= limit {
            return Ok(forbidden(&format!(
                "show limit reached for tier ({limit})"
            )));
        }
    }
    let show = state.registry.create(new).await?;
    Ok((StatusCode::CREATED, Json(show)).into_response())
}

#[derive(Deserialize)]
struct ListShowsQuery {
    stage: Option<String>,
}

async fn list_shows(
    State(state): State<ApiState>,
    Query(query): Query<ListShowsQuery>,
) -> ApiResult<Response> {
    let stage = match query.stage.as_deref() {
        Some(s) => Some(s.parse()?),
        None => None,
    };
    let shows = state.registry.list(stage).await?;
    Ok(Json(shows).into_response())
}

async fn get_show(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    let show = state.registry.get(id).await?;
    Ok(Json(show).into_response())
}

async fn pipeline_counts(State(state): State<ApiState>) -> ApiResult<Response> {
    let counts = state.registry.stage_counts().await?;
    Ok(Json(json!({"counts": counts, "total": counts.total()})).into_response())
}

// ── Pipeline events ─────────────────────────────────────────────────

async fn qualify_show(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    let stage = state.pipeline.qualify(id).await?;
    Ok(Json(json!({"show_id": id, "stage": stage})).into_response())
}

async fn confirm_booking(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let stage = state.pipeline.confirm_booking(id).await?;
    Ok(Json(json!({"show_id": id, "stage": stage})).into_response())
}

/// Body for outreach and follow-up sends. Sender fields default to the
/// configured sender profile.
#[derive(Deserialize)]
struct OutreachRequest {
    template_id: Uuid,
    #[serde(default)]
    your_name: Option<String>,
    #[serde(default)]
    your_title: Option<String>,
    #[serde(default)]
    your_main_link: Option<String>,
}

impl OutreachRequest {
    fn context(&self, show: &crate::shows::model::Show, config: &AppConfig) -> RenderContext {
        RenderContext {
            host_name: show.host_name.clone(),
            show_name: Some(show.name.clone()),
            your_name: self.your_name.clone().or_else(|| config.sender_name.clone()),
            your_title: self
                .your_title
                .clone()
                .or_else(|| config.sender_title.clone()),
            your_main_link: self
                .your_main_link
                .clone()
                .or_else(|| config.sender_main_link.clone()),
        }
    }
}

/// Shared body of the outreach and follow-up handlers: render and validate
/// the outbound message first, then advance the pipeline, then record the
/// sent message on the thread. A send that fails render, validation, or the
/// transition table leaves no trace — no stage change, nothing appended.
async fn dispatch_send(
    state: &ApiState,
    show_id: Uuid,
    request: OutreachRequest,
    followup: bool,
) -> ApiResult<Response> {
    let show = state.registry.get(show_id).await?;
    let ctx = request.context(&show, &state.config);
    let rendered = state.templates.render(request.template_id, &ctx).await?;
    let conversation = state.conversations.get_by_show(show_id).await?;

    // A template of nothing but missing tokens renders to an empty body;
    // reject it here, before any state changes.
    let sender_name = ctx.your_name.clone().unwrap_or_else(|| "You".to_string());
    let outbound = NewMessage {
        sender_name,
        sender_email: state.config.sender_email.clone().unwrap_or_default(),
        body: rendered.body.clone(),
        is_you: true,
    };
    outbound.validate()?;

    let stage = if followup {
        state.pipeline.send_followup(show_id).await?
    } else {
        state.pipeline.send_outreach(show_id).await?
    };

    let message = state
        .conversations
        .append_message(conversation.id, outbound)
        .await?;

    Ok(Json(json!({
        "show_id": show_id,
        "stage": stage,
        "message_id": message.id,
        "subject": rendered.subject,
        "body": rendered.body,
    }))
    .into_response())
}

async fn send_outreach(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<OutreachRequest>,
) -> ApiResult<Response> {
    dispatch_send(&state, id, request, false).await
}

async fn send_followup(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<OutreachRequest>,
) -> ApiResult<Response> {
    dispatch_send(&state, id, request, true).await
}

/// Inbound reply webhook body. An unclassified reply defaults to `neutral`.
#[derive(Deserialize)]
struct ReplyRequest {
    sender_name: String,
    sender_email: String,
    body: String,
    #[serde(default)]
    sentiment: Option<Sentiment>,
}

async fn receive_reply(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReplyRequest>,
) -> ApiResult<Response> {
    let conversation = state.conversations.get_by_show(id).await?;

    // Append first, classify second, transition last — the reply is kept on
    // the thread even when the pipeline rejects the event (e.g. an
    // unsolicited reply before any pitch went out).
    let message = state
        .conversations
        .append_message(
            conversation.id,
            NewMessage {
                sender_name: request.sender_name,
                sender_email: request.sender_email,
                body: request.body,
                is_you: false,
            },
        )
        .await?;

    let sentiment = request.sentiment.unwrap_or(Sentiment::Neutral);
    state
        .conversations
        .set_sentiment(conversation.id, sentiment)
        .await?;

    let stage = state.pipeline.receive_reply(id, sentiment).await?;

    Ok(Json(json!({
        "show_id": id,
        "stage": stage,
        "sentiment": sentiment,
        "message_id": message.id,
    }))
    .into_response())
}

// ── Conversations ───────────────────────────────────────────────────

async fn get_conversation(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let conversation = state.conversations.get_by_show(id).await?;
    let thread = state.conversations.thread(conversation.id).await?;
    Ok(Json(json!({"conversation": conversation, "thread": thread})).into_response())
}

async fn mark_read(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    state.conversations.mark_read(id).await?;
    Ok(Json(json!({"conversation_id": id, "unread": false})).into_response())
}

// ── Templates ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListTemplatesQuery {
    #[serde(default)]
    active_only: bool,
}

async fn list_templates(
    State(state): State<ApiState>,
    Query(query): Query<ListTemplatesQuery>,
) -> ApiResult<Response> {
    let templates = state.templates.list(query.active_only).await?;
    Ok(Json(templates).into_response())
}

async fn create_template(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(new): Json<NewTemplate>,
) -> ApiResult<Response> {
    let (role, tier) = claims(&headers);
    if !access::can_manage_templates(role, tier) {
        return Ok(forbidden("template management requires a paid tier"));
    }
    let tokens = recognized_tokens_in(&new.body);
    let template = state.templates.create(new).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"template": template, "recognized_tokens": tokens})),
    )
        .into_response())
}

async fn render_template(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(ctx): Json<RenderContext>,
) -> ApiResult<Response> {
    let rendered = state.templates.render(id, &ctx).await?;
    Ok(Json(rendered).into_response())
}

#[derive(Deserialize)]
struct SetActiveRequest {
    active: bool,
}

async fn set_template_active(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> ApiResult<Response> {
    let (role, tier) = claims(&headers);
    if !access::can_manage_templates(role, tier) {
        return Ok(forbidden("template management requires a paid tier"));
    }
    state.templates.set_active(id, request.active).await?;
    Ok(Json(json!({"template_id": id, "active": request.active})).into_response())
}

// ── Attribution ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AttributionRequest {
    user_id: String,
    referral_id: String,
}

async fn record_attribution(
    State(state): State<ApiState>,
    Json(request): Json<AttributionRequest>,
) -> ApiResult<Response> {
    let record = state
        .attribution
        .record(&request.user_id, &request.referral_id)
        .await?;
    Ok(Json(record).into_response())
}

async fn get_attribution(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    match state.attribution.lookup(&user_id).await? {
        Some(record) => Ok(Json(record).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("no attribution for user {user_id}")})),
        )
            .into_response()),
    }
}
