//! API route handlers for the gateway.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use sitepulse_core::error::SitePulseError;
use std::sync::Arc;

use crate::server::AppState;

type ApiResponse = (StatusCode, Json<Value>);

fn ok(body: Value) -> ApiResponse {
    (StatusCode::OK, Json(body))
}

fn fail(err: &SitePulseError) -> ApiResponse {
    let status = match err {
        SitePulseError::Validation(_) => StatusCode::BAD_REQUEST,
        SitePulseError::ChannelNotRegistered(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"ok": false, "error": err.user_message()})))
}

/// Health check endpoint.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "sitepulse-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// System information endpoint.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "name": "SitePulse",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "channels": state.queue.channel_count(),
        "schedules": state.scheduler.len(),
        "sessions": state.router.sessions().len(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub user_id: String,
    pub channel_id: String,
    pub text: String,
}

/// Inbound trigger: one text message from a user on a channel.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MessageRequest>,
) -> ApiResponse {
    match state
        .router
        .handle(&body.user_id, &body.channel_id, &body.text)
        .await
    {
        Ok(reply) => ok(json!({
            "ok": true,
            "intent": reply.intent.name(),
            "reply": reply.text,
        })),
        Err(e) => fail(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    pub channel_id: String,
    pub token: String,
}

/// Register or re-register a channel's delivery token.
pub async fn register_channel(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChannelRequest>,
) -> ApiResponse {
    match state.queue.register_channel(&body.channel_id, &body.token) {
        Ok(()) => ok(json!({"ok": true, "channel_id": body.channel_id.trim()})),
        Err(e) => fail(&e),
    }
}

/// List a user's scheduled scans.
pub async fn list_schedules(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    let schedules: Vec<Value> = state
        .scheduler
        .list_for_user(&user_id)
        .into_iter()
        .map(|d| {
            json!({
                "id": d.id,
                "url": d.target_url,
                "channel_id": d.channel_id,
                "every": d.interval.value,
                "unit": d.interval.unit,
                "active": d.active,
                "run_count": d.run_count,
                "last_run": d.last_run.to_rfc3339(),
                "next_run": d.next_due().to_rfc3339(),
            })
        })
        .collect();
    Json(json!({"ok": true, "schedules": schedules}))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelQuery {
    /// Cancel only this URL; all of the user's scans when absent.
    pub url: Option<String>,
}

pub async fn cancel_schedules(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<CancelQuery>,
) -> ApiResponse {
    match query.url {
        Some(url) => {
            let removed = state.scheduler.cancel(&user_id, &url);
            let status = if removed { StatusCode::OK } else { StatusCode::NOT_FOUND };
            (status, Json(json!({"ok": removed, "removed": usize::from(removed)})))
        }
        None => {
            let removed = state.scheduler.cancel_all(&user_id);
            ok(json!({"ok": true, "removed": removed}))
        }
    }
}
