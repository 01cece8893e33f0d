//! HTTP request handlers

use crate::api::server::AppContext;
use crate::engine::EngineStatus;
use crate::navigation::LinkAction;
use crate::playback::click::ClickOutcome;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct MuteResponse {
    muted: bool,
}

#[derive(Debug, Serialize)]
pub struct EffectsResponse {
    suppressed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClickRequest {
    /// 0.0-1.0; the configured default when absent
    volume: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct ClickResponse {
    outcome: ClickOutcome,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    href: String,
    target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    path: String,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    changed: bool,
    page: ambience_common::PageState,
}

type ErrorResponse = (StatusCode, Json<StatusResponse>);

fn bad_request(message: impl Into<String>) -> ErrorResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(StatusResponse {
            status: format!("error: {}", message.into()),
        }),
    )
}

// ============================================================================
// Health / Status
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "ambience-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /status
pub async fn status(State(ctx): State<AppContext>) -> Json<EngineStatus> {
    Json(ctx.engine.status())
}

// ============================================================================
// Toggles
// ============================================================================

/// POST /mute/toggle
pub async fn toggle_mute(State(ctx): State<AppContext>) -> Json<MuteResponse> {
    let muted = ctx.engine.toggle_mute();
    Json(MuteResponse { muted })
}

/// POST /effects/toggle
pub async fn toggle_effects(State(ctx): State<AppContext>) -> Json<EffectsResponse> {
    let suppressed = ctx.engine.toggle_effect_suppress();
    Json(EffectsResponse { suppressed })
}

/// POST /click
///
/// An empty body plays at the default volume.
pub async fn click(
    State(ctx): State<AppContext>,
    body: Option<Json<ClickRequest>>,
) -> Result<Json<ClickResponse>, ErrorResponse> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    if let Some(volume) = req.volume {
        if !(0.0..=1.0).contains(&volume) {
            return Err(bad_request("volume must be within 0.0-1.0"));
        }
    }
    let outcome = ctx.engine.play_click(req.volume);
    Ok(Json(ClickResponse { outcome }))
}

// ============================================================================
// Navigation
// ============================================================================

/// POST /navigation/link
pub async fn link_clicked(
    State(ctx): State<AppContext>,
    Json(req): Json<LinkRequest>,
) -> Json<LinkAction> {
    let action = ctx
        .engine
        .navigation()
        .on_link_click(&req.href, req.target.as_deref())
        .await;
    Json(action)
}

/// POST /navigation/location
pub async fn location_changed(
    State(ctx): State<AppContext>,
    Json(req): Json<LocationRequest>,
) -> Result<Json<LocationResponse>, ErrorResponse> {
    if !req.path.starts_with('/') {
        return Err(bad_request("path must be absolute"));
    }
    let navigation = ctx.engine.navigation();
    let changed = navigation.on_location_changed(&req.path).await;
    if changed {
        info!("Location changed to {}", req.path);
    }
    Ok(Json(LocationResponse {
        changed,
        page: navigation.current_page(),
    }))
}
