use axum::{
    Json,
    extract::{Path, Query, State},
};
use sprite_types::api::{
    ActivityRequest, ActivityResponse, EligibleQuery, EligibleResponse, RainChannelRequest,
    RainChannelsResponse, RainCheckResponse, RainRequest, RainResponse,
};
use sprite_types::events::GatewayEvent;
use tracing::warn;

use crate::AppState;
use crate::error::ApiResult;

/// Record a message seen by an adapter. Tracking is passive, so a store
/// failure is logged and reported as untracked rather than surfaced.
pub async fn record_activity(
    State(state): State<AppState>,
    Json(req): Json<ActivityRequest>,
) -> Json<ActivityResponse> {
    let tracked = match state
        .activity
        .record_message(&req.server, &req.channel, req.user)
        .await
    {
        Ok(score) => score.is_some(),
        Err(e) => {
            warn!(server = %req.server, user = %req.user, "activity tracking failed: {}", e);
            false
        }
    };
    Json(ActivityResponse { tracked })
}

pub async fn eligible(
    State(state): State<AppState>,
    Path(server): Path<String>,
    Query(query): Query<EligibleQuery>,
) -> ApiResult<Json<EligibleResponse>> {
    let min_score = query.min_score.unwrap_or(state.config.rain_min_score);
    let users = state.activity.eligible(&server, min_score).await?;
    Ok(Json(EligibleResponse {
        server,
        min_score,
        users,
    }))
}

pub async fn rain(
    State(state): State<AppState>,
    Path(server): Path<String>,
    Json(req): Json<RainRequest>,
) -> ApiResult<Json<RainResponse>> {
    let total_raw = state.ledger.parse_amount(&req.amount)?;
    let receipt = state
        .rain
        .rain(&server, req.sender, total_raw, None, req.max_recipients)
        .await?;

    let shares = receipt.recipients.iter().map(|to| GatewayEvent::RainReceived {
        server: server.clone(),
        from: req.sender,
        to: *to,
        amount_raw: receipt.per_recipient_raw,
    });
    state.dispatcher.broadcast_all(shares);
    state.dispatcher.broadcast(GatewayEvent::RainCompleted {
        server: server.clone(),
        sender: req.sender,
        recipient_count: receipt.recipients.len(),
        per_recipient_raw: receipt.per_recipient_raw,
        total_raw: receipt.total_raw,
    });

    Ok(Json(RainResponse {
        server,
        total_raw: receipt.total_raw,
        per_recipient_raw: receipt.per_recipient_raw,
        recipients: receipt.recipients,
        sender_balance_raw: receipt.sender_balance_raw,
    }))
}

pub async fn rain_check(
    State(state): State<AppState>,
    Path(server): Path<String>,
    Query(query): Query<EligibleQuery>,
) -> ApiResult<Json<RainCheckResponse>> {
    let min_score = query.min_score.unwrap_or(state.config.rain_min_score);
    let eligible = state.rain.rain_check(&server, Some(min_score)).await?;
    Ok(Json(RainCheckResponse {
        server,
        min_score,
        eligible,
    }))
}

pub async fn list_channels(
    State(state): State<AppState>,
    Path(server): Path<String>,
) -> ApiResult<Json<RainChannelsResponse>> {
    let channels = state.activity.list_channels(&server).await?;
    Ok(Json(RainChannelsResponse { server, channels }))
}

pub async fn add_channel(
    State(state): State<AppState>,
    Path((server, channel)): Path<(String, String)>,
    Json(req): Json<RainChannelRequest>,
) -> ApiResult<Json<RainChannelsResponse>> {
    state.activity.add_channel(req.actor, &server, &channel).await?;
    list_channels(State(state), Path(server)).await
}

pub async fn remove_channel(
    State(state): State<AppState>,
    Path((server, channel)): Path<(String, String)>,
    Json(req): Json<RainChannelRequest>,
) -> ApiResult<Json<RainChannelsResponse>> {
    state.activity.remove_channel(req.actor, &server, &channel).await?;
    list_channels(State(state), Path(server)).await
}

pub async fn clear_channels(
    State(state): State<AppState>,
    Path(server): Path<String>,
    Json(req): Json<RainChannelRequest>,
) -> ApiResult<Json<RainChannelsResponse>> {
    state.activity.clear_channels(req.actor, &server).await?;
    Ok(Json(RainChannelsResponse {
        server,
        channels: Vec::new(),
    }))
}
