use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sprite_ledger::amount::format_raw;
use sprite_types::api::{BalanceResponse, PriceResponse, TipRequest, TipResponse};
use sprite_types::events::GatewayEvent;

use crate::AppState;
use crate::error::{ApiResult, parse_user};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let adapters = state.dispatcher.adapters().await;
    Json(json!({ "status": "ok", "adapters": adapters.len() }))
}

pub async fn price(State(state): State<AppState>) -> Json<PriceResponse> {
    // Kick off a refresh when stale; the response carries the cached value.
    state.prices.get();
    let snapshot = state.prices.snapshot();
    Json(PriceResponse {
        usd: snapshot.usd,
        updated_at: snapshot.updated_at,
    })
}

pub async fn balance(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> ApiResult<Json<BalanceResponse>> {
    let user = parse_user(&user)?;
    let balance = state.ledger.balance(user).await?;

    Ok(Json(BalanceResponse {
        user,
        balance_raw: balance.balance_raw,
        balance: format_raw(balance.balance_raw),
        usd_value: balance.usd_value,
    }))
}

pub async fn tip(
    State(state): State<AppState>,
    Json(req): Json<TipRequest>,
) -> ApiResult<Json<TipResponse>> {
    let amount_raw = state.ledger.parse_amount(&req.amount)?;
    let receipt = state
        .ledger
        .tip(req.from, req.to, amount_raw, req.require_existing_recipient)
        .await?;

    state.dispatcher.broadcast(GatewayEvent::TipReceived {
        from: req.from,
        to: req.to,
        amount_raw,
        balance_raw: receipt.recipient_balance_raw,
    });

    Ok(Json(TipResponse {
        from: req.from,
        to: req.to,
        amount_raw,
        sender_balance_raw: receipt.sender_balance_raw,
        recipient_balance_raw: receipt.recipient_balance_raw,
    }))
}
