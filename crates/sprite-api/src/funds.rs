use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sprite_db::models::{DepositRow, WithdrawalRow};
use sprite_types::api::{
    CheckDepositRequest, CheckDepositResponse, CreateDepositRequest, CreateWithdrawalRequest,
    DepositResponse, DepositStatus, ListQuery, WithdrawalResponse,
};
use sprite_types::events::GatewayEvent;

use crate::AppState;
use crate::error::{ApiResult, parse_user};

pub async fn create_deposit(
    State(state): State<AppState>,
    Json(req): Json<CreateDepositRequest>,
) -> ApiResult<impl IntoResponse> {
    let amount_raw = state.ledger.parse_amount(&req.amount)?;
    let row = state.workflow.create_deposit(req.user, amount_raw).await?;
    Ok((StatusCode::CREATED, Json(deposit_response(row))))
}

pub async fn check_deposit(
    State(state): State<AppState>,
    Json(req): Json<CheckDepositRequest>,
) -> ApiResult<Json<CheckDepositResponse>> {
    let check = state.workflow.check_deposit(req.user, &req.prefix).await?;

    if check.status == DepositStatus::Completed {
        state.dispatcher.broadcast(GatewayEvent::DepositCompleted {
            user: req.user,
            deposit_id: check.deposit.deposit_id.clone(),
            amount_raw: check.deposit.amount_raw,
            balance_raw: check.new_balance_raw.unwrap_or_default(),
        });
    }

    Ok(Json(CheckDepositResponse {
        status: check.status,
        deposit_id: check.deposit.deposit_id,
        amount_raw: check.deposit.amount_raw,
        new_balance_raw: check.new_balance_raw,
    }))
}

pub async fn list_deposits(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<DepositResponse>>> {
    let user = parse_user(&user)?;
    let rows = state.workflow.list_deposits(user, query.limit as usize).await?;
    Ok(Json(rows.into_iter().map(deposit_response).collect()))
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    Json(req): Json<CreateWithdrawalRequest>,
) -> ApiResult<impl IntoResponse> {
    let amount_raw = state.ledger.parse_amount(&req.amount)?;
    let (row, balance_raw) = state
        .workflow
        .create_withdrawal(req.user, amount_raw, &req.destination)
        .await?;

    state.dispatcher.broadcast(GatewayEvent::WithdrawalCreated {
        user: req.user,
        withdraw_id: row.withdraw_id.clone(),
        amount_raw: row.amount_raw,
    });

    Ok((
        StatusCode::CREATED,
        Json(withdrawal_response(row, Some(balance_raw))),
    ))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<WithdrawalResponse>>> {
    let user = parse_user(&user)?;
    let rows = state.workflow.list_withdrawals(user, query.limit as usize).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| withdrawal_response(row, None))
            .collect(),
    ))
}

fn deposit_response(row: DepositRow) -> DepositResponse {
    DepositResponse {
        deposit_id: row.deposit_id,
        user: row.user_id,
        amount_raw: row.amount_raw,
        timestamp: row.timestamp,
        completed: row.completed,
    }
}

fn withdrawal_response(row: WithdrawalRow, new_balance_raw: Option<u64>) -> WithdrawalResponse {
    WithdrawalResponse {
        withdraw_id: row.withdraw_id,
        user: row.user_id,
        amount_raw: row.amount_raw,
        timestamp: row.timestamp,
        signature: row.signature,
        new_balance_raw,
    }
}
