/// Sprite API Library
///
/// axum handlers for the chat adapters, bearer-token auth and the mapping
/// from ledger errors to HTTP responses.

pub mod balances;
pub mod error;
pub mod funds;
pub mod gateway;
pub mod middleware;
pub mod rain;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use sprite_gateway::Dispatcher;
use sprite_ledger::{ActivityTracker, Ledger, LedgerConfig, PriceCache, RainDistributor, Workflow};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub ledger: Ledger,
    pub workflow: Workflow,
    pub activity: ActivityTracker,
    pub rain: RainDistributor,
    pub prices: Arc<PriceCache>,
    pub dispatcher: Dispatcher,
    pub config: Arc<LedgerConfig>,
    pub jwt_secret: String,
}

/// Every adapter-facing route. Only `/health` is reachable without a token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(balances::health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/price", get(balances::price))
        .route("/users/{user}/balance", get(balances::balance))
        .route("/tips", post(balances::tip))
        .route("/deposits", post(funds::create_deposit))
        .route("/deposits/check", post(funds::check_deposit))
        .route("/users/{user}/deposits", get(funds::list_deposits))
        .route("/withdrawals", post(funds::create_withdrawal))
        .route("/users/{user}/withdrawals", get(funds::list_withdrawals))
        .route("/activity", post(rain::record_activity))
        .route("/servers/{server}/eligible", get(rain::eligible))
        .route("/servers/{server}/rain", post(rain::rain))
        .route("/servers/{server}/rain-check", get(rain::rain_check))
        .route(
            "/servers/{server}/rain-channels",
            get(rain::list_channels).delete(rain::clear_channels),
        )
        .route(
            "/servers/{server}/rain-channels/{channel}",
            put(rain::add_channel).delete(rain::remove_channel),
        )
        .route("/gateway", get(gateway::ws_upgrade))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
