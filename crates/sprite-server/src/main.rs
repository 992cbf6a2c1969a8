mod background;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sprite_api::{AppStateInner, middleware::create_token};
use sprite_chain::{PoolPriceSource, RpcDepositOracle, rpc_client};
use sprite_crypto::KeypairWithdrawalSigner;
use sprite_crypto::signing::WithdrawalSigner;
use sprite_db::Database;
use sprite_gateway::Dispatcher;
use sprite_ledger::{ActivityTracker, Ledger, PriceCache, RainDistributor, Workflow};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;

const TOKEN_VALID_DAYS: i64 = 365;
const PRUNE_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // `sprite token <adapter>` prints a bearer token and exits.
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [cmd, adapter] = args.as_slice() {
        if cmd == "token" {
            let secret = config::jwt_secret(std::env::var("SPRITE_JWT_SECRET").ok())?;
            println!("{}", create_token(&secret, adapter, TOKEN_VALID_DAYS)?);
            return Ok(());
        }
    }

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sprite=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init database
    let db = Arc::new(
        Database::open_with_pool(&config.db_path, config.db_pool)
            .with_context(|| format!("opening {}", config.db_path.display()))?,
    );

    // Chain collaborators
    let rpc = Arc::new(rpc_client(config.rpc_url.clone()));
    let oracle = Arc::new(RpcDepositOracle::new(rpc.clone(), config.program_id));
    let price_source = Arc::new(PoolPriceSource::new(rpc, config.ivy_pool, config.usdc_pool));
    let signer = Arc::new(KeypairWithdrawalSigner::from_keypair_bytes(
        &config.authority_keypair,
    )?);
    info!("withdraw authority {}", signer.authority());

    let ledger_config = Arc::new(config.ledger);
    let prices = PriceCache::new(price_source, ledger_config.price_max_age);
    {
        let prices = prices.clone();
        tokio::spawn(async move {
            if let Err(e) = prices.refresh().await {
                warn!("initial price refresh failed: {}", e);
            }
        });
    }

    let activity = ActivityTracker::new(db.clone(), ledger_config.clone());
    tokio::spawn(background::run_prune_loop(activity.clone(), PRUNE_INTERVAL_SECS));

    let state = Arc::new(AppStateInner {
        ledger: Ledger::new(db.clone(), prices.clone()),
        workflow: Workflow::new(db.clone(), oracle, signer, ledger_config.clone()),
        activity,
        rain: RainDistributor::new(db, ledger_config.clone()),
        prices,
        dispatcher: Dispatcher::new(),
        config: ledger_config,
        jwt_secret: config.jwt_secret,
    });

    let app = sprite_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Sprite ledger listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
