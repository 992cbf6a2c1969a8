use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use sprite_chain::Pubkey;
use sprite_crypto::keys::{keypair_from_hex, parse_pubkey};
use sprite_ledger::LedgerConfig;
use sprite_ledger::amount::parse_amount;
use sprite_types::UserIdentity;

const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_VAULT: &str = "AVXJfx8UsdkTPBL2UHuVDb3QVPvBw7P1sDH4fRXF1WiH";
const DEFAULT_PROGRAM_ID: &str = "DkGdbW8SJmUoVE9KaBRwrvsQVhcuidy47DimjrhSoySE";
const DEFAULT_IVY_POOL: &str = "2NuvyEVTus5PgrTzJcCKXdF1kJczBJmuPm41y5BZbpqC";
const DEFAULT_USDC_POOL: &str = "CyehsvWv3pVzbf7gSs98MUm3vTjfRjqixTQjRfFEwxnF";

/// Secrets that ship in examples and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

pub struct ServerConfig {
    pub db_path: PathBuf,
    pub db_pool: usize,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub rpc_url: String,
    pub program_id: Pubkey,
    pub ivy_pool: Pubkey,
    pub usdc_pool: Pubkey,
    /// 64-byte ed25519 keypair of the withdraw authority.
    pub authority_keypair: [u8; 64],
    pub ledger: LedgerConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let authority = get("WITHDRAW_AUTHORITY_KEY")
            .ok_or_else(|| anyhow!("WITHDRAW_AUTHORITY_KEY is not set"))?;
        let authority_keypair =
            keypair_from_hex(&authority).context("WITHDRAW_AUTHORITY_KEY")?;

        let rain_min_raw = parse_amount(&var("RAIN_MIN_AMOUNT", "0.01"), || 0.0)
            .map_err(|e| anyhow!("RAIN_MIN_AMOUNT: {}", e))?;

        let ledger = LedgerConfig {
            vault: pubkey("SPRITE_VAULT", &var("SPRITE_VAULT", DEFAULT_VAULT))?,
            rain_min_raw,
            rain_min_score: var("RAIN_ACTIVITY_REQUIREMENT", "5")
                .parse()
                .context("RAIN_ACTIVITY_REQUIREMENT")?,
            operators: parse_operators(&var("SPRITE_OPERATORS", ""))?,
            price_max_age: Duration::from_secs(
                var("PRICE_MAX_AGE_SECS", "60")
                    .parse()
                    .context("PRICE_MAX_AGE_SECS")?,
            ),
            ..LedgerConfig::default()
        };

        Ok(Self {
            db_path: PathBuf::from(var("SPRITE_DB_PATH", "sprite.db")),
            db_pool: var("SPRITE_DB_POOL", "4").parse().context("SPRITE_DB_POOL")?,
            host: var("SPRITE_HOST", "0.0.0.0"),
            port: var("SPRITE_PORT", "3100").parse().context("SPRITE_PORT")?,
            jwt_secret: jwt_secret(get("SPRITE_JWT_SECRET"))?,
            rpc_url: var("RPC_URL", DEFAULT_RPC_URL),
            program_id: pubkey("SPRITE_PROGRAM_ID", &var("SPRITE_PROGRAM_ID", DEFAULT_PROGRAM_ID))?,
            ivy_pool: pubkey("IVY_POOL", &var("IVY_POOL", DEFAULT_IVY_POOL))?,
            usdc_pool: pubkey("USDC_POOL", &var("USDC_POOL", DEFAULT_USDC_POOL))?,
            authority_keypair,
            ledger,
        })
    }
}

/// The token signing secret. Required, and never a well-known placeholder.
pub fn jwt_secret(value: Option<String>) -> Result<String> {
    let secret = value.map(|s| s.trim().to_string()).unwrap_or_default();
    if secret.is_empty() {
        bail!("SPRITE_JWT_SECRET is not set");
    }
    if PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
        bail!("SPRITE_JWT_SECRET is a placeholder value, set a real secret");
    }
    Ok(secret)
}

fn pubkey(name: &str, value: &str) -> Result<Pubkey> {
    parse_pubkey(value).with_context(|| format!("{} is not a base58 public key", name))
}

fn parse_operators(value: &str) -> Result<HashSet<UserIdentity>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<UserIdentity>().map_err(|e| anyhow!("SPRITE_OPERATORS: {}", e)))
        .collect()
}
