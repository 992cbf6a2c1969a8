use serde::{Deserialize, Serialize};

use crate::identity::UserIdentity;

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. `insufficient_balance`.
    pub code: String,
    pub error: String,
}

// -- Balances --

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub user: UserIdentity,
    pub balance_raw: u64,
    pub balance: String,
    pub usd_value: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    pub usd: f64,
    pub updated_at: Option<i64>,
}

// -- Tips --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TipRequest {
    pub from: UserIdentity,
    pub to: UserIdentity,
    /// Decimal amount, or `$`-prefixed USD amount.
    pub amount: String,
    /// Refuse the tip unless the recipient already has an account.
    #[serde(default)]
    pub require_existing_recipient: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TipResponse {
    pub from: UserIdentity,
    pub to: UserIdentity,
    pub amount_raw: u64,
    pub sender_balance_raw: u64,
    pub recipient_balance_raw: u64,
}

// -- Deposits --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDepositRequest {
    pub user: UserIdentity,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositResponse {
    pub deposit_id: String,
    pub user: String,
    pub amount_raw: u64,
    pub timestamp: i64,
    pub completed: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CheckDepositRequest {
    pub user: UserIdentity,
    pub prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    /// Oracle has not seen the on-chain deposit yet.
    Pending,
    /// Completed by this request.
    Completed,
    /// Completed by an earlier request.
    AlreadyCompleted,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckDepositResponse {
    pub status: DepositStatus,
    pub deposit_id: String,
    pub amount_raw: u64,
    pub new_balance_raw: Option<u64>,
}

// -- Withdrawals --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWithdrawalRequest {
    pub user: UserIdentity,
    pub amount: String,
    /// Base58 wallet address that may claim the withdrawal.
    pub destination: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub withdraw_id: String,
    pub user: String,
    pub amount_raw: u64,
    pub timestamp: i64,
    /// Hex-encoded authority signature over vault, destination and id.
    pub signature: String,
    pub new_balance_raw: Option<u64>,
}

// -- Listing --

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}

fn default_list_limit() -> u32 {
    10
}

// -- Activity --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityRequest {
    pub server: String,
    pub channel: String,
    pub user: UserIdentity,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityResponse {
    /// False when the channel is not on the rain whitelist.
    pub tracked: bool,
}

#[derive(Debug, Deserialize)]
pub struct EligibleQuery {
    pub min_score: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EligibleResponse {
    pub server: String,
    pub min_score: u8,
    pub users: Vec<UserIdentity>,
}

// -- Rain --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RainRequest {
    pub sender: UserIdentity,
    pub amount: String,
    pub max_recipients: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RainResponse {
    pub server: String,
    pub total_raw: u64,
    pub per_recipient_raw: u64,
    pub recipients: Vec<UserIdentity>,
    pub sender_balance_raw: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RainCheckResponse {
    pub server: String,
    pub min_score: u8,
    /// Users who would currently receive rain.
    pub eligible: usize,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RainChannelRequest {
    /// The user asking for the change; must be an operator.
    pub actor: UserIdentity,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RainChannelsResponse {
    pub server: String,
    pub channels: Vec<String>,
}
