// Database row types. These map directly to SQLite rows and stay separate
// from the sprite-types API models.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRow {
    pub deposit_id: String,
    pub user_id: String,
    pub timestamp: i64,
    pub amount_raw: u64,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRow {
    pub withdraw_id: String,
    pub user_id: String,
    pub timestamp: i64,
    pub amount_raw: u64,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRow {
    pub server_id: String,
    pub user_id: String,
    pub score: u8,
    pub last_message_timestamp: i64,
}

/// Result of completing a pending deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDeposit {
    pub user_id: String,
    pub amount_raw: u64,
    pub balance_raw: u64,
}
