use thiserror::Error;

/// Every way a ledger operation can fail.
///
/// Store-level conditions (zero rows affected, CAS mismatch, constraint
/// violations) surface as their own variants so callers never have to
/// inspect a generic storage error.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("balance of {user} changed concurrently, retry")]
    Conflict { user: String },

    #[error("deposit {0} is already completed")]
    AlreadyCompleted(String),

    #[error("insufficient balance for {user}")]
    InsufficientBalance { user: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("amount {amount_raw} is below the minimum of {minimum_raw}")]
    BelowMinimum { amount_raw: u64, minimum_raw: u64 },

    #[error("no recipients to distribute to")]
    NoRecipients,

    #[error("amount too small to split between {recipients} recipients")]
    AmountTooSmall { recipients: usize },

    #[error("no eligible users")]
    NoEligibleUsers,

    #[error("{0} is not an operator")]
    Forbidden(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Stable code used in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::AlreadyCompleted(_) => "already_completed",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InvalidInput(_) => "invalid_input",
            Self::BelowMinimum { .. } => "below_minimum",
            Self::NoRecipients => "no_recipients",
            Self::AmountTooSmall { .. } => "amount_too_small",
            Self::NoEligibleUsers => "no_eligible_users",
            Self::Forbidden(_) => "forbidden",
            Self::ExternalService(_) => "external_service",
            Self::Storage(_) => "storage",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
