use serde::{Deserialize, Serialize};

use crate::identity::{Platform, UserIdentity};

/// Events pushed to chat adapters over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the adapter connection
    Ready { adapter: String },

    /// A user received a tip
    TipReceived {
        from: UserIdentity,
        to: UserIdentity,
        amount_raw: u64,
        balance_raw: u64,
    },

    /// One recipient's share of a rain
    RainReceived {
        server: String,
        from: UserIdentity,
        to: UserIdentity,
        amount_raw: u64,
    },

    /// Summary for the channel the rain was issued in
    RainCompleted {
        server: String,
        sender: UserIdentity,
        recipient_count: usize,
        per_recipient_raw: u64,
        total_raw: u64,
    },

    /// A pending deposit was verified and credited
    DepositCompleted {
        user: UserIdentity,
        deposit_id: String,
        amount_raw: u64,
        balance_raw: u64,
    },

    /// A withdrawal was signed and debited
    WithdrawalCreated {
        user: UserIdentity,
        withdraw_id: String,
        amount_raw: u64,
    },
}

impl GatewayEvent {
    /// Platform of the user this event is addressed to.
    /// `None` means the event goes to every adapter.
    pub fn recipient_platform(&self) -> Option<Platform> {
        match self {
            Self::TipReceived { to, .. } => Some(to.platform()),
            Self::RainReceived { to, .. } => Some(to.platform()),
            Self::DepositCompleted { user, .. } => Some(user.platform()),
            Self::WithdrawalCreated { user, .. } => Some(user.platform()),
            Self::RainCompleted { sender, .. } => Some(sender.platform()),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM adapter TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Only forward events addressed to these platforms.
    /// An empty list restores the default of receiving everything.
    Subscribe { platforms: Vec<Platform> },
}
