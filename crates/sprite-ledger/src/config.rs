use std::collections::HashSet;
use std::time::Duration;

use sprite_chain::Pubkey;
use sprite_types::UserIdentity;

/// Ledger policy, built by the server from its environment.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Vault the deposit and withdrawal accounts belong to.
    pub vault: Pubkey,
    /// Smallest rain total, in raw units.
    pub rain_min_raw: u64,
    /// Activity score a user needs to receive rain.
    pub rain_min_score: u8,
    /// Users allowed to manage the rain channel whitelist.
    pub operators: HashSet<UserIdentity>,
    pub price_max_age: Duration,
    /// Upper bound on deposit/withdrawal list sizes.
    pub list_limit_max: usize,
}

impl LedgerConfig {
    pub fn is_operator(&self, user: &UserIdentity) -> bool {
        self.operators.contains(user)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            vault: Pubkey::default(),
            rain_min_raw: 10_000_000,
            rain_min_score: 5,
            operators: HashSet::new(),
            price_max_age: Duration::from_secs(60),
            list_limit_max: 50,
        }
    }
}
