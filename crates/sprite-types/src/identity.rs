use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const TELEGRAM_PREFIX: &str = "tg:";
const DISCORD_PREFIX: &str = "discord:";

/// Chat platform a user identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Discord,
    Telegram,
}

/// A ledger account holder.
///
/// Storage encoding is canonical: Discord users are stored as the raw
/// snowflake, Telegram users as `tg:<id>`. Parsing also accepts the
/// `discord:<id>` form used for cross-platform references, which maps onto
/// the same account as the raw snowflake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UserIdentity {
    Discord(u64),
    Telegram(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid user identity: {0:?}")]
pub struct IdentityError(pub String);

impl UserIdentity {
    pub fn platform(&self) -> Platform {
        match self {
            Self::Discord(_) => Platform::Discord,
            Self::Telegram(_) => Platform::Telegram,
        }
    }

    /// The key stored in `users.user_id` and `activity.user_id`.
    pub fn canonical(&self) -> String {
        match self {
            Self::Discord(id) => id.to_string(),
            Self::Telegram(id) => format!("{TELEGRAM_PREFIX}{id}"),
        }
    }

    /// Mention string for cross-platform display (`discord:<id>` / `tg:<id>`).
    pub fn qualified(&self) -> String {
        match self {
            Self::Discord(id) => format!("{DISCORD_PREFIX}{id}"),
            Self::Telegram(id) => format!("{TELEGRAM_PREFIX}{id}"),
        }
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for UserIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || IdentityError(s.to_string());

        if let Some(rest) = s.strip_prefix(TELEGRAM_PREFIX) {
            return rest.parse::<i64>().map(Self::Telegram).map_err(|_| err());
        }

        let digits = s.strip_prefix(DISCORD_PREFIX).unwrap_or(s);
        // u64::from_str accepts a leading '+', snowflakes never carry one
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        digits.parse::<u64>().map(Self::Discord).map_err(|_| err())
    }
}

impl TryFrom<String> for UserIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UserIdentity> for String {
    fn from(id: UserIdentity) -> Self {
        id.canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_ids_are_prefixed() {
        let id: UserIdentity = "tg:42".parse().unwrap();
        assert_eq!(id, UserIdentity::Telegram(42));
        assert_eq!(id.canonical(), "tg:42");
        assert_eq!(id.platform(), Platform::Telegram);
    }

    #[test]
    fn discord_reference_maps_to_raw_snowflake() {
        let qualified: UserIdentity = "discord:123456789012345678".parse().unwrap();
        let raw: UserIdentity = "123456789012345678".parse().unwrap();
        assert_eq!(qualified, raw);
        assert_eq!(qualified.canonical(), "123456789012345678");
        assert_eq!(qualified.qualified(), "discord:123456789012345678");
    }

    #[test]
    fn rejects_malformed_identities() {
        for bad in ["", "tg:", "tg:abc", "discord:", "+12", "abc", "discord:-5", "12 34"] {
            assert!(bad.parse::<UserIdentity>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn serializes_as_canonical_string() {
        let json = serde_json::to_string(&UserIdentity::Telegram(-7)).unwrap();
        assert_eq!(json, "\"tg:-7\"");

        let back: UserIdentity = serde_json::from_str("\"discord:9\"").unwrap();
        assert_eq!(back, UserIdentity::Discord(9));
    }
}
