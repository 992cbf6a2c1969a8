use std::fmt;

use anyhow::{Result, anyhow};
use rand::RngCore;

pub const ID_LEN: usize = 32;
const RANDOM_LEN: usize = 24;

/// 32-byte deposit/withdrawal identifier.
///
/// Layout: 24 random bytes followed by the requested amount as a
/// little-endian u64, so the on-chain program can read the amount back out
/// of the id. Displayed and stored as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedgerId([u8; ID_LEN]);

impl LedgerId {
    /// Generate a fresh id for the given amount.
    pub fn generate(amount_raw: u64) -> Self {
        let mut bytes = [0u8; ID_LEN];
        rand::rng().fill_bytes(&mut bytes[..RANDOM_LEN]);
        bytes[RANDOM_LEN..].copy_from_slice(&amount_raw.to_le_bytes());
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded)?;
        let bytes: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| anyhow!("Invalid id length: {} bytes", v.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Amount encoded in the trailing 8 bytes.
    pub fn amount_raw(&self) -> u64 {
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&self.0[RANDOM_LEN..]);
        u64::from_le_bytes(tail)
    }

    /// First 8 hex characters, enough for users to type back as a prefix.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerId({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_is_little_endian_tail() {
        let id = LedgerId::generate(750_000_000);
        assert_eq!(id.amount_raw(), 750_000_000);
        assert_eq!(&id.as_bytes()[24..], &750_000_000u64.to_le_bytes());
    }

    #[test]
    fn hex_form_is_64_chars() {
        let id = LedgerId::generate(1);
        let encoded = id.to_hex();
        assert_eq!(encoded.len(), 64);
        assert_eq!(LedgerId::from_hex(&encoded).unwrap(), id);
        assert!(encoded.starts_with(&id.short()));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(LedgerId::generate(5), LedgerId::generate(5));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(LedgerId::from_hex("abcd").is_err());
        assert!(LedgerId::from_hex("zz").is_err());
    }
}
