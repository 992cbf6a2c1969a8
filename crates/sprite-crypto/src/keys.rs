use std::str::FromStr;

use anyhow::{Result, anyhow};
use solana_sdk::pubkey::Pubkey;

/// Decode a hex-encoded 64-byte ed25519 keypair (secret || public).
pub fn keypair_from_hex(encoded: &str) -> Result<[u8; 64]> {
    let bytes = hex::decode(encoded.trim())?;
    let key: [u8; 64] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| anyhow!("Invalid keypair length: required 64, got {}", v.len()))?;
    Ok(key)
}

/// Parse a base58 wallet address, tolerating surrounding whitespace.
pub fn parse_pubkey(encoded: &str) -> Result<Pubkey> {
    Pubkey::from_str(encoded.trim()).map_err(|e| anyhow!("Invalid public key: {}", e))
}
