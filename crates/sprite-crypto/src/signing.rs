use anyhow::{Result, anyhow};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::signer::keypair::keypair_from_seed;

use crate::ids::LedgerId;

/// Produces the authority signature a user presents to the vault program
/// to claim a withdrawal.
pub trait WithdrawalSigner: Send + Sync {
    /// Public key of the withdraw authority.
    fn authority(&self) -> Pubkey;

    fn sign_withdrawal(&self, vault: &Pubkey, user: &Pubkey, id: &LedgerId) -> Result<Signature>;
}

/// Signed message: vault address (32) || user key (32) || withdraw id (32).
pub fn withdrawal_message(vault: &Pubkey, user: &Pubkey, id: &LedgerId) -> [u8; 96] {
    let mut message = [0u8; 96];
    message[..32].copy_from_slice(vault.as_ref());
    message[32..64].copy_from_slice(user.as_ref());
    message[64..].copy_from_slice(id.as_bytes());
    message
}

/// Signs with a locally held authority keypair.
pub struct KeypairWithdrawalSigner {
    keypair: Keypair,
}

impl KeypairWithdrawalSigner {
    /// Build from a 64-byte keypair; the public half must match the secret.
    pub fn from_keypair_bytes(bytes: &[u8; 64]) -> Result<Self> {
        let signer = Self::from_secret(&bytes[..32])?;
        if signer.authority().to_bytes()[..] != bytes[32..] {
            return Err(anyhow!(
                "Invalid withdraw authority keypair: public key does not match the secret"
            ));
        }
        Ok(signer)
    }

    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        let keypair = keypair_from_seed(secret)
            .map_err(|e| anyhow!("Invalid withdraw authority secret: {}", e))?;
        Ok(Self { keypair })
    }
}

impl WithdrawalSigner for KeypairWithdrawalSigner {
    fn authority(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn sign_withdrawal(&self, vault: &Pubkey, user: &Pubkey, id: &LedgerId) -> Result<Signature> {
        let message = withdrawal_message(vault, user, id);
        Ok(self.keypair.sign_message(&message))
    }
}

/// Check a withdrawal signature against an authority key.
pub fn verify_withdrawal(
    authority: &Pubkey,
    vault: &Pubkey,
    user: &Pubkey,
    id: &LedgerId,
    signature: &Signature,
) -> bool {
    let message = withdrawal_message(vault, user, id);
    signature.verify(authority.as_ref(), &message)
}
