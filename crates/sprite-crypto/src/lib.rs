/// Sprite Crypto Library
///
/// Deposit/withdrawal identifiers, wallet key parsing, and the withdraw
/// authority signature that the on-chain vault verifies when a user claims.

pub mod ids;
pub mod keys;
pub mod signing;

pub use ids::LedgerId;
pub use signing::{KeypairWithdrawalSigner, WithdrawalSigner};
