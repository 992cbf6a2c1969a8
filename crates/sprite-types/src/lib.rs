pub mod activity;
pub mod api;
pub mod events;
pub mod identity;

pub use identity::{IdentityError, Platform, UserIdentity};
