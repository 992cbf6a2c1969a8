use std::sync::Arc;

use sprite_db::models::ActivityRow;
use sprite_db::{Database, LedgerError, Result, unix_now};
use sprite_types::UserIdentity;
use tracing::{debug, info};

use crate::{LedgerConfig, blocking, parse_identities};

/// Passive message tracking and the rain channel whitelist.
#[derive(Clone)]
pub struct ActivityTracker {
    db: Arc<Database>,
    config: Arc<LedgerConfig>,
}

impl ActivityTracker {
    pub fn new(db: Arc<Database>, config: Arc<LedgerConfig>) -> Self {
        Self { db, config }
    }

    /// Count a message towards the author's activity score, if the channel
    /// is on the server's rain whitelist. Returns the new score, or `None`
    /// when the channel is not tracked.
    pub async fn record_message(&self, server: &str, channel: &str, user: UserIdentity) -> Result<Option<u8>> {
        let server = server.to_string();
        let channel = channel.to_string();
        let key = user.canonical();

        blocking(&self.db, move |db| {
            if !db.is_rain_channel(&server, &channel)? {
                return Ok(None);
            }
            let score = db.touch_activity(&server, &key)?;
            debug!(server = %server, user = %key, score, "activity recorded");
            Ok(Some(score))
        })
        .await
    }

    /// Users of `server` with a score of at least `min_score`, highest first.
    /// Stale rows in every server are pruned first.
    pub async fn eligible(&self, server: &str, min_score: u8) -> Result<Vec<UserIdentity>> {
        let server = server.to_string();
        let keys = blocking(&self.db, move |db| db.eligible_for_rain(&server, min_score)).await?;
        Ok(parse_identities(keys))
    }

    /// Drop activity rows not touched within `horizon_secs`.
    pub async fn prune(&self, horizon_secs: i64) -> Result<usize> {
        let cutoff = unix_now() - horizon_secs;
        blocking(&self.db, move |db| db.prune_activity(cutoff)).await
    }

    pub async fn scores(&self, server: &str) -> Result<Vec<ActivityRow>> {
        let server = server.to_string();
        blocking(&self.db, move |db| db.active_users(&server)).await
    }

    pub async fn list_channels(&self, server: &str) -> Result<Vec<String>> {
        let server = server.to_string();
        blocking(&self.db, move |db| db.list_rain_channels(&server)).await
    }

    pub async fn add_channel(&self, actor: UserIdentity, server: &str, channel: &str) -> Result<bool> {
        self.require_operator(&actor)?;
        let (server, channel) = (server.to_string(), channel.to_string());
        let added = {
            let (server, channel) = (server.clone(), channel.clone());
            blocking(&self.db, move |db| db.add_rain_channel(&server, &channel)).await?
        };
        info!(actor = %actor, server = %server, channel = %channel, added, "rain channel added");
        Ok(added)
    }

    pub async fn remove_channel(&self, actor: UserIdentity, server: &str, channel: &str) -> Result<bool> {
        self.require_operator(&actor)?;
        let (server, channel) = (server.to_string(), channel.to_string());
        let removed = {
            let (server, channel) = (server.clone(), channel.clone());
            blocking(&self.db, move |db| db.remove_rain_channel(&server, &channel)).await?
        };
        info!(actor = %actor, server = %server, channel = %channel, removed, "rain channel removed");
        Ok(removed)
    }

    pub async fn clear_channels(&self, actor: UserIdentity, server: &str) -> Result<usize> {
        self.require_operator(&actor)?;
        let server = server.to_string();
        let cleared = {
            let server = server.clone();
            blocking(&self.db, move |db| db.clear_rain_channels(&server)).await?
        };
        info!(actor = %actor, server = %server, cleared, "rain channels cleared");
        Ok(cleared)
    }

    fn require_operator(&self, actor: &UserIdentity) -> Result<()> {
        if self.config.is_operator(actor) {
            Ok(())
        } else {
            Err(LedgerError::Forbidden(actor.qualified()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    const OPERATOR: UserIdentity = UserIdentity::Discord(1);
    const MEMBER: UserIdentity = UserIdentity::Discord(2);

    fn tracker(db: Arc<Database>) -> ActivityTracker {
        let mut config = LedgerConfig::default();
        config.operators.insert(OPERATOR);
        ActivityTracker::new(db, Arc::new(config))
    }

    #[tokio::test]
    async fn only_whitelisted_channels_count() {
        let db = testutil::db();
        let tracker = tracker(db.clone());

        assert_eq!(tracker.record_message("s", "general", MEMBER).await.unwrap(), None);
        assert_eq!(db.activity_score("s", "2").unwrap(), None);

        tracker.add_channel(OPERATOR, "s", "general").await.unwrap();
        assert_eq!(tracker.record_message("s", "general", MEMBER).await.unwrap(), Some(1));
        assert_eq!(tracker.record_message("s", "memes", MEMBER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn whitelist_changes_need_an_operator() {
        let tracker = tracker(testutil::db());

        assert!(matches!(
            tracker.add_channel(MEMBER, "s", "general").await,
            Err(LedgerError::Forbidden(_))
        ));
        assert!(matches!(
            tracker.clear_channels(MEMBER, "s").await,
            Err(LedgerError::Forbidden(_))
        ));

        assert!(tracker.add_channel(OPERATOR, "s", "general").await.unwrap());
        assert!(tracker.add_channel(OPERATOR, "s", "memes").await.unwrap());
        assert_eq!(tracker.list_channels("s").await.unwrap(), vec!["general", "memes"]);

        assert!(tracker.remove_channel(OPERATOR, "s", "memes").await.unwrap());
        assert_eq!(tracker.clear_channels(OPERATOR, "s").await.unwrap(), 1);
        assert!(tracker.list_channels("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn eligible_parses_identities() {
        let db = testutil::db();
        let now = unix_now();
        db.touch_activity_at("s", "2", now).unwrap();
        db.touch_activity_at("s", "tg:9", now).unwrap();
        db.touch_activity_at("s", "garbage", now).unwrap();

        let tracker = tracker(db);
        let mut users = tracker.eligible("s", 1).await.unwrap();
        users.sort_by_key(|u| u.canonical());
        assert_eq!(users, vec![UserIdentity::Discord(2), UserIdentity::Telegram(9)]);
    }

    #[tokio::test]
    async fn prune_drops_stale_rows() {
        let db = testutil::db();
        db.touch_activity_at("s", "2", unix_now() - 4_000).unwrap();
        db.touch_activity_at("s", "3", unix_now()).unwrap();

        let tracker = tracker(db.clone());
        assert_eq!(tracker.prune(1_800).await.unwrap(), 1);
        assert_eq!(tracker.scores("s").await.unwrap().len(), 1);
    }
}
