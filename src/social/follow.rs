//! Follow and unfollow

use super::error::{FollowError, UnfollowError};
use super::{gate, Social};
use crate::error::StoreResult;
use crate::store::{CounterField, FollowKey, FollowRelation, RowWriter};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A committed follow and the counters it moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowOutcome {
    pub relation: FollowRelation,
    pub follower_following_count: i64,
    pub followed_followers_count: i64,
}

/// Create the relation, then bump both counters
///
/// Fails with a unique violation when the relation already exists.
pub fn follow_body<W: RowWriter + ?Sized>(store: &mut W, key: FollowKey) -> StoreResult<FollowOutcome> {
    let relation = store.create_follow(key)?;
    let follower = store.increment_counter(&relation.follower_username, CounterField::Following)?;
    let followed = store.increment_counter(&relation.followed_username, CounterField::Followers)?;

    Ok(FollowOutcome {
        relation,
        follower_following_count: follower.following_count,
        followed_followers_count: followed.followers_count,
    })
}

/// Delete the relation, then drop both counters
///
/// The counters are decremented even when no relation was deleted. Two
/// unfollows that both passed the gate therefore push the counters one
/// below the true relation count.
pub fn unfollow_body<W: RowWriter + ?Sized>(store: &mut W, key: &FollowKey) -> StoreResult<()> {
    if store.delete_follow(key)?.is_none() {
        warn!("unfollow {}: relation already gone", key);
    }
    store.decrement_counter(&key.follower_username, CounterField::Following)?;
    store.decrement_counter(&key.followed_username, CounterField::Followers)?;
    Ok(())
}

impl Social {
    /// `follower` starts following `target`
    pub async fn follow(
        &self,
        follower: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<FollowOutcome, FollowError> {
        let key = FollowKey::new(follower, target);
        gate::check_follow(&self.db, &key).await?;

        let outcome = self.db.run_atomic(cancel, |tx| follow_body(tx, key)).await?;
        info!(
            "{} followed {} (following={}, followers={})",
            follower, target, outcome.follower_following_count, outcome.followed_followers_count
        );
        Ok(outcome)
    }

    /// `follower` stops following `target`
    pub async fn unfollow(
        &self,
        follower: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<(), UnfollowError> {
        let key = FollowKey::new(follower, target);
        gate::check_unfollow(&self.db, &key).await?;

        self.db.run_atomic(cancel, |tx| unfollow_body(tx, &key)).await?;
        info!("{} unfollowed {}", follower, target);
        Ok(())
    }
}
