//! Liking and unliking tweets

use super::error::{LikeError, UnlikeError};
use super::{gate, Social};
use crate::error::StoreResult;
use crate::store::{LikeKey, LikeRelation, RowWriter};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A committed like and the tweet's new like count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    pub relation: LikeRelation,
    pub likes: i64,
}

pub fn like_body<W: RowWriter + ?Sized>(store: &mut W, key: LikeKey) -> StoreResult<LikeOutcome> {
    let relation = store.create_like(key)?;
    let tweet = store.increment_likes(relation.tweet_id)?;
    Ok(LikeOutcome {
        relation,
        likes: tweet.likes,
    })
}

/// Same gap as unfollow: the count drops even if the like was already gone
pub fn unlike_body<W: RowWriter + ?Sized>(store: &mut W, key: &LikeKey) -> StoreResult<()> {
    if store.delete_like(key)?.is_none() {
        warn!("unlike {}: like already gone", key);
    }
    store.decrement_likes(key.tweet_id)?;
    Ok(())
}

impl Social {
    pub async fn like_tweet(
        &self,
        username: &str,
        tweet_id: i64,
        cancel: &CancellationToken,
    ) -> Result<LikeOutcome, LikeError> {
        let key = LikeKey::new(username, tweet_id);
        gate::check_like(&self.db, &key).await?;

        let outcome = self.db.run_atomic(cancel, |tx| like_body(tx, key)).await?;
        info!("{} liked tweet {} (likes={})", username, tweet_id, outcome.likes);
        Ok(outcome)
    }

    pub async fn unlike_tweet(
        &self,
        username: &str,
        tweet_id: i64,
        cancel: &CancellationToken,
    ) -> Result<(), UnlikeError> {
        let key = LikeKey::new(username, tweet_id);
        gate::check_unlike(&self.db, &key).await?;

        self.db.run_atomic(cancel, |tx| unlike_body(tx, &key)).await?;
        info!("{} unliked tweet {}", username, tweet_id);
        Ok(())
    }
}
