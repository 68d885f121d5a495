//! Tweets and the home feed

use super::error::TweetError;
use super::Social;
use crate::error::StoreResult;
use crate::store::{CreateTweetParams, ListFollowingParams, ListTweetsParams, RowReader, RowWriter, Tweet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Followed accounts considered when building a feed
pub const FEED_FOLLOWING_LIMIT: usize = 10_000;

/// Newest tweets taken from each followed account
pub const FEED_TWEETS_PER_AUTHOR: usize = 100;

impl Social {
    pub async fn create_tweet(
        &self,
        params: CreateTweetParams,
        cancel: &CancellationToken,
    ) -> StoreResult<Tweet> {
        let tweet = self
            .db
            .run_atomic(cancel, |tx| tx.create_tweet(params))
            .await?;
        info!("{} posted tweet {}", tweet.username, tweet.id);
        Ok(tweet)
    }

    pub async fn get_tweet(&self, id: i64) -> Result<Tweet, TweetError> {
        self.db
            .reader()
            .await
            .get_tweet(id)?
            .ok_or(TweetError::NotFound(id))
    }

    /// Delete a tweet, returning it
    ///
    /// Likes on the tweet stay in place.
    pub async fn delete_tweet(
        &self,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Tweet, TweetError> {
        if self.db.reader().await.get_tweet(id)?.is_none() {
            return Err(TweetError::NotFound(id));
        }

        let deleted = self.db.run_atomic(cancel, |tx| tx.delete_tweet(id)).await?;
        let tweet = deleted.ok_or(TweetError::NotFound(id))?;
        info!("Tweet {} deleted", id);
        Ok(tweet)
    }

    /// Tweets from everyone `username` follows, newest first
    pub async fn feed(&self, username: &str) -> StoreResult<Vec<Tweet>> {
        let view = self.db.reader().await;
        let relations = view.list_following(&ListFollowingParams {
            follower_username: username.to_string(),
            limit: FEED_FOLLOWING_LIMIT,
            offset: 0,
        })?;

        let mut feed = Vec::new();
        for relation in &relations {
            feed.extend(view.list_tweets(&ListTweetsParams {
                username: relation.followed_username.clone(),
                limit: FEED_TWEETS_PER_AUTHOR,
                offset: 0,
            })?);
        }
        feed.sort_unstable_by(|a, b| b.id.cmp(&a.id));

        debug!("Feed for {}: {} tweets from {} accounts", username, feed.len(), relations.len());
        Ok(feed)
    }
}
