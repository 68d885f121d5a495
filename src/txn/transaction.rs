//! Scoped store handle for one atomic unit
//!
//! Every write is applied to the tables immediately (so later steps of the
//! same unit see it) and recorded twice: as a redo mutation for the commit
//! log and as its inverse for rollback.

use crate::aof::{AofEntry, AofWriter};
use crate::error::{StoreError, StoreResult};
use crate::store::{
    Account, CounterField, CreateAccountParams, CreateTweetParams, FollowKey, FollowRelation,
    LikeKey, LikeRelation, ListFollowersParams, ListFollowingParams, ListTweetsParams, Mutation,
    RowReader, RowWriter, Tables, Tweet, UpdateEmailParams, UpdateNameParams,
    UpdatePasswordParams,
};
use chrono::Utc;
use tracing::{debug, error, warn};

/// Handle bound to one open atomic unit
pub struct Transaction<'a> {
    id: u64,
    tables: &'a mut Tables,
    redo: Vec<Mutation>,
    undo: Vec<Mutation>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(id: u64, tables: &'a mut Tables) -> Self {
        debug!("txn {}: begin", id);
        Transaction {
            id,
            tables,
            redo: Vec::new(),
            undo: Vec::new(),
        }
    }

    /// Apply one mutation and remember how to undo it
    fn write(&mut self, mutation: Mutation) -> StoreResult<()> {
        let inverse = self.tables.inverse(&mutation)?;
        self.tables.apply(&mutation)?;
        self.redo.push(mutation);
        self.undo.push(inverse);
        Ok(())
    }

    fn require_account(&self, username: &str) -> StoreResult<Account> {
        self.tables
            .account(username)
            .cloned()
            .ok_or_else(|| StoreError::not_found("account", username))
    }

    fn require_tweet(&self, id: i64) -> StoreResult<Tweet> {
        self.tables
            .tweet(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("tweet", id))
    }

    fn adjust_counter(&mut self, username: &str, field: CounterField, delta: i64) -> StoreResult<Account> {
        let mut account = self.require_account(username)?;
        match field {
            CounterField::Followers => account.followers_count += delta,
            CounterField::Following => account.following_count += delta,
        }
        self.write(Mutation::PutAccount(account.clone()))?;
        Ok(account)
    }

    fn adjust_likes(&mut self, tweet_id: i64, delta: i64) -> StoreResult<Tweet> {
        let mut tweet = self.require_tweet(tweet_id)?;
        tweet.likes += delta;
        self.write(Mutation::PutTweet(tweet.clone()))?;
        Ok(tweet)
    }

    /// Make the unit durable
    ///
    /// The whole unit goes to the commit log as one entry. If that append
    /// fails, the in-memory changes are rolled back before reporting.
    pub(crate) fn commit(self, aof: Option<&AofWriter>) -> StoreResult<()> {
        if self.redo.is_empty() {
            debug!("txn {}: commit (read-only)", self.id);
            return Ok(());
        }

        if let Some(writer) = aof {
            let entry = AofEntry::commit(self.id, self.redo.clone());
            if let Err(e) = writer.write(&entry) {
                error!("txn {}: commit log append failed: {}", self.id, e);
                return Err(self.abort(e));
            }
        }

        debug!("txn {}: commit ({} mutations)", self.id, self.redo.len());
        Ok(())
    }

    /// Revert every write of the unit and hand back the error to report
    ///
    /// Returns `cause` unchanged when the rollback succeeds, or a
    /// [`StoreError::RollbackFailed`] carrying both errors when it does not.
    pub(crate) fn abort(self, cause: StoreError) -> StoreError {
        warn!("txn {}: rolling back {} mutations: {}", self.id, self.undo.len(), cause);

        for inverse in self.undo.iter().rev() {
            if let Err(rollback) = self.tables.apply(inverse) {
                error!(
                    "txn {}: rollback failed at {}: {}",
                    self.id,
                    inverse.label(),
                    rollback
                );
                return StoreError::RollbackFailed {
                    cause: Box::new(cause),
                    rollback: Box::new(rollback),
                };
            }
        }

        cause
    }

    #[cfg(test)]
    pub(crate) fn push_undo(&mut self, mutation: Mutation) {
        self.undo.push(mutation);
    }
}

impl RowReader for Transaction<'_> {
    fn get_account(&self, username: &str) -> StoreResult<Option<Account>> {
        self.tables.get_account(username)
    }

    fn get_follow(&self, key: &FollowKey) -> StoreResult<Option<FollowRelation>> {
        self.tables.get_follow(key)
    }

    fn list_followers(&self, params: &ListFollowersParams) -> StoreResult<Vec<FollowRelation>> {
        self.tables.list_followers(params)
    }

    fn list_following(&self, params: &ListFollowingParams) -> StoreResult<Vec<FollowRelation>> {
        self.tables.list_following(params)
    }

    fn get_like(&self, key: &LikeKey) -> StoreResult<Option<LikeRelation>> {
        self.tables.get_like(key)
    }

    fn get_tweet(&self, id: i64) -> StoreResult<Option<Tweet>> {
        self.tables.get_tweet(id)
    }

    fn list_tweets(&self, params: &ListTweetsParams) -> StoreResult<Vec<Tweet>> {
        self.tables.list_tweets(params)
    }
}

impl RowWriter for Transaction<'_> {
    fn create_account(&mut self, params: CreateAccountParams) -> StoreResult<Account> {
        if self.tables.account(&params.username).is_some() {
            return Err(StoreError::unique("account", &params.username));
        }
        if self.tables.email_owner(&params.email).is_some() {
            return Err(StoreError::unique("account email", &params.email));
        }

        let now = Utc::now();
        let account = Account {
            username: params.username,
            email: params.email,
            hashed_password: params.hashed_password,
            name: params.name,
            followers_count: 0,
            following_count: 0,
            password_changed_at: now,
            created_at: now,
        };
        self.write(Mutation::PutAccount(account.clone()))?;
        Ok(account)
    }

    fn delete_account(&mut self, username: &str) -> StoreResult<Option<Account>> {
        let Some(account) = self.tables.account(username).cloned() else {
            return Ok(None);
        };
        self.write(Mutation::RemoveAccount(username.to_string()))?;
        Ok(Some(account))
    }

    fn update_email(&mut self, params: UpdateEmailParams) -> StoreResult<Account> {
        let mut account = self.require_account(&params.username)?;
        account.email = params.email;
        self.write(Mutation::PutAccount(account.clone()))?;
        Ok(account)
    }

    fn update_name(&mut self, params: UpdateNameParams) -> StoreResult<Account> {
        let mut account = self.require_account(&params.username)?;
        account.name = params.name;
        self.write(Mutation::PutAccount(account.clone()))?;
        Ok(account)
    }

    fn update_password(&mut self, params: UpdatePasswordParams) -> StoreResult<Account> {
        let mut account = self.require_account(&params.username)?;
        account.hashed_password = params.hashed_password;
        account.password_changed_at = Utc::now();
        self.write(Mutation::PutAccount(account.clone()))?;
        Ok(account)
    }

    fn create_follow(&mut self, key: FollowKey) -> StoreResult<FollowRelation> {
        if self.tables.follow(&key).is_some() {
            return Err(StoreError::unique("follow", &key));
        }
        for username in [&key.follower_username, &key.followed_username] {
            if self.tables.account(username).is_none() {
                return Err(StoreError::foreign_key("follow", "account", username));
            }
        }

        let relation = FollowRelation {
            id: self.tables.next_follow_id(),
            follower_username: key.follower_username,
            followed_username: key.followed_username,
            created_at: Utc::now(),
        };
        self.write(Mutation::PutFollow(relation.clone()))?;
        Ok(relation)
    }

    fn delete_follow(&mut self, key: &FollowKey) -> StoreResult<Option<FollowRelation>> {
        let Some(relation) = self.tables.follow(key).cloned() else {
            return Ok(None);
        };
        self.write(Mutation::RemoveFollow(key.clone()))?;
        Ok(Some(relation))
    }

    fn increment_counter(&mut self, username: &str, field: CounterField) -> StoreResult<Account> {
        self.adjust_counter(username, field, 1)
    }

    fn decrement_counter(&mut self, username: &str, field: CounterField) -> StoreResult<Account> {
        self.adjust_counter(username, field, -1)
    }

    fn create_like(&mut self, key: LikeKey) -> StoreResult<LikeRelation> {
        if self.tables.like(&key).is_some() {
            return Err(StoreError::unique("like", &key));
        }
        if self.tables.account(&key.username).is_none() {
            return Err(StoreError::foreign_key("like", "account", &key.username));
        }
        if self.tables.tweet(key.tweet_id).is_none() {
            return Err(StoreError::foreign_key("like", "tweet", key.tweet_id));
        }

        let relation = LikeRelation {
            id: self.tables.next_like_id(),
            username: key.username,
            tweet_id: key.tweet_id,
            created_at: Utc::now(),
        };
        self.write(Mutation::PutLike(relation.clone()))?;
        Ok(relation)
    }

    fn delete_like(&mut self, key: &LikeKey) -> StoreResult<Option<LikeRelation>> {
        let Some(relation) = self.tables.like(key).cloned() else {
            return Ok(None);
        };
        self.write(Mutation::RemoveLike(key.clone()))?;
        Ok(Some(relation))
    }

    fn increment_likes(&mut self, tweet_id: i64) -> StoreResult<Tweet> {
        self.adjust_likes(tweet_id, 1)
    }

    fn decrement_likes(&mut self, tweet_id: i64) -> StoreResult<Tweet> {
        self.adjust_likes(tweet_id, -1)
    }

    fn create_tweet(&mut self, params: CreateTweetParams) -> StoreResult<Tweet> {
        if self.tables.account(&params.username).is_none() {
            return Err(StoreError::foreign_key("tweet", "account", &params.username));
        }

        let tweet = Tweet {
            id: self.tables.next_tweet_id(),
            body: params.body,
            username: params.username,
            likes: 0,
            created_at: Utc::now(),
        };
        self.write(Mutation::PutTweet(tweet.clone()))?;
        Ok(tweet)
    }

    fn delete_tweet(&mut self, id: i64) -> StoreResult<Option<Tweet>> {
        let Some(tweet) = self.tables.tweet(id).cloned() else {
            return Ok(None);
        };
        self.write(Mutation::RemoveTweet(id))?;
        Ok(Some(tweet))
    }
}
