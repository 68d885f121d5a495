//! In-memory table set
//!
//! Rows are kept in SipHash-keyed maps with secondary indexes for the
//! paged lookups (followers, following, tweets by author). All changes go
//! through [`Tables::apply`], which is also what commit log replay and
//! rollback use.

use super::mutation::Mutation;
use super::record::{
    Account, FollowKey, FollowRelation, LikeKey, LikeRelation, ListFollowersParams,
    ListFollowingParams, ListTweetsParams, Tweet,
};
use super::RowReader;
use crate::error::{StoreError, StoreResult};
use siphasher::sip::SipHasher13;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::BuildHasherDefault;

/// Hash map keyed with SipHasher
type SipMap<K, V> = HashMap<K, V, BuildHasherDefault<SipHasher13>>;

/// All rows of the store plus their indexes
#[derive(Debug, Default)]
pub struct Tables {
    accounts: SipMap<String, Account>,

    /// email -> username
    emails: SipMap<String, String>,

    follows: SipMap<FollowKey, FollowRelation>,

    /// followed -> relation id -> key
    followers_idx: SipMap<String, BTreeMap<i64, FollowKey>>,

    /// follower -> relation id -> key
    following_idx: SipMap<String, BTreeMap<i64, FollowKey>>,

    likes: SipMap<LikeKey, LikeRelation>,

    tweets: BTreeMap<i64, Tweet>,

    /// author -> tweet ids
    tweets_by_author: SipMap<String, BTreeSet<i64>>,

    next_follow_id: i64,
    next_like_id: i64,
    next_tweet_id: i64,
}

impl Tables {
    /// Create an empty table set
    pub fn new() -> Self {
        Tables {
            next_follow_id: 1,
            next_like_id: 1,
            next_tweet_id: 1,
            ..Default::default()
        }
    }

    /// Id the next follow relation will receive
    pub(crate) fn next_follow_id(&self) -> i64 {
        self.next_follow_id.max(1)
    }

    pub(crate) fn next_like_id(&self) -> i64 {
        self.next_like_id.max(1)
    }

    pub(crate) fn next_tweet_id(&self) -> i64 {
        self.next_tweet_id.max(1)
    }

    pub(crate) fn account(&self, username: &str) -> Option<&Account> {
        self.accounts.get(username)
    }

    /// Username owning `email`, if any
    pub(crate) fn email_owner(&self, email: &str) -> Option<&str> {
        self.emails.get(email).map(String::as_str)
    }

    pub(crate) fn follow(&self, key: &FollowKey) -> Option<&FollowRelation> {
        self.follows.get(key)
    }

    pub(crate) fn like(&self, key: &LikeKey) -> Option<&LikeRelation> {
        self.likes.get(key)
    }

    pub(crate) fn tweet(&self, id: i64) -> Option<&Tweet> {
        self.tweets.get(&id)
    }

    /// Apply one mutation
    ///
    /// Accounts and tweets are upserted; relations must not already exist.
    /// Removing a row that is not there is an error, which is how a broken
    /// undo log surfaces during rollback.
    pub fn apply(&mut self, mutation: &Mutation) -> StoreResult<()> {
        match mutation {
            Mutation::PutAccount(account) => {
                if let Some(owner) = self.emails.get(&account.email) {
                    if owner != &account.username {
                        return Err(StoreError::unique("account email", &account.email));
                    }
                }
                if let Some(previous) = self.accounts.get(&account.username) {
                    if previous.email != account.email {
                        self.emails.remove(&previous.email);
                    }
                }
                self.emails
                    .insert(account.email.clone(), account.username.clone());
                self.accounts
                    .insert(account.username.clone(), account.clone());
                Ok(())
            }

            Mutation::RemoveAccount(username) => {
                let account = self
                    .accounts
                    .remove(username)
                    .ok_or_else(|| StoreError::not_found("account", username))?;
                self.emails.remove(&account.email);
                Ok(())
            }

            Mutation::PutFollow(relation) => {
                let key = relation.key();
                if self.follows.contains_key(&key) {
                    return Err(StoreError::unique("follow", &key));
                }
                self.followers_idx
                    .entry(relation.followed_username.clone())
                    .or_default()
                    .insert(relation.id, key.clone());
                self.following_idx
                    .entry(relation.follower_username.clone())
                    .or_default()
                    .insert(relation.id, key.clone());
                self.next_follow_id = self.next_follow_id.max(relation.id + 1);
                self.follows.insert(key, relation.clone());
                Ok(())
            }

            Mutation::RemoveFollow(key) => {
                let relation = self
                    .follows
                    .remove(key)
                    .ok_or_else(|| StoreError::not_found("follow", key))?;
                remove_indexed(&mut self.followers_idx, &relation.followed_username, relation.id);
                remove_indexed(&mut self.following_idx, &relation.follower_username, relation.id);
                Ok(())
            }

            Mutation::PutLike(relation) => {
                let key = relation.key();
                if self.likes.contains_key(&key) {
                    return Err(StoreError::unique("like", &key));
                }
                self.next_like_id = self.next_like_id.max(relation.id + 1);
                self.likes.insert(key, relation.clone());
                Ok(())
            }

            Mutation::RemoveLike(key) => {
                self.likes
                    .remove(key)
                    .map(|_| ())
                    .ok_or_else(|| StoreError::not_found("like", key))
            }

            Mutation::PutTweet(tweet) => {
                if let Some(previous) = self.tweets.get(&tweet.id) {
                    if previous.username != tweet.username {
                        return Err(StoreError::Corrupt(format!(
                            "tweet {} cannot change author",
                            tweet.id
                        )));
                    }
                }
                self.tweets_by_author
                    .entry(tweet.username.clone())
                    .or_default()
                    .insert(tweet.id);
                self.next_tweet_id = self.next_tweet_id.max(tweet.id + 1);
                self.tweets.insert(tweet.id, tweet.clone());
                Ok(())
            }

            Mutation::RemoveTweet(id) => {
                let tweet = self
                    .tweets
                    .remove(id)
                    .ok_or_else(|| StoreError::not_found("tweet", id))?;
                if let Some(ids) = self.tweets_by_author.get_mut(&tweet.username) {
                    ids.remove(id);
                    if ids.is_empty() {
                        self.tweets_by_author.remove(&tweet.username);
                    }
                }
                Ok(())
            }
        }
    }

    /// Mutation that undoes `mutation` against the current state
    ///
    /// Must be computed before `mutation` is applied.
    pub fn inverse(&self, mutation: &Mutation) -> StoreResult<Mutation> {
        let inverse = match mutation {
            Mutation::PutAccount(account) => match self.accounts.get(&account.username) {
                Some(previous) => Mutation::PutAccount(previous.clone()),
                None => Mutation::RemoveAccount(account.username.clone()),
            },
            Mutation::RemoveAccount(username) => self
                .accounts
                .get(username)
                .map(|previous| Mutation::PutAccount(previous.clone()))
                .ok_or_else(|| StoreError::not_found("account", username))?,
            Mutation::PutFollow(relation) => Mutation::RemoveFollow(relation.key()),
            Mutation::RemoveFollow(key) => self
                .follows
                .get(key)
                .map(|previous| Mutation::PutFollow(previous.clone()))
                .ok_or_else(|| StoreError::not_found("follow", key))?,
            Mutation::PutLike(relation) => Mutation::RemoveLike(relation.key()),
            Mutation::RemoveLike(key) => self
                .likes
                .get(key)
                .map(|previous| Mutation::PutLike(previous.clone()))
                .ok_or_else(|| StoreError::not_found("like", key))?,
            Mutation::PutTweet(tweet) => match self.tweets.get(&tweet.id) {
                Some(previous) => Mutation::PutTweet(previous.clone()),
                None => Mutation::RemoveTweet(tweet.id),
            },
            Mutation::RemoveTweet(id) => self
                .tweets
                .get(id)
                .map(|previous| Mutation::PutTweet(previous.clone()))
                .ok_or_else(|| StoreError::not_found("tweet", id))?,
        };
        Ok(inverse)
    }

    /// Apply a list of mutations all-or-nothing
    ///
    /// On failure the already-applied prefix is reverted before the error
    /// is returned.
    pub fn apply_all(&mut self, mutations: &[Mutation]) -> StoreResult<()> {
        let mut undo = Vec::with_capacity(mutations.len());

        for mutation in mutations {
            let step = self
                .inverse(mutation)
                .and_then(|inverse| self.apply(mutation).map(|()| inverse));
            match step {
                Ok(inverse) => undo.push(inverse),
                Err(cause) => {
                    for inverse in undo.iter().rev() {
                        if let Err(rollback) = self.apply(inverse) {
                            return Err(StoreError::RollbackFailed {
                                cause: Box::new(cause),
                                rollback: Box::new(rollback),
                            });
                        }
                    }
                    return Err(cause);
                }
            }
        }

        Ok(())
    }

    /// Row counts per table
    pub fn stats(&self) -> TableStats {
        TableStats {
            accounts: self.accounts.len(),
            follows: self.follows.len(),
            likes: self.likes.len(),
            tweets: self.tweets.len(),
        }
    }

    fn relation_page(
        &self,
        index: &SipMap<String, BTreeMap<i64, FollowKey>>,
        username: &str,
        limit: usize,
        offset: usize,
    ) -> Vec<FollowRelation> {
        index
            .get(username)
            .map(|ids| {
                ids.values()
                    .rev()
                    .skip(offset)
                    .take(limit)
                    .filter_map(|key| self.follows.get(key).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn remove_indexed(index: &mut SipMap<String, BTreeMap<i64, FollowKey>>, username: &str, id: i64) {
    if let Some(ids) = index.get_mut(username) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(username);
        }
    }
}

impl RowReader for Tables {
    fn get_account(&self, username: &str) -> StoreResult<Option<Account>> {
        Ok(self.account(username).cloned())
    }

    fn get_follow(&self, key: &FollowKey) -> StoreResult<Option<FollowRelation>> {
        Ok(self.follow(key).cloned())
    }

    fn list_followers(&self, params: &ListFollowersParams) -> StoreResult<Vec<FollowRelation>> {
        Ok(self.relation_page(
            &self.followers_idx,
            &params.followed_username,
            params.limit,
            params.offset,
        ))
    }

    fn list_following(&self, params: &ListFollowingParams) -> StoreResult<Vec<FollowRelation>> {
        Ok(self.relation_page(
            &self.following_idx,
            &params.follower_username,
            params.limit,
            params.offset,
        ))
    }

    fn get_like(&self, key: &LikeKey) -> StoreResult<Option<LikeRelation>> {
        Ok(self.like(key).cloned())
    }

    fn get_tweet(&self, id: i64) -> StoreResult<Option<Tweet>> {
        Ok(self.tweet(id).cloned())
    }

    fn list_tweets(&self, params: &ListTweetsParams) -> StoreResult<Vec<Tweet>> {
        Ok(self
            .tweets_by_author
            .get(&params.username)
            .map(|ids| {
                ids.iter()
                    .rev()
                    .skip(params.offset)
                    .take(params.limit)
                    .filter_map(|id| self.tweets.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Statistics about the table set
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TableStats {
    pub accounts: usize,
    pub follows: usize,
    pub likes: usize,
    pub tweets: usize,
}
