//! Test fixtures shared by the social tests

use super::Social;
use crate::error::{StoreError, StoreResult};
use crate::store::{
    Account, CounterField, CreateAccountParams, CreateTweetParams, FollowKey, FollowRelation,
    LikeKey, LikeRelation, ListFollowersParams, ListFollowingParams, ListTweetsParams, RowReader,
    RowWriter, Tweet, UpdateEmailParams, UpdateNameParams, UpdatePasswordParams,
};
use crate::txn::Database;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Seeded source for generated names
pub(crate) fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub(crate) fn random_username(rng: &mut StdRng) -> String {
    (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub(crate) fn account_params(username: &str) -> CreateAccountParams {
    CreateAccountParams {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        hashed_password: format!("hashed-{}", username),
        name: username.to_uppercase(),
    }
}

/// A service over a fresh in-memory store holding `usernames`
pub(crate) async fn social_with(usernames: &[&str]) -> Social {
    let social = Social::new(Arc::new(Database::in_memory()));
    let cancel = CancellationToken::new();
    for username in usernames {
        social
            .sign_up(account_params(username), &cancel)
            .await
            .unwrap();
    }
    social
}

pub(crate) async fn account(social: &Social, username: &str) -> Account {
    social
        .database()
        .reader()
        .await
        .get_account(username)
        .unwrap()
        .unwrap()
}

pub(crate) async fn tweet_by(social: &Social, username: &str, body: &str) -> Tweet {
    social
        .create_tweet(
            CreateTweetParams {
                username: username.to_string(),
                body: body.to_string(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap()
}

/// Writer that fails one named operation and forwards the rest
///
/// Counter operations are named with their field, e.g.
/// `increment_counter:following_count`.
pub(crate) struct FaultyStore<'a, W: ?Sized> {
    inner: &'a mut W,
    fail_on: &'static str,
}

impl<'a, W: RowWriter + ?Sized> FaultyStore<'a, W> {
    pub(crate) fn new(inner: &'a mut W, fail_on: &'static str) -> Self {
        FaultyStore { inner, fail_on }
    }

    fn check(&self, op: &str) -> StoreResult<()> {
        if op == self.fail_on {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("injected failure in {}", op),
            )));
        }
        Ok(())
    }
}

impl<W: RowWriter + ?Sized> RowReader for FaultyStore<'_, W> {
    fn get_account(&self, username: &str) -> StoreResult<Option<Account>> {
        self.inner.get_account(username)
    }

    fn get_follow(&self, key: &FollowKey) -> StoreResult<Option<FollowRelation>> {
        self.inner.get_follow(key)
    }

    fn list_followers(&self, params: &ListFollowersParams) -> StoreResult<Vec<FollowRelation>> {
        self.inner.list_followers(params)
    }

    fn list_following(&self, params: &ListFollowingParams) -> StoreResult<Vec<FollowRelation>> {
        self.inner.list_following(params)
    }

    fn get_like(&self, key: &LikeKey) -> StoreResult<Option<LikeRelation>> {
        self.inner.get_like(key)
    }

    fn get_tweet(&self, id: i64) -> StoreResult<Option<Tweet>> {
        self.inner.get_tweet(id)
    }

    fn list_tweets(&self, params: &ListTweetsParams) -> StoreResult<Vec<Tweet>> {
        self.inner.list_tweets(params)
    }
}

impl<W: RowWriter + ?Sized> RowWriter for FaultyStore<'_, W> {
    fn create_account(&mut self, params: CreateAccountParams) -> StoreResult<Account> {
        self.check("create_account")?;
        self.inner.create_account(params)
    }

    fn delete_account(&mut self, username: &str) -> StoreResult<Option<Account>> {
        self.check("delete_account")?;
        self.inner.delete_account(username)
    }

    fn update_email(&mut self, params: UpdateEmailParams) -> StoreResult<Account> {
        self.check("update_email")?;
        self.inner.update_email(params)
    }

    fn update_name(&mut self, params: UpdateNameParams) -> StoreResult<Account> {
        self.check("update_name")?;
        self.inner.update_name(params)
    }

    fn update_password(&mut self, params: UpdatePasswordParams) -> StoreResult<Account> {
        self.check("update_password")?;
        self.inner.update_password(params)
    }

    fn create_follow(&mut self, key: FollowKey) -> StoreResult<FollowRelation> {
        self.check("create_follow")?;
        self.inner.create_follow(key)
    }

    fn delete_follow(&mut self, key: &FollowKey) -> StoreResult<Option<FollowRelation>> {
        self.check("delete_follow")?;
        self.inner.delete_follow(key)
    }

    fn increment_counter(&mut self, username: &str, field: CounterField) -> StoreResult<Account> {
        self.check(&format!("increment_counter:{}", field.name()))?;
        self.inner.increment_counter(username, field)
    }

    fn decrement_counter(&mut self, username: &str, field: CounterField) -> StoreResult<Account> {
        self.check(&format!("decrement_counter:{}", field.name()))?;
        self.inner.decrement_counter(username, field)
    }

    fn create_like(&mut self, key: LikeKey) -> StoreResult<LikeRelation> {
        self.check("create_like")?;
        self.inner.create_like(key)
    }

    fn delete_like(&mut self, key: &LikeKey) -> StoreResult<Option<LikeRelation>> {
        self.check("delete_like")?;
        self.inner.delete_like(key)
    }

    fn increment_likes(&mut self, tweet_id: i64) -> StoreResult<Tweet> {
        self.check("increment_likes")?;
        self.inner.increment_likes(tweet_id)
    }

    fn decrement_likes(&mut self, tweet_id: i64) -> StoreResult<Tweet> {
        self.check("decrement_likes")?;
        self.inner.decrement_likes(tweet_id)
    }

    fn create_tweet(&mut self, params: CreateTweetParams) -> StoreResult<Tweet> {
        self.check("create_tweet")?;
        self.inner.create_tweet(params)
    }

    fn delete_tweet(&mut self, id: i64) -> StoreResult<Option<Tweet>> {
        self.check("delete_tweet")?;
        self.inner.delete_tweet(id)
    }
}
