//! Row store module
//!
//! Holds the four record types (accounts, tweets, follow relations, like
//! relations) and the point operations over them. Reads are exposed through
//! [`RowReader`], writes through [`RowWriter`]; the transaction executor is
//! the only `RowWriter` implementation, so every write happens inside an
//! atomic unit.

mod mutation;
mod record;
mod tables;

pub use mutation::Mutation;
pub use record::{
    Account, CounterField, CreateAccountParams, CreateTweetParams, FollowKey, FollowRelation,
    LikeKey, LikeRelation, ListFollowersParams, ListFollowingParams, ListTweetsParams, Tweet,
    UpdateEmailParams, UpdateNameParams, UpdatePasswordParams,
};
pub use tables::{TableStats, Tables};

use crate::error::StoreResult;

/// Read operations
///
/// Point reads return `Ok(None)` when the row does not exist. Page reads
/// are ordered by descending id.
pub trait RowReader {
    fn get_account(&self, username: &str) -> StoreResult<Option<Account>>;

    fn get_follow(&self, key: &FollowKey) -> StoreResult<Option<FollowRelation>>;

    /// Relations whose followed user is `params.followed_username`
    fn list_followers(&self, params: &ListFollowersParams) -> StoreResult<Vec<FollowRelation>>;

    /// Relations whose follower is `params.follower_username`
    fn list_following(&self, params: &ListFollowingParams) -> StoreResult<Vec<FollowRelation>>;

    fn get_like(&self, key: &LikeKey) -> StoreResult<Option<LikeRelation>>;

    fn get_tweet(&self, id: i64) -> StoreResult<Option<Tweet>>;

    fn list_tweets(&self, params: &ListTweetsParams) -> StoreResult<Vec<Tweet>>;
}

/// Write operations
///
/// Deletes return the removed row, or `None` when nothing matched.
/// Counter adjustments move the value by exactly one and return the
/// updated row.
pub trait RowWriter: RowReader {
    fn create_account(&mut self, params: CreateAccountParams) -> StoreResult<Account>;

    fn delete_account(&mut self, username: &str) -> StoreResult<Option<Account>>;

    fn update_email(&mut self, params: UpdateEmailParams) -> StoreResult<Account>;

    fn update_name(&mut self, params: UpdateNameParams) -> StoreResult<Account>;

    /// Also stamps `password_changed_at`
    fn update_password(&mut self, params: UpdatePasswordParams) -> StoreResult<Account>;

    fn create_follow(&mut self, key: FollowKey) -> StoreResult<FollowRelation>;

    fn delete_follow(&mut self, key: &FollowKey) -> StoreResult<Option<FollowRelation>>;

    fn increment_counter(&mut self, username: &str, field: CounterField) -> StoreResult<Account>;

    fn decrement_counter(&mut self, username: &str, field: CounterField) -> StoreResult<Account>;

    fn create_like(&mut self, key: LikeKey) -> StoreResult<LikeRelation>;

    fn delete_like(&mut self, key: &LikeKey) -> StoreResult<Option<LikeRelation>>;

    fn increment_likes(&mut self, tweet_id: i64) -> StoreResult<Tweet>;

    fn decrement_likes(&mut self, tweet_id: i64) -> StoreResult<Tweet>;

    fn create_tweet(&mut self, params: CreateTweetParams) -> StoreResult<Tweet>;

    /// Likes of the tweet are left in place
    fn delete_tweet(&mut self, id: i64) -> StoreResult<Option<Tweet>>;
}
