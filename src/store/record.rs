//! Record types and operation arguments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Primary key
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    /// Display name
    pub name: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// `follower_username` follows `followed_username`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowRelation {
    pub id: i64,
    pub follower_username: String,
    pub followed_username: String,
    pub created_at: DateTime<Utc>,
}

impl FollowRelation {
    pub fn key(&self) -> FollowKey {
        FollowKey::new(&self.follower_username, &self.followed_username)
    }
}

/// `username` likes tweet `tweet_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeRelation {
    pub id: i64,
    pub username: String,
    pub tweet_id: i64,
    pub created_at: DateTime<Utc>,
}

impl LikeRelation {
    pub fn key(&self) -> LikeKey {
        LikeKey::new(&self.username, self.tweet_id)
    }
}

/// A posted tweet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: i64,
    pub body: String,
    /// Author
    pub username: String,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

/// Which denormalized counter on an account to adjust
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterField {
    Followers,
    Following,
}

impl CounterField {
    pub fn name(&self) -> &'static str {
        match self {
            CounterField::Followers => "followers_count",
            CounterField::Following => "following_count",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEmailParams {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNameParams {
    pub username: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePasswordParams {
    pub username: String,
    pub hashed_password: String,
}

/// Composite identity of a follow relation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FollowKey {
    pub follower_username: String,
    pub followed_username: String,
}

impl FollowKey {
    pub fn new(follower: &str, followed: &str) -> Self {
        FollowKey {
            follower_username: follower.to_string(),
            followed_username: followed.to_string(),
        }
    }
}

impl std::fmt::Display for FollowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.follower_username, self.followed_username)
    }
}

/// Composite identity of a like relation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LikeKey {
    pub username: String,
    pub tweet_id: i64,
}

impl LikeKey {
    pub fn new(username: &str, tweet_id: i64) -> Self {
        LikeKey {
            username: username.to_string(),
            tweet_id,
        }
    }
}

impl std::fmt::Display for LikeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->#{}", self.username, self.tweet_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTweetParams {
    pub username: String,
    pub body: String,
}

/// Accounts following `followed_username`, newest relation first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFollowersParams {
    pub followed_username: String,
    pub limit: usize,
    pub offset: usize,
}

/// Accounts `follower_username` follows, newest relation first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFollowingParams {
    pub follower_username: String,
    pub limit: usize,
    pub offset: usize,
}

/// Tweets by `username`, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTweetsParams {
    pub username: String,
    pub limit: usize,
    pub offset: usize,
}
