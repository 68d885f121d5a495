//! Row-level change records
//!
//! A committed unit is logged as the list of mutations it performed, and
//! rolled back by applying the inverse list in reverse order.

use super::record::{Account, FollowKey, FollowRelation, LikeKey, LikeRelation, Tweet};
use serde::{Deserialize, Serialize};

/// A single row change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "row", rename_all = "snake_case")]
pub enum Mutation {
    /// Insert or overwrite an account row
    PutAccount(Account),
    RemoveAccount(String),
    PutFollow(FollowRelation),
    RemoveFollow(FollowKey),
    PutLike(LikeRelation),
    RemoveLike(LikeKey),
    PutTweet(Tweet),
    RemoveTweet(i64),
}

impl Mutation {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::PutAccount(_) => "put_account",
            Mutation::RemoveAccount(_) => "remove_account",
            Mutation::PutFollow(_) => "put_follow",
            Mutation::RemoveFollow(_) => "remove_follow",
            Mutation::PutLike(_) => "put_like",
            Mutation::RemoveLike(_) => "remove_like",
            Mutation::PutTweet(_) => "put_tweet",
            Mutation::RemoveTweet(_) => "remove_tweet",
        }
    }
}
