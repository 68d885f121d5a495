//! Outcomes of the compound operations
//!
//! Each operation has its own error type so callers can match on exactly
//! the outcomes that operation can produce. Store failures, including a
//! create that lost a uniqueness race after passing the pre-check, arrive
//! as `Storage`; `is_conflict` folds the two conflict shapes together.

use crate::error::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FollowError {
    /// The account to follow does not exist
    #[error("account not found: {0}")]
    NotFound(String),

    #[error("{follower} has already followed {target}")]
    AlreadyFollowing { follower: String, target: String },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl FollowError {
    /// Already following, or lost the race to create the relation
    pub fn is_conflict(&self) -> bool {
        match self {
            FollowError::AlreadyFollowing { .. } => true,
            FollowError::Storage(e) => e.is_unique_violation(),
            FollowError::NotFound(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum UnfollowError {
    /// The account to unfollow does not exist
    #[error("account not found: {0}")]
    NotFound(String),

    #[error("{follower} is not following {target}")]
    NotFollowing { follower: String, target: String },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum LikeError {
    #[error("{username} has already liked tweet {tweet_id}")]
    AlreadyLiked { username: String, tweet_id: i64 },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl LikeError {
    /// Already liked, or lost the race to create the like
    pub fn is_conflict(&self) -> bool {
        match self {
            LikeError::AlreadyLiked { .. } => true,
            LikeError::Storage(e) => e.is_unique_violation(),
        }
    }
}

#[derive(Error, Debug)]
pub enum UnlikeError {
    #[error("{username} hasn't liked tweet {tweet_id}")]
    NotLiked { username: String, tweet_id: i64 },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum TweetError {
    #[error("tweet {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
