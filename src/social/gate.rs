//! Pre-check gate
//!
//! Read-only checks run against committed state before a compound
//! operation opens its atomic unit. They are not part of that unit: two
//! callers can both pass a check before either commits. The unique keys on
//! relations catch the second create; nothing catches the second delete.

use super::error::{FollowError, LikeError, UnfollowError, UnlikeError};
use crate::store::{FollowKey, LikeKey, RowReader};
use crate::txn::Database;

/// Target exists and is not followed yet
pub async fn check_follow(db: &Database, key: &FollowKey) -> Result<(), FollowError> {
    let view = db.reader().await;

    if view.get_account(&key.followed_username)?.is_none() {
        return Err(FollowError::NotFound(key.followed_username.clone()));
    }
    if view.get_follow(key)?.is_some() {
        return Err(FollowError::AlreadyFollowing {
            follower: key.follower_username.clone(),
            target: key.followed_username.clone(),
        });
    }
    Ok(())
}

/// Target exists and is currently followed
pub async fn check_unfollow(db: &Database, key: &FollowKey) -> Result<(), UnfollowError> {
    let view = db.reader().await;

    if view.get_account(&key.followed_username)?.is_none() {
        return Err(UnfollowError::NotFound(key.followed_username.clone()));
    }
    if view.get_follow(key)?.is_none() {
        return Err(UnfollowError::NotFollowing {
            follower: key.follower_username.clone(),
            target: key.followed_username.clone(),
        });
    }
    Ok(())
}

/// Tweet not liked by the user yet
pub async fn check_like(db: &Database, key: &LikeKey) -> Result<(), LikeError> {
    if db.reader().await.get_like(key)?.is_some() {
        return Err(LikeError::AlreadyLiked {
            username: key.username.clone(),
            tweet_id: key.tweet_id,
        });
    }
    Ok(())
}

/// Tweet currently liked by the user
pub async fn check_unlike(db: &Database, key: &LikeKey) -> Result<(), UnlikeError> {
    if db.reader().await.get_like(key)?.is_none() {
        return Err(UnlikeError::NotLiked {
            username: key.username.clone(),
            tweet_id: key.tweet_id,
        });
    }
    Ok(())
}
