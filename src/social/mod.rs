//! Social operations
//!
//! [`Social`] is what an HTTP layer calls. The compound operations (follow,
//! unfollow, like, unlike) run a read-only gate against committed state
//! and then one atomic unit over the store. The bodies of those units are
//! free functions generic over [`RowWriter`](crate::store::RowWriter), so
//! they can run against any writer, not only a live transaction.

mod account;
mod error;
mod follow;
pub mod gate;
mod like;
mod tweet;

#[cfg(test)]
pub(crate) mod testing;

pub use account::AccountSummary;
pub use error::{FollowError, LikeError, TweetError, UnfollowError, UnlikeError};
pub use follow::{follow_body, unfollow_body, FollowOutcome};
pub use like::{like_body, unlike_body, LikeOutcome};
pub use tweet::{FEED_FOLLOWING_LIMIT, FEED_TWEETS_PER_AUTHOR};

use crate::txn::Database;
use serde::Deserialize;
use std::sync::Arc;

/// Default page size for follower/following listings
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// 1-based page of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    pub page_id: usize,
    pub page_size: usize,
}

impl Page {
    pub fn new(page_id: usize, page_size: usize) -> Self {
        Page { page_id, page_size }
    }

    /// Rows to skip; page 0 is treated as page 1
    ///
    /// Saturates instead of overflowing, which yields an empty page.
    pub fn offset(&self) -> usize {
        self.page_id.saturating_sub(1).saturating_mul(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// Service handle over a shared [`Database`]
#[derive(Clone)]
pub struct Social {
    db: Arc<Database>,
}

impl Social {
    pub fn new(db: Arc<Database>) -> Self {
        Social { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}
