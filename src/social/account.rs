//! Account operations and follower listings

use super::{Page, Social};
use crate::error::{StoreError, StoreResult};
use crate::store::{
    Account, CreateAccountParams, FollowRelation, ListFollowersParams, ListFollowingParams,
    RowReader, RowWriter, UpdateEmailParams, UpdateNameParams, UpdatePasswordParams,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Account fields safe to hand back to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub username: String,
    pub email: String,
    pub name: String,
    pub followers_count: i64,
    pub following_count: i64,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        AccountSummary {
            username: account.username.clone(),
            email: account.email.clone(),
            name: account.name.clone(),
            followers_count: account.followers_count,
            following_count: account.following_count,
        }
    }
}

impl Social {
    /// Register a new account; the password must already be hashed
    pub async fn sign_up(
        &self,
        params: CreateAccountParams,
        cancel: &CancellationToken,
    ) -> StoreResult<Account> {
        let account = self
            .db
            .run_atomic(cancel, |tx| tx.create_account(params))
            .await?;
        info!("Account {} created", account.username);
        Ok(account)
    }

    pub async fn profile(&self, username: &str) -> StoreResult<Account> {
        self.db
            .reader()
            .await
            .get_account(username)?
            .ok_or_else(|| StoreError::not_found("account", username))
    }

    pub async fn update_email(
        &self,
        params: UpdateEmailParams,
        cancel: &CancellationToken,
    ) -> StoreResult<Account> {
        self.db.run_atomic(cancel, |tx| tx.update_email(params)).await
    }

    pub async fn update_name(
        &self,
        params: UpdateNameParams,
        cancel: &CancellationToken,
    ) -> StoreResult<Account> {
        self.db.run_atomic(cancel, |tx| tx.update_name(params)).await
    }

    pub async fn update_password(
        &self,
        params: UpdatePasswordParams,
        cancel: &CancellationToken,
    ) -> StoreResult<Account> {
        let account = self
            .db
            .run_atomic(cancel, |tx| tx.update_password(params))
            .await?;
        info!("Password changed for {}", account.username);
        Ok(account)
    }

    /// Accounts following `username`, most recent follow first
    pub async fn followers(&self, username: &str, page: Page) -> StoreResult<Vec<Account>> {
        let view = self.db.reader().await;
        let relations = view.list_followers(&ListFollowersParams {
            followed_username: username.to_string(),
            limit: page.page_size,
            offset: page.offset(),
        })?;
        debug!("{} followers of {} on page {}", relations.len(), username, page.page_id);
        collect_accounts(&*view, relations.iter().map(|r| &r.follower_username))
    }

    /// Accounts `username` follows, most recent follow first
    pub async fn following(&self, username: &str, page: Page) -> StoreResult<Vec<Account>> {
        let view = self.db.reader().await;
        let relations: Vec<FollowRelation> = view.list_following(&ListFollowingParams {
            follower_username: username.to_string(),
            limit: page.page_size,
            offset: page.offset(),
        })?;
        debug!("{} followed by {} on page {}", relations.len(), username, page.page_id);
        collect_accounts(&*view, relations.iter().map(|r| &r.followed_username))
    }
}

/// Resolve usernames to accounts, skipping any that no longer exist
fn collect_accounts<'a, R, I>(reader: &R, usernames: I) -> StoreResult<Vec<Account>>
where
    R: RowReader + ?Sized,
    I: Iterator<Item = &'a String>,
{
    let mut accounts = Vec::new();
    for username in usernames {
        if let Some(account) = reader.get_account(username)? {
            accounts.push(account);
        }
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::testing::{account_params, random_username, rng, social_with};
    use tokio_test::assert_err;

    #[tokio::test]
    async fn test_sign_up_starts_counters_at_zero() {
        let social = social_with(&[]).await;
        let mut rng = rng(7);
        let username = random_username(&mut rng);

        let account = social
            .sign_up(account_params(&username), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(account.followers_count, 0);
        assert_eq!(account.following_count, 0);
        assert_eq!(social.profile(&username).await.unwrap(), account);
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_rejected() {
        let social = social_with(&["alice"]).await;
        let cancel = CancellationToken::new();

        let err = assert_err!(social.sign_up(account_params("alice"), &cancel).await);
        assert!(err.is_unique_violation());

        // Same email under another username
        let mut params = account_params("alicia");
        params.email = "alice@example.com".into();
        let err = assert_err!(social.sign_up(params, &cancel).await);
        assert!(err.is_unique_violation());
        assert_eq!(social.database().stats().await.accounts, 1);
    }

    #[tokio::test]
    async fn test_profile_missing() {
        let social = social_with(&[]).await;
        assert!(assert_err!(social.profile("ghost").await).is_not_found());
    }

    #[tokio::test]
    async fn test_updates() {
        let social = social_with(&["alice", "bob"]).await;
        let cancel = CancellationToken::new();

        let before = social.profile("alice").await.unwrap();
        let updated = social
            .update_password(
                UpdatePasswordParams {
                    username: "alice".into(),
                    hashed_password: "new-hash".into(),
                },
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(updated.hashed_password, "new-hash");
        assert!(updated.password_changed_at >= before.password_changed_at);

        let updated = social
            .update_name(
                UpdateNameParams {
                    username: "alice".into(),
                    name: "Alice A.".into(),
                },
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Alice A.");

        let err = assert_err!(
            social
                .update_email(
                    UpdateEmailParams {
                        username: "alice".into(),
                        email: "bob@example.com".into(),
                    },
                    &cancel,
                )
                .await
        );
        assert!(err.is_unique_violation());
        assert_eq!(social.profile("alice").await.unwrap().email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_follower_pages() {
        let mut rng = rng(42);
        let fans: Vec<String> = (0..7).map(|i| format!("{}{}", random_username(&mut rng), i)).collect();
        let mut names: Vec<&str> = fans.iter().map(String::as_str).collect();
        names.push("star");
        let social = social_with(&names).await;
        let cancel = CancellationToken::new();

        for fan in &fans {
            social.follow(fan, "star", &cancel).await.unwrap();
        }

        let first = social.followers("star", Page::new(1, 5)).await.unwrap();
        let second = social.followers("star", Page::new(2, 5)).await.unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 2);

        // Newest follow first
        assert_eq!(first[0].username, fans[6]);
        assert_eq!(second[1].username, fans[0]);

        let beyond = social.followers("star", Page::new(usize::MAX, usize::MAX)).await.unwrap();
        assert!(beyond.is_empty());

        let following = social.following(&fans[0], Page::default()).await.unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].username, "star");
        assert_eq!(AccountSummary::from(&following[0]).followers_count, 7);
    }
}
