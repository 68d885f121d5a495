//! Transaction executor
//!
//! [`Database`] owns the tables and runs atomic units of work over them.
//! An open unit holds the tables' write lock from begin to commit/abort,
//! so readers going through [`Database::reader`] only ever observe the full
//! pre-state or the full post-state of a unit.

mod transaction;

pub use transaction::Transaction;

use crate::aof::{replay_entries, truncate_log, AofReader, AofWriter};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{TableStats, Tables};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Read view over committed state
pub type ReadView<'a> = RwLockReadGuard<'a, Tables>;

/// The store: tables, commit log and transaction ids
pub struct Database {
    tables: RwLock<Tables>,
    aof: Option<AofWriter>,
    next_txn_id: AtomicU64,
}

impl Database {
    /// Create an empty store without a commit log
    pub fn in_memory() -> Self {
        Database {
            tables: RwLock::new(Tables::new()),
            aof: None,
            next_txn_id: AtomicU64::new(1),
        }
    }

    /// Open the store, replaying the commit log if one is configured
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let Some(path) = &config.aof_path else {
            info!("No commit log configured, running in memory only");
            return Ok(Self::in_memory());
        };

        let mut tables = Tables::new();
        let mut last_txn_id = 0;

        if path.exists() {
            info!("Loading commit log from {:?}", path);
            let reader = AofReader::load(path)?;
            let parsed = reader.parse_entries();

            // New commits must not land behind a torn tail
            if parsed.valid_len < reader.size() {
                warn!(
                    "Truncating commit log {:?} from {} to {} bytes",
                    path,
                    reader.size(),
                    parsed.valid_len
                );
                truncate_log(path, parsed.valid_len)?;
            }

            let (replayed, last) = replay_entries(&mut tables, parsed.entries);
            info!("Replayed {} units from commit log", replayed);
            last_txn_id = last;
        }

        let writer = AofWriter::new(path, config.sync_policy)?;
        info!("Commit log writer initialized at {:?}", path);

        Ok(Database {
            tables: RwLock::new(tables),
            aof: Some(writer),
            next_txn_id: AtomicU64::new(last_txn_id + 1),
        })
    }

    /// Read committed state
    ///
    /// Waits while a unit is open.
    pub async fn reader(&self) -> ReadView<'_> {
        self.tables.read().await
    }

    /// Row counts per table
    pub async fn stats(&self) -> TableStats {
        self.tables.read().await.stats()
    }

    /// Run `body` as one atomic unit
    ///
    /// On `Err` from `body` every write it made is rolled back and the
    /// error returned; if the rollback itself fails the result is a
    /// [`StoreError::RollbackFailed`] naming both. On `Ok` the unit is
    /// committed and any commit failure is returned. If `cancel` fires
    /// before the unit commits, it is rolled back with
    /// [`StoreError::Cancelled`].
    ///
    /// No retries are attempted.
    pub async fn run_atomic<T, F>(&self, cancel: &CancellationToken, body: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> StoreResult<T>,
    {
        let mut tables = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StoreError::Cancelled),
            guard = self.tables.write() => guard,
        };

        let id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        let mut tx = Transaction::begin(id, &mut *tables);

        let value = match body(&mut tx) {
            Ok(value) => value,
            Err(cause) => return Err(tx.abort(cause)),
        };

        if cancel.is_cancelled() {
            return Err(tx.abort(StoreError::Cancelled));
        }

        match &self.aof {
            Some(writer) => blocking_io(|| tx.commit(Some(writer)))?,
            None => tx.commit(None)?,
        }
        Ok(value)
    }

    /// Flush the commit log to disk
    pub fn sync(&self) -> StoreResult<()> {
        match &self.aof {
            Some(writer) => writer.sync(),
            None => Ok(()),
        }
    }
}

/// Run blocking file I/O while the write lock is held
///
/// On the multi-threaded runtime the worker hands its other tasks off
/// first. `block_in_place` panics on a current-thread runtime, so there
/// the closure simply runs inline.
fn blocking_io<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aof::SyncPolicy;
    use crate::store::{
        CounterField, CreateAccountParams, CreateTweetParams, FollowKey, Mutation, RowReader,
        RowWriter,
    };
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn params(username: &str) -> CreateAccountParams {
        CreateAccountParams {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            hashed_password: "hash".to_string(),
            name: username.to_string(),
        }
    }

    async fn seed(db: &Database, names: &[&str]) {
        let cancel = CancellationToken::new();
        for name in names {
            assert_ok!(db.run_atomic(&cancel, |tx| tx.create_account(params(name))).await);
        }
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let db = Database::in_memory();
        seed(&db, &["alice"]).await;

        let account = db.reader().await.get_account("alice").unwrap().unwrap();
        assert_eq!(account.followers_count, 0);
        assert_eq!(db.stats().await.accounts, 1);
    }

    #[tokio::test]
    async fn test_body_error_rolls_back_everything() {
        let db = Database::in_memory();
        seed(&db, &["alice", "bob"]).await;

        let cancel = CancellationToken::new();
        let result: StoreResult<()> = db
            .run_atomic(&cancel, |tx| {
                tx.create_follow(FollowKey::new("alice", "bob"))?;
                tx.increment_counter("alice", CounterField::Following)?;
                tx.increment_counter("nobody", CounterField::Followers)?;
                Ok(())
            })
            .await;

        let err = assert_err!(result);
        assert!(err.is_not_found());

        let view = db.reader().await;
        assert!(view.get_follow(&FollowKey::new("alice", "bob")).unwrap().is_none());
        assert_eq!(view.get_account("alice").unwrap().unwrap().following_count, 0);
    }

    #[tokio::test]
    async fn test_writes_visible_inside_unit() {
        let db = Database::in_memory();
        seed(&db, &["alice"]).await;

        let cancel = CancellationToken::new();
        let likes = db
            .run_atomic(&cancel, |tx| {
                let tweet = tx.create_tweet(CreateTweetParams {
                    username: "alice".into(),
                    body: "first".into(),
                })?;
                tx.increment_likes(tweet.id)?;
                Ok(tx.get_tweet(tweet.id)?.map(|t| t.likes))
            })
            .await
            .unwrap();

        assert_eq!(likes, Some(1));
    }

    #[tokio::test]
    async fn test_cancelled_before_begin() {
        let db = Database::in_memory();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut ran = false;
        let result = db
            .run_atomic(&cancel, |tx| {
                ran = true;
                tx.create_account(params("alice"))
            })
            .await;

        assert!(matches!(result, Err(StoreError::Cancelled)));
        assert!(!ran);
        assert_eq!(db.stats().await.accounts, 0);
    }

    #[tokio::test]
    async fn test_cancelled_mid_unit_aborts() {
        let db = Database::in_memory();
        let cancel = CancellationToken::new();

        let result = db
            .run_atomic(&cancel, |tx| {
                tx.create_account(params("alice"))?;
                cancel.cancel();
                tx.create_account(params("bob"))
            })
            .await;

        assert!(matches!(result, Err(StoreError::Cancelled)));
        assert_eq!(db.stats().await.accounts, 0);
    }

    #[tokio::test]
    async fn test_rollback_failure_reports_both_errors() {
        let db = Database::in_memory();
        let cancel = CancellationToken::new();

        let result: StoreResult<()> = db
            .run_atomic(&cancel, |tx| {
                tx.create_account(params("alice"))?;
                // An undo step that cannot apply
                tx.push_undo(Mutation::RemoveTweet(404));
                Err(StoreError::unique("follow", "alice->bob"))
            })
            .await;

        match assert_err!(result) {
            StoreError::RollbackFailed { cause, rollback } => {
                assert!(cause.is_unique_violation());
                assert!(rollback.is_not_found());
            }
            other => panic!("expected rollback failure, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readers_wait_for_open_unit() {
        let db = Arc::new(Database::in_memory());
        seed(&db, &["alice", "bob"]).await;

        let writer = {
            let db = db.clone();
            tokio::spawn(async move {
                let cancel = CancellationToken::new();
                db.run_atomic(&cancel, |tx| {
                    tx.create_follow(FollowKey::new("alice", "bob"))?;
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    tx.increment_counter("alice", CounterField::Following)?;
                    tx.increment_counter("bob", CounterField::Followers)?;
                    Ok(())
                })
                .await
            })
        };

        for _ in 0..20 {
            let view = db.reader().await;
            let exists = view
                .get_follow(&FollowKey::new("alice", "bob"))
                .unwrap()
                .is_some();
            let following = view.get_account("alice").unwrap().unwrap().following_count;
            let followers = view.get_account("bob").unwrap().unwrap().followers_count;
            assert_eq!(following, exists as i64);
            assert_eq!(followers, exists as i64);
            drop(view);
            tokio::task::yield_now().await;
        }

        writer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_reopen_replays_commits() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            aof_path: Some(dir.path().join("roost.aof")),
            sync_policy: SyncPolicy::Always,
        };

        {
            let db = Database::open(&config).unwrap();
            seed(&db, &["alice", "bob"]).await;
            let cancel = CancellationToken::new();
            db.run_atomic(&cancel, |tx| {
                tx.create_follow(FollowKey::new("alice", "bob"))?;
                tx.increment_counter("alice", CounterField::Following)
            })
            .await
            .unwrap();

            // Rolled back units never reach the log
            let failed: StoreResult<()> = db
                .run_atomic(&cancel, |tx| {
                    tx.create_follow(FollowKey::new("bob", "alice"))?;
                    Err(StoreError::Cancelled)
                })
                .await;
            assert!(failed.is_err());
        }

        let db = Database::open(&config).unwrap();
        let view = db.reader().await;
        assert!(view.get_follow(&FollowKey::new("alice", "bob")).unwrap().is_some());
        assert!(view.get_follow(&FollowKey::new("bob", "alice")).unwrap().is_none());
        assert_eq!(view.get_account("alice").unwrap().unwrap().following_count, 1);
        drop(view);

        // Transaction ids keep increasing after a restart
        assert!(db.next_txn_id.load(Ordering::Relaxed) > 3);
    }

    fn logged(dir: &tempfile::TempDir, sync_policy: SyncPolicy) -> StoreConfig {
        StoreConfig {
            aof_path: Some(dir.path().join("roost.aof")),
            sync_policy,
        }
    }

    async fn has_account(db: &Database, username: &str) -> bool {
        db.reader().await.get_account(username).unwrap().is_some()
    }

    #[tokio::test]
    async fn test_commits_after_torn_tail_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = logged(&dir, SyncPolicy::Always);

        {
            let db = Database::open(&config).unwrap();
            seed(&db, &["alice"]).await;
        }

        // Half of a frame, as left by a crash mid-append
        let torn = crate::aof::AofEntry::commit(9, vec![Mutation::RemoveTweet(1)])
            .to_bytes()
            .unwrap();
        let path = config.aof_path.clone().unwrap();
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, &torn[..torn.len() / 2]).unwrap();
        drop(file);

        {
            let db = Database::open(&config).unwrap();
            assert!(has_account(&db, "alice").await);
            seed(&db, &["bob"]).await;
        }

        let db = Database::open(&config).unwrap();
        assert!(has_account(&db, "alice").await);
        assert!(has_account(&db, "bob").await);
    }

    #[tokio::test]
    async fn test_unreadable_log_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            // A directory cannot be read as a log
            aof_path: Some(dir.path().to_path_buf()),
            sync_policy: SyncPolicy::No,
        };

        assert!(matches!(Database::open(&config), Err(StoreError::Io(_))));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_commit_log_failure_rolls_back() {
        // Every write to /dev/full fails with ENOSPC
        let db = Database {
            tables: RwLock::new(Tables::new()),
            aof: Some(AofWriter::new("/dev/full", SyncPolicy::No).unwrap()),
            next_txn_id: AtomicU64::new(1),
        };

        let cancel = CancellationToken::new();
        let result = db.run_atomic(&cancel, |tx| tx.create_account(params("alice"))).await;

        assert!(matches!(assert_err!(result), StoreError::Io(_)));
        assert!(!has_account(&db, "alice").await);
        assert_eq!(db.stats().await.accounts, 0);
    }

    #[tokio::test]
    async fn test_delete_account() {
        let db = Database::in_memory();
        seed(&db, &["alice"]).await;
        let cancel = CancellationToken::new();

        // Rolled back delete leaves the row in place
        let failed: StoreResult<()> = db
            .run_atomic(&cancel, |tx| {
                assert!(tx.delete_account("alice")?.is_some());
                assert!(tx.get_account("alice")?.is_none());
                Err(StoreError::Cancelled)
            })
            .await;
        assert!(failed.is_err());
        assert!(has_account(&db, "alice").await);

        let deleted = db.run_atomic(&cancel, |tx| tx.delete_account("alice")).await.unwrap();
        assert_eq!(deleted.map(|a| a.username), Some("alice".to_string()));
        assert!(!has_account(&db, "alice").await);

        let missing = db.run_atomic(&cancel, |tx| tx.delete_account("alice")).await.unwrap();
        assert!(missing.is_none());

        // The email is free again
        seed(&db, &["alice"]).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_synced_commits_on_worker_threads() {
        let dir = tempfile::tempdir().unwrap();
        let config = logged(&dir, SyncPolicy::Always);

        {
            let db = Arc::new(Database::open(&config).unwrap());
            let handles: Vec<_> = ["alice", "bob", "carol"]
                .into_iter()
                .map(|name| {
                    let db = db.clone();
                    tokio::spawn(async move {
                        db.run_atomic(&CancellationToken::new(), |tx| tx.create_account(params(name)))
                            .await
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
            db.sync().unwrap();
        }

        let db = Database::open(&config).unwrap();
        assert_eq!(db.stats().await.accounts, 3);
    }
}
