//! Read-through/write-through cache over one entity table.
//!
//! Every local write and its outbox entry commit together. The repository is
//! the only writer to its feed: it republishes the full list after each
//! change and wakes the sync worker.

use futures::future::BoxFuture;
use sqlx::sqlite::{Sqlite, SqliteConnection};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Notify};

use crate::db::{LocalDao, Outbox, OutboxOperation};
use crate::models::{Collection, Entity};

/// Live view of one collection. `None` until the first load.
pub type EntityFeed<E> = watch::Receiver<Option<Vec<E>>>;

#[derive(Debug)]
pub enum RepositoryError {
    Sqlite(sqlx::Error),
    Serialization(serde_json::Error),
    NotFound(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            RepositoryError::Serialization(e) => write!(f, "Serialization error: {}", e),
            RepositoryError::NotFound(id) => write!(f, "Record not found: {}", id),
        }
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RepositoryError::Sqlite(e) => Some(e),
            RepositoryError::Serialization(e) => Some(e),
            RepositoryError::NotFound(_) => None,
        }
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        RepositoryError::Sqlite(e)
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::Serialization(e)
    }
}

/// Wakes the sync worker after local writes.
#[derive(Debug, Clone, Default)]
pub struct SyncSignal(Arc<Notify>);

impl SyncSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.0.notify_one();
    }

    pub async fn notified(&self) {
        self.0.notified().await
    }
}

/// Counts from applying one remote snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub upserted: usize,
    pub removed: usize,
    /// Documents left alone because they have unpushed local changes.
    pub protected: usize,
    /// Documents that did not decode as this entity type.
    pub skipped: usize,
}

pub struct Repository<E: Entity, D: LocalDao<E>> {
    dao: D,
    outbox: Outbox,
    feed: watch::Sender<Option<Vec<E>>>,
    signal: SyncSignal,
}

impl<E: Entity, D: LocalDao<E>> Repository<E, D> {
    pub fn new(dao: D, outbox: Outbox, signal: SyncSignal) -> Self {
        let (feed, _) = watch::channel(None);
        Self {
            dao,
            outbox,
            feed,
            signal,
        }
    }

    /// The typed DAO, for filtered queries.
    pub fn dao(&self) -> &D {
        &self.dao
    }

    pub fn collection(&self) -> Collection {
        E::COLLECTION
    }

    /// Subscribe to the collection. Call `refresh` (or `ensure_loaded`) to
    /// move the feed out of its loading state.
    pub fn get_all(&self) -> EntityFeed<E> {
        self.feed.subscribe()
    }

    /// Loads the feed from the cache unless it already holds data.
    pub async fn ensure_loaded(&self) -> Result<(), RepositoryError> {
        let loaded = self.feed.borrow().is_some();
        if !loaded {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Current cache contents, bypassing the feed.
    pub async fn list(&self) -> Result<Vec<E>, RepositoryError> {
        let mut conn = self.dao.pool().acquire().await?;
        Ok(self.dao.list(&mut conn).await?)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<E>, RepositoryError> {
        let mut conn = self.dao.pool().acquire().await?;
        Ok(self.dao.find(&mut conn, id).await?)
    }

    /// Like `get_by_id`, but a missing row is an error.
    pub async fn require(&self, id: &str) -> Result<E, RepositoryError> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    pub async fn save(&self, entity: &E) -> Result<(), RepositoryError> {
        let mut tx = self.begin().await?;
        self.save_in(&mut tx, entity).await?;
        tx.commit().await?;
        self.publish().await
    }

    /// Open a cache transaction. Writes staged with `save_in` on it commit
    /// together, across repositories sharing the pool.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, Sqlite>, RepositoryError> {
        Ok(self.dao.pool().begin().await?)
    }

    /// Write the row and its outbox entry on `conn`. Call `publish` once the
    /// surrounding transaction has committed.
    pub async fn save_in(&self, conn: &mut SqliteConnection, entity: &E) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(entity)?;
        self.dao.upsert(&mut *conn, entity).await?;
        self.outbox
            .enqueue(
                &mut *conn,
                E::COLLECTION,
                entity.id(),
                OutboxOperation::Upsert,
                Some(payload),
            )
            .await?;
        tracing::debug!(collection = %E::COLLECTION, id = entity.id(), "saved");
        Ok(())
    }

    /// Republish the feed and wake the sync worker after a commit.
    pub async fn publish(&self) -> Result<(), RepositoryError> {
        self.refresh().await?;
        self.signal.notify();
        Ok(())
    }

    /// Returns true if a local row was removed. The remote delete is queued
    /// either way.
    pub async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let mut tx = self.dao.pool().begin().await?;
        let removed = self.dao.remove(&mut tx, id).await?;
        self.outbox
            .enqueue(&mut tx, E::COLLECTION, id, OutboxOperation::Delete, None)
            .await?;
        tx.commit().await?;

        tracing::debug!(collection = %E::COLLECTION, id, removed, "deleted");
        self.publish().await?;
        Ok(removed)
    }

    /// Reload from the cache and publish.
    pub async fn refresh(&self) -> Result<(), RepositoryError> {
        let items = self.list().await?;
        self.feed.send_replace(Some(items));
        Ok(())
    }

    /// Replace the cache with a remote snapshot, skipping ids that still have
    /// outbox entries. Nothing is queued for push.
    ///
    /// The protected set is read inside the applying transaction.
    pub async fn apply_remote(&self, documents: Vec<E>) -> Result<ApplyStats, RepositoryError> {
        let mut stats = ApplyStats::default();
        let remote_ids: HashSet<String> = documents.iter().map(|d| d.id().to_string()).collect();

        let mut tx = self.dao.pool().begin().await?;
        let protected = self.outbox.protected_ids(&mut tx, E::COLLECTION).await?;
        for document in &documents {
            if protected.contains(document.id()) {
                stats.protected += 1;
                continue;
            }
            self.dao.upsert(&mut tx, document).await?;
            stats.upserted += 1;
        }

        let local = self.dao.list(&mut tx).await?;
        for entity in local {
            let id = entity.id();
            if remote_ids.contains(id) || protected.contains(id) {
                continue;
            }
            if self.dao.remove(&mut tx, id).await? {
                stats.removed += 1;
            }
        }
        tx.commit().await?;

        self.refresh().await?;
        Ok(stats)
    }
}

/// Type-erased pull target so the worker can hold every repository in one
/// list.
pub trait SyncTarget: Send + Sync {
    fn collection(&self) -> Collection;

    /// Decode raw remote documents and apply them to the cache.
    fn apply_documents(
        &self,
        documents: Vec<serde_json::Value>,
    ) -> BoxFuture<'_, Result<ApplyStats, RepositoryError>>;
}

impl<E: Entity, D: LocalDao<E>> SyncTarget for Repository<E, D> {
    fn collection(&self) -> Collection {
        E::COLLECTION
    }

    fn apply_documents(
        &self,
        documents: Vec<serde_json::Value>,
    ) -> BoxFuture<'_, Result<ApplyStats, RepositoryError>> {
        Box::pin(async move {
            let mut decoded = Vec::with_capacity(documents.len());
            let mut skipped = 0;
            for document in documents {
                match serde_json::from_value::<E>(document) {
                    Ok(entity) => decoded.push(entity),
                    Err(e) => {
                        tracing::warn!(collection = %E::COLLECTION, "skipping undecodable document: {}", e);
                        skipped += 1;
                    }
                }
            }
            let mut stats = self.apply_remote(decoded).await?;
            stats.skipped = skipped;
            Ok(stats)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;
    use crate::db::{OutboxOperation, TransactionDao};
    use crate::models::Transaction;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    type TxRepo = Repository<Transaction, TransactionDao>;

    fn repo(pool: &sqlx::SqlitePool) -> (TxRepo, Outbox) {
        let outbox = Outbox::new(pool.clone());
        let repo = Repository::new(TransactionDao::new(pool.clone()), outbox.clone(), SyncSignal::new());
        (repo, outbox)
    }

    fn tx(amount: i64) -> Transaction {
        Transaction::income(
            Decimal::from(amount),
            "fees",
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_feed_starts_loading_then_publishes() {
        let (pool, _temp) = test_pool().await;
        let (repo, _) = repo(&pool);

        let feed = repo.get_all();
        assert!(feed.borrow().is_none());

        repo.ensure_loaded().await.unwrap();
        assert_eq!(feed.borrow().as_deref(), Some(&[][..]));

        let saved = tx(100);
        repo.save(&saved).await.unwrap();
        assert_eq!(feed.borrow().clone(), Some(vec![saved]));
    }

    #[tokio::test]
    async fn test_save_then_get_by_id_and_queue_upsert() {
        let (pool, _temp) = test_pool().await;
        let (repo, outbox) = repo(&pool);

        let saved = tx(250);
        repo.save(&saved).await.unwrap();

        assert_eq!(repo.get_by_id(&saved.id).await.unwrap(), Some(saved.clone()));
        let pending = outbox.pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, OutboxOperation::Upsert);
        let payload: Transaction = serde_json::from_str(pending[0].payload.as_deref().unwrap()).unwrap();
        assert_eq!(payload, saved);
    }

    #[tokio::test]
    async fn test_delete_removes_from_feed_and_queues_delete() {
        let (pool, _temp) = test_pool().await;
        let (repo, outbox) = repo(&pool);

        let kept = tx(10);
        let gone = tx(20);
        repo.save(&kept).await.unwrap();
        repo.save(&gone).await.unwrap();

        assert!(repo.delete(&gone.id).await.unwrap());
        let feed = repo.get_all();
        let ids: Vec<String> = feed.borrow().clone().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![kept.id.clone()]);

        let pending = outbox.pending(10).await.unwrap();
        let delete = pending.iter().find(|e| e.document_id == gone.id).unwrap();
        assert_eq!(delete.operation, OutboxOperation::Delete);
        assert!(matches!(repo.require(&gone.id).await, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_apply_remote_respects_protected_ids() {
        let (pool, _temp) = test_pool().await;
        let (repo, _) = repo(&pool);

        let local_only = tx(1);
        let stale = tx(2);
        repo.save(&local_only).await.unwrap();
        {
            // Cached from an earlier pull: no outbox entry.
            let mut conn = pool.acquire().await.unwrap();
            repo.dao().upsert(&mut conn, &stale).await.unwrap();
        }

        let mut edited_remotely = local_only.clone();
        edited_remotely.amount = Decimal::from(999);
        let incoming = tx(3);

        // `local_only` still has its upsert queued.
        let stats = repo
            .apply_remote(vec![edited_remotely, incoming.clone()])
            .await
            .unwrap();

        assert_eq!(stats.upserted, 1);
        assert_eq!(stats.protected, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(repo.get_by_id(&local_only.id).await.unwrap().unwrap().amount, Decimal::from(1));
        assert!(repo.get_by_id(&stale.id).await.unwrap().is_none());
        assert_eq!(repo.get_by_id(&incoming.id).await.unwrap(), Some(incoming));
    }

    #[tokio::test]
    async fn test_apply_documents_skips_garbage() {
        let (pool, _temp) = test_pool().await;
        let (repo, _) = repo(&pool);

        let good = serde_json::to_value(tx(5)).unwrap();
        let bad = serde_json::json!({"id": "x", "nonsense": true});
        let stats = repo
            .apply_documents(vec![good, bad])
            .await
            .unwrap();
        assert_eq!(stats.upserted, 1);
        assert_eq!(stats.skipped, 1);
    }
}
